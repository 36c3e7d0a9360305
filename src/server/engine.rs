//! Managed engine server.
//!
//! Wraps the compute server process: command-line construction from
//! configuration, executable discovery under the build tree, startup with an
//! early-death window, liveness checks, and graceful stop with confirmed
//! SIGKILL escalation.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::process;
use crate::prompt::{ConsolePrompt, Interaction};
use crate::server::ServerHandle;
use crate::workload::ExecutorKind;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const STARTUP_POLL: Duration = Duration::from_millis(250);

/// Cap on captured server output attached to death reports.
const MAX_REPORT_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Spawn and own the server process
    Spawn,
    /// Print the command and let the operator run the server; health checks
    /// are vacuously healthy
    Attach,
}

/// Handle to the managed compute server.
pub struct EngineServer {
    config: ServerConfig,
    mode: Mode,
    proc: Option<Child>,
    prompt: Box<dyn Interaction>,
}

impl EngineServer {
    /// A server the driver spawns and owns.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            mode: Mode::Spawn,
            proc: None,
            prompt: Box::new(ConsolePrompt),
        }
    }

    /// A server the operator starts by hand: `start` prints the command line
    /// and blocks on the prompt instead of spawning.
    pub fn attached(config: ServerConfig) -> Self {
        Self {
            config,
            mode: Mode::Attach,
            proc: None,
            prompt: Box::new(ConsolePrompt),
        }
    }

    /// Replace the interaction used for pause and kill-escalation prompts.
    pub fn with_interaction(mut self, prompt: Box<dyn Interaction>) -> Self {
        self.prompt = prompt;
        self
    }

    /// The endpoint workloads connect to.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Find the server executable under the configured build tree. The
    /// build-type directory is also tried lowercased.
    fn find_executable(&self) -> Result<PathBuf, ServerError> {
        let cfg = &self.config;
        let candidates = vec![
            cfg.build_dir.join(&cfg.build_type).join("src").join(&cfg.binary),
            cfg.build_dir.join(&cfg.build_type).join("bin").join(&cfg.binary),
            cfg.build_dir
                .join(cfg.build_type.to_lowercase())
                .join("src")
                .join(&cfg.binary),
            cfg.build_dir
                .join(cfg.build_type.to_lowercase())
                .join("bin")
                .join(&cfg.binary),
        ];
        for path in &candidates {
            if is_executable(path) {
                return Ok(path.clone());
            }
        }
        Err(ServerError::ExecutableNotFound(candidates))
    }

    /// Build the full server command line: optional wrapper prefix, the
    /// discovered executable, listen address (endpoint minus its scheme),
    /// scheduler, and extra args.
    pub fn command_line(&self) -> Result<Vec<String>, ServerError> {
        let exe = self.find_executable()?;
        let cfg = &self.config;

        let mut args: Vec<String> = cfg.wrapper.clone();
        args.push(exe.to_string_lossy().into_owned());
        args.push("--listen".to_string());
        args.push(remove_prefix(&cfg.endpoint, "tcp://").to_string());
        args.push("--sched".to_string());
        args.push(cfg.scheduler.clone());
        args.extend(cfg.extra_args.iter().cloned());
        Ok(args)
    }

    fn spawn(&mut self) -> Result<(), ServerError> {
        let args = self.command_line()?;

        let mut cmd = Command::new(&args[0]);
        cmd.args(&args[1..]).stdin(Stdio::null());
        if self.config.hide_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        // Config env entries are defaults: they apply only when the variable
        // is not already set in the inherited environment.
        for (key, value) in &self.config.env {
            if std::env::var_os(key).is_none() {
                cmd.env(key, value);
            }
        }

        let child = cmd.spawn().map_err(ServerError::Spawn)?;
        info!(pid = child.id(), "started server");
        self.proc = Some(child);

        // Early-death window: give the server time to come up, failing fast
        // if the process exits meanwhile.
        let deadline = Instant::now() + Duration::from_secs(self.config.startup_wait_secs);
        while Instant::now() < deadline {
            let status = match self.proc.as_mut() {
                Some(child) => child.try_wait()?,
                None => None,
            };
            if let Some(status) = status {
                let detail = drain_output(self.proc.take());
                return Err(ServerError::Died {
                    status: process::describe_status(status),
                    detail,
                });
            }
            std::thread::sleep(STARTUP_POLL);
        }
        Ok(())
    }
}

impl ServerHandle for EngineServer {
    fn executor_kind(&self) -> ExecutorKind {
        ExecutorKind::Engine
    }

    fn start(&mut self) -> Result<(), ServerError> {
        match self.mode {
            Mode::Attach => {
                let args = self.command_line()?;
                println!("Start the server with the following command:");
                println!("{}", args.join(" "));
                self.prompt.pause().map_err(|e| {
                    ServerError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        e.to_string(),
                    ))
                })?;
                Ok(())
            }
            Mode::Spawn => self.spawn(),
        }
    }

    fn stop(&mut self) {
        if self.mode == Mode::Attach {
            return;
        }
        let mut child = match self.proc.take() {
            Some(child) => child,
            None => {
                warn!("server already stopped or never started");
                return;
            }
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            warn!("server already died");
            return;
        }

        info!(pid = child.id(), "stopping server");
        let grace = Duration::from_secs(self.config.kill_timeout_secs);
        match process::terminate(&mut child, grace) {
            Ok(Some(_)) => {}
            Ok(None) => {
                let hard = self
                    .prompt
                    .confirm("Server did not stop in time, kill hard?")
                    .unwrap_or(true);
                if hard {
                    info!(pid = child.id(), "force killing server");
                    if let Err(e) = process::kill_hard(&mut child) {
                        warn!(error = %e, "failed to force kill server");
                    }
                } else {
                    warn!(pid = child.id(), "leaving server running at operator request");
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to stop server, force killing");
                let _ = process::kill_hard(&mut child);
            }
        }
    }

    fn health_check(&mut self) -> Result<(), ServerError> {
        if self.mode == Mode::Attach {
            return Ok(());
        }
        let status = match self.proc.as_mut() {
            Some(child) => child.try_wait()?,
            None => return Err(ServerError::NotStarted),
        };
        if let Some(status) = status {
            let detail = drain_output(self.proc.take());
            return Err(ServerError::Died {
                status: process::describe_status(status),
                detail,
            });
        }
        Ok(())
    }
}

impl Drop for EngineServer {
    fn drop(&mut self) {
        // Backstop against leaks: a still-owned server process does not
        // outlive its handle.
        if let Some(mut child) = self.proc.take() {
            let _ = process::kill_hard(&mut child);
        }
    }
}

fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

fn remove_prefix<'a>(s: &'a str, prefix: &str) -> &'a str {
    s.strip_prefix(prefix).unwrap_or(s)
}

/// Read whatever the dead server left on its captured pipes, for the death
/// report. Empty when output was not captured.
fn drain_output(proc: Option<Child>) -> String {
    let mut report = String::new();
    if let Some(mut child) = proc {
        let mut buf = String::new();
        if let Some(ref mut out) = child.stdout {
            if out.read_to_string(&mut buf).is_ok() && !buf.trim().is_empty() {
                report.push_str("\nstandard output:\n");
                report.push_str(&buf);
            }
        }
        buf.clear();
        if let Some(ref mut err) = child.stderr {
            if err.read_to_string(&mut buf).is_ok() && !buf.trim().is_empty() {
                report.push_str("\nstandard error:\n");
                report.push_str(&buf);
            }
        }
        let _ = child.wait();
    }
    if report.len() > MAX_REPORT_BYTES {
        let mut cut = MAX_REPORT_BYTES;
        while !report.is_char_boundary(cut) {
            cut -= 1;
        }
        report.truncate(cut);
    }
    report
}
