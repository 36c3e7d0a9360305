//! Workload Handles
//!
//! A workload is one client benchmark process: a named command-line template
//! bound to a batch size and a declared iteration count. Launching a
//! workload spawns exactly one OS process with its stdout and stderr
//! redirected into the output file it was given. The driver observes the
//! process by polling; once it has exited, its exit status never changes.

use crate::error::DriverError;
use crate::process;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::info;

/// Grace window between SIGTERM and SIGKILL for soft kills.
const SOFT_KILL_GRACE: Duration = Duration::from_secs(5);

/// The server variant a workload is compatible with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Runs against the managed engine server
    Engine,
    /// Runs standalone, no server required
    Local,
    /// Runs against an externally-launched cluster
    Cluster,
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Engine => write!(f, "engine"),
            ExecutorKind::Local => write!(f, "local"),
            ExecutorKind::Cluster => write!(f, "cluster"),
        }
    }
}

impl std::str::FromStr for ExecutorKind {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "engine" => Ok(ExecutorKind::Engine),
            "local" => Ok(ExecutorKind::Local),
            "cluster" => Ok(ExecutorKind::Cluster),
            other => Err(DriverError::Usage(format!(
                "unknown executor `{}` (expected engine, local, or cluster)",
                other
            ))),
        }
    }
}

/// A named workload definition as it appears in configuration: the executor
/// it must run against and the argv template it compiles to.
///
/// Template tokens may contain `{batch_size}`, `{batch_num}`, and
/// `{endpoint}` placeholders, substituted at launch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadDef {
    pub executor: ExecutorKind,
    pub command: Vec<String>,
}

/// Registry of workload definitions, keyed by workload name.
#[derive(Debug, Clone, Default)]
pub struct WorkloadRegistry {
    defs: HashMap<String, WorkloadDef>,
}

impl WorkloadRegistry {
    pub fn new(defs: HashMap<String, WorkloadDef>) -> Self {
        Self { defs }
    }

    /// Instantiate a workload from a registered definition.
    pub fn create(
        &self,
        name: &str,
        batch_size: u32,
        batch_num: u32,
    ) -> Result<Workload, DriverError> {
        let def = self.defs.get(name).ok_or_else(|| {
            DriverError::Usage(format!("unknown workload `{}`", name))
        })?;
        Ok(Workload::new(
            name,
            def.executor,
            def.command.clone(),
            batch_size,
            batch_num,
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in name order, for stable listings.
    pub fn sorted(&self) -> Vec<(&String, &WorkloadDef)> {
        let mut entries: Vec<_> = self.defs.iter().collect();
        entries.sort_by_key(|(name, _)| name.as_str());
        entries
    }
}

/// One client workload tracked by the driver.
#[derive(Debug)]
pub struct Workload {
    name: String,
    executor: ExecutorKind,
    command: Vec<String>,
    batch_size: u32,
    batch_num: u32,
    endpoint: String,
    proc: Option<Child>,
    output_file: Option<PathBuf>,
    exit_status: Option<ExitStatus>,
}

impl Workload {
    pub fn new(
        name: &str,
        executor: ExecutorKind,
        command: Vec<String>,
        batch_size: u32,
        batch_num: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            executor,
            command,
            batch_size,
            batch_num,
            endpoint: String::new(),
            proc: None,
            output_file: None,
            exit_status: None,
        }
    }

    /// Set the server endpoint substituted for `{endpoint}` in the template.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> ExecutorKind {
        self.executor
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub fn batch_num(&self) -> u32 {
        self.batch_num
    }

    /// Identity used in logs, error messages, and output file names.
    pub fn canonical_name(&self) -> String {
        format!("{}_{}", self.name, self.batch_size)
    }

    /// Deterministic output file name for this workload at the given launch
    /// ordinal: `{canonicalName}.{batchNum}iter.{ordinal}.output`.
    pub fn output_file_name(&self, ordinal: usize) -> String {
        format!(
            "{}.{}iter.{}.output",
            self.canonical_name(),
            self.batch_num,
            ordinal
        )
    }

    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.proc.as_ref().map(|p| p.id())
    }

    /// Exit status, if the process has been observed to exit.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    fn resolve_command(&self) -> Vec<String> {
        self.command
            .iter()
            .map(|tok| {
                tok.replace("{batch_size}", &self.batch_size.to_string())
                    .replace("{batch_num}", &self.batch_num.to_string())
                    .replace("{endpoint}", &self.endpoint)
            })
            .collect()
    }

    /// Spawn the workload process, writing stdout and stderr to
    /// `output_file`. A workload launches at most once.
    pub fn launch(&mut self, output_file: &Path) -> Result<(), DriverError> {
        if self.proc.is_some() {
            return Err(DriverError::AlreadyLaunched(self.canonical_name()));
        }

        let argv = self.resolve_command();
        if argv.is_empty() {
            return Err(DriverError::Config(format!(
                "workload `{}` has an empty command",
                self.name
            )));
        }

        let stdout = File::create(output_file)?;
        let stderr = stdout.try_clone()?;
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()?;

        info!(
            workload = %self.canonical_name(),
            pid = child.id(),
            output = %output_file.display(),
            "launched workload"
        );

        self.output_file = Some(output_file.to_path_buf());
        self.proc = Some(child);
        Ok(())
    }

    /// Poll the process without blocking. Caches the exit status on the
    /// running-to-exited transition and logs it exactly once.
    pub fn poll(&mut self) -> Result<Option<ExitStatus>, DriverError> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }
        let child = match self.proc.as_mut() {
            Some(child) => child,
            None => return Err(DriverError::NotLaunched(self.canonical_name())),
        };
        match child.try_wait()? {
            Some(status) => {
                info!(
                    workload = %self.canonical_name(),
                    status = %process::describe_status(status),
                    "workload exited"
                );
                self.exit_status = Some(status);
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Whether the process is currently running. Unlaunched workloads are
    /// not running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.poll(), Ok(None))
    }

    /// Stop the workload process. `hard` sends SIGKILL immediately;
    /// otherwise SIGTERM with a grace window, escalating to SIGKILL.
    /// Killing an exited or unlaunched workload is a no-op.
    pub fn kill(&mut self, hard: bool) -> Result<Option<ExitStatus>, DriverError> {
        if self.exit_status.is_some() {
            return Ok(self.exit_status);
        }
        let child = match self.proc.as_mut() {
            Some(child) => child,
            None => return Ok(None),
        };
        let status = if hard {
            process::kill_hard(child)?
        } else {
            match process::terminate(child, SOFT_KILL_GRACE)? {
                Some(status) => status,
                None => process::kill_hard(child)?,
            }
        };
        info!(
            workload = %self.canonical_name(),
            status = %process::describe_status(status),
            "stopped workload"
        );
        self.exit_status = Some(status);
        Ok(Some(status))
    }

    /// Rewrite the recorded output path from the staging location to the
    /// published root, preserving the file name.
    pub fn relocate_output(&mut self, published_root: &Path) {
        if let Some(file) = self.output_file.take() {
            let name = file.file_name().map(|n| n.to_os_string());
            self.output_file = Some(match name {
                Some(name) => published_root.join(name),
                None => file,
            });
        }
    }
}
