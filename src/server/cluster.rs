//! Externally-defined cluster server.
//!
//! Launches a caller-supplied cluster launcher command and tracks it with
//! the same lifecycle contract as the engine server. Unlike the engine,
//! there is no executable discovery: the configuration names the command
//! verbatim.

use crate::config::ClusterConfig;
use crate::error::ServerError;
use crate::process;
use crate::server::ServerHandle;
use crate::workload::ExecutorKind;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const STARTUP_POLL: Duration = Duration::from_millis(250);

/// Handle to a cluster launched from a configured command.
#[derive(Debug)]
pub struct ClusterServer {
    config: ClusterConfig,
    proc: Option<Child>,
}

impl ClusterServer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config, proc: None }
    }
}

impl ServerHandle for ClusterServer {
    fn executor_kind(&self) -> ExecutorKind {
        ExecutorKind::Cluster
    }

    fn start(&mut self) -> Result<(), ServerError> {
        let argv = &self.config.command;
        if argv.is_empty() {
            return Err(ServerError::InvalidConfig(
                "cluster.command is empty".to_string(),
            ));
        }

        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .spawn()
            .map_err(ServerError::Spawn)?;
        info!(pid = child.id(), "started cluster launcher");
        self.proc = Some(child);

        let deadline = Instant::now() + Duration::from_secs(self.config.startup_wait_secs);
        while Instant::now() < deadline {
            let status = match self.proc.as_mut() {
                Some(child) => child.try_wait()?,
                None => None,
            };
            if let Some(status) = status {
                self.proc = None;
                return Err(ServerError::Died {
                    status: process::describe_status(status),
                    detail: String::new(),
                });
            }
            std::thread::sleep(STARTUP_POLL);
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut child = match self.proc.take() {
            Some(child) => child,
            None => {
                warn!("cluster already stopped or never started");
                return;
            }
        };
        info!(pid = child.id(), "stopping cluster launcher");
        let grace = Duration::from_secs(self.config.kill_timeout_secs);
        match process::terminate(&mut child, grace) {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                if let Err(e) = process::kill_hard(&mut child) {
                    warn!(error = %e, "failed to force kill cluster launcher");
                }
            }
        }
    }

    fn health_check(&mut self) -> Result<(), ServerError> {
        let status = match self.proc.as_mut() {
            Some(child) => child.try_wait()?,
            None => return Err(ServerError::NotStarted),
        };
        if let Some(status) = status {
            self.proc = None;
            return Err(ServerError::Died {
                status: process::describe_status(status),
                detail: String::new(),
            });
        }
        Ok(())
    }
}

impl Drop for ClusterServer {
    fn drop(&mut self) {
        if let Some(mut child) = self.proc.take() {
            let _ = process::kill_hard(&mut child);
        }
    }
}
