//! Shared test utilities for integration tests
//!
//! Provides a scriptable fake server and shell-backed workloads so the
//! sequence engine can be exercised without a real compute server.

use benchrig::error::ServerError;
use benchrig::server::ServerHandle;
use benchrig::workload::{ExecutorKind, Workload};

/// A server handle with scriptable health behavior.
pub struct FakeServer {
    kind: ExecutorKind,
    healthy_checks: Option<usize>,
    checks: usize,
    started: bool,
    stop_count: usize,
}

impl FakeServer {
    /// A server that is always healthy.
    pub fn healthy(kind: ExecutorKind) -> Self {
        Self {
            kind,
            healthy_checks: None,
            checks: 0,
            started: false,
            stop_count: 0,
        }
    }

    /// A server whose health check fails after `n` successful checks.
    pub fn failing_after(kind: ExecutorKind, n: usize) -> Self {
        Self {
            healthy_checks: Some(n),
            ..Self::healthy(kind)
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn stop_count(&self) -> usize {
        self.stop_count
    }
}

impl ServerHandle for FakeServer {
    fn executor_kind(&self) -> ExecutorKind {
        self.kind
    }

    fn start(&mut self) -> Result<(), ServerError> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_count += 1;
    }

    fn health_check(&mut self) -> Result<(), ServerError> {
        self.checks += 1;
        if let Some(limit) = self.healthy_checks {
            if self.checks > limit {
                return Err(ServerError::Died {
                    status: "exit code 1".to_string(),
                    detail: String::new(),
                });
            }
        }
        Ok(())
    }
}

/// A local workload running the given shell script.
pub fn sh_workload(name: &str, script: &str) -> Workload {
    Workload::new(
        name,
        ExecutorKind::Local,
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        1,
        1,
    )
}

/// Whether a process with the given pid currently exists.
pub fn pid_exists(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}
