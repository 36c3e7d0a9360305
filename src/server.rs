//! Server Handles
//!
//! The sequence executor is generic over a [`ServerHandle`]: the lifecycle
//! contract of the long-running compute server an experiment runs against.
//! Three implementations cover the supported executor variants: the managed
//! [`EngineServer`], the externally-launched [`ClusterServer`], and the
//! serverless [`NullServer`].

mod cluster;
mod engine;

pub use cluster::ClusterServer;
pub use engine::EngineServer;

use crate::error::ServerError;
use crate::workload::ExecutorKind;

/// Lifecycle contract for the server a sequence runs against.
pub trait ServerHandle {
    /// The executor kind workloads must declare to run against this server.
    fn executor_kind(&self) -> ExecutorKind;

    /// Start the server and block until it is accepting work, or fail with
    /// a startup error. Must be called at most once per run.
    fn start(&mut self) -> Result<(), ServerError>;

    /// Stop the server. Best-effort and idempotent; part of the guaranteed
    /// cleanup path, so it must not fail the run.
    fn stop(&mut self);

    /// Verify the server is still alive. An error here aborts the sequence.
    fn health_check(&mut self) -> Result<(), ServerError>;
}

/// Server handle for the serverless variant: workloads run standalone and
/// every lifecycle operation is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullServer;

impl ServerHandle for NullServer {
    fn executor_kind(&self) -> ExecutorKind {
        ExecutorKind::Local
    }

    fn start(&mut self) -> Result<(), ServerError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn health_check(&mut self) -> Result<(), ServerError> {
        Ok(())
    }
}
