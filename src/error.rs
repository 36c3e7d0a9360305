//! Error types for the benchrig experiment driver.

use crate::workload::ExecutorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Server lifecycle errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot find server executable, examined candidates: {0:?}")]
    ExecutableNotFound(Vec<PathBuf>),

    #[error("failed to spawn server process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),

    #[error("server is not yet started")]
    NotStarted,

    #[error("server died unexpectedly with {status}{detail}")]
    Died { status: String, detail: String },

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Driver-level errors for sequence execution and the CLI surface
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(
        "workload `{name}` requires the {required} executor but the sequence runs against {active}"
    )]
    ExecutorMismatch {
        name: String,
        required: ExecutorKind,
        active: ExecutorKind,
    },

    #[error("workload `{0}` was already launched")]
    AlreadyLaunched(String),

    #[error("workload `{0}` has not been launched")]
    NotLaunched(String),

    #[error("workload `{name}` did not finish cleanly: {status}")]
    WorkloadFailed { name: String, status: String },

    #[error("output file not found after running: {0}")]
    OutputMissing(PathBuf),

    #[error("pattern `{pattern}` not found in output file {file}")]
    PatternNotFound { pattern: String, file: PathBuf },

    #[error("output directory already exists: {0}")]
    OutputExists(PathBuf),

    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("callback failed: {0}")]
    Callback(#[source] anyhow::Error),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DriverError {
    fn from(err: config::ConfigError) -> Self {
        DriverError::Config(err.to_string())
    }
}

impl From<regex::Error> for DriverError {
    fn from(err: regex::Error) -> Self {
        DriverError::Usage(format!("invalid pattern: {}", err))
    }
}
