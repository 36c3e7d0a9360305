//! Configuration System
//!
//! Layered configuration for the driver: built-in defaults, the global
//! config file (`$XDG_CONFIG_HOME/benchrig/config.toml` or
//! `~/.config/benchrig/config.toml`), a workspace-local `benchrig.toml`,
//! then `BENCHRIG_*` environment variables, each layer overriding the one
//! below it.

use crate::error::DriverError;
use crate::logging::LoggingConfig;
use crate::workload::WorkloadDef;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod presets;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    /// Root directory published experiment outputs land under
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// When true, a non-zero workload exit is logged instead of raised
    #[serde(default)]
    pub ignore_error: bool,

    /// Managed engine server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Cluster launcher settings
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Workload registry: name to definition
    #[serde(default)]
    pub workloads: HashMap<String, WorkloadDef>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_output_root() -> PathBuf {
    PathBuf::from("results")
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            ignore_error: false,
            server: ServerConfig::default(),
            cluster: ClusterConfig::default(),
            workloads: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Managed engine server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Build tree the server executable is discovered under
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Build type subdirectory (also tried lowercased)
    #[serde(default = "default_build_type")]
    pub build_type: String,

    /// Server executable name
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Endpoint the server listens on and workloads connect to
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Scheduling policy passed to the server
    #[serde(default = "default_scheduler")]
    pub scheduler: String,

    /// Additional server arguments
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Command prefix the server is launched under (e.g. a profiler)
    #[serde(default)]
    pub wrapper: Vec<String>,

    /// Environment defaults applied when not already set
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Seconds to watch for early death after spawning
    #[serde(default = "default_startup_wait")]
    pub startup_wait_secs: u64,

    /// Grace window between SIGTERM and SIGKILL when stopping
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout_secs: u64,

    /// Capture server stdout/stderr instead of inheriting the terminal
    #[serde(default = "default_true")]
    pub hide_output: bool,
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_build_type() -> String {
    "Release".to_string()
}

fn default_binary() -> String {
    "rig-server".to_string()
}

fn default_endpoint() -> String {
    "tcp://127.0.0.1:5501".to_string()
}

fn default_scheduler() -> String {
    "fair".to_string()
}

fn default_startup_wait() -> u64 {
    5
}

fn default_kill_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            build_type: default_build_type(),
            binary: default_binary(),
            endpoint: default_endpoint(),
            scheduler: default_scheduler(),
            extra_args: Vec::new(),
            wrapper: Vec::new(),
            env: HashMap::new(),
            startup_wait_secs: default_startup_wait(),
            kill_timeout_secs: default_kill_timeout(),
            hide_output: default_true(),
        }
    }
}

/// Cluster launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Launcher command, verbatim
    #[serde(default)]
    pub command: Vec<String>,

    /// Seconds to watch for early death after spawning
    #[serde(default = "default_startup_wait")]
    pub startup_wait_secs: u64,

    /// Grace window between SIGTERM and SIGKILL when stopping
    #[serde(default = "default_kill_timeout")]
    pub kill_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            startup_wait_secs: default_startup_wait(),
            kill_timeout_secs: default_kill_timeout(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Server(String),
    Workload(String, String),
    System(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Server(msg) => write!(f, "server: {}", msg),
            ValidationError::Workload(name, msg) => write!(f, "workload '{}': {}", name, msg),
            ValidationError::System(msg) => write!(f, "system: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RigConfig {
    /// Validate the entire configuration, aggregating all problems.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.output_root.as_os_str().is_empty() {
            errors.push(ValidationError::System(
                "output_root cannot be empty".to_string(),
            ));
        }
        if self.server.endpoint.is_empty() {
            errors.push(ValidationError::Server("endpoint cannot be empty".to_string()));
        }
        if self.server.scheduler.is_empty() {
            errors.push(ValidationError::Server(
                "scheduler cannot be empty".to_string(),
            ));
        }
        for (name, def) in &self.workloads {
            if def.command.is_empty() {
                errors.push(ValidationError::Workload(
                    name.clone(),
                    "command cannot be empty".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads configuration from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace: global file, then
    /// `<workspace>/benchrig.toml`, then environment overrides.
    pub fn load(workspace: &Path) -> Result<RigConfig, DriverError> {
        let mut builder = Config::builder();

        if let Some(global) = global_config_path() {
            if global.exists() {
                debug!(path = %global.display(), "loading global config");
                builder = builder.add_source(File::from(global).required(false));
            }
        }

        let local = workspace.join("benchrig.toml");
        if local.exists() {
            debug!(path = %local.display(), "loading workspace config");
            builder = builder.add_source(File::from(local).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("BENCHRIG")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// Load configuration from an explicit file, skipping the layered
    /// sources except environment overrides.
    pub fn load_from_file(path: &Path) -> Result<RigConfig, DriverError> {
        let builder = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(true))
            .add_source(
                Environment::with_prefix("BENCHRIG")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::finish(builder)
    }

    fn finish(
        builder: config::builder::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<RigConfig, DriverError> {
        let cfg: RigConfig = builder.build()?.try_deserialize()?;
        cfg.validate().map_err(|errors| {
            DriverError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(cfg)
    }
}

/// Path to the global config file, honoring XDG_CONFIG_HOME.
pub fn global_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("benchrig").join("config.toml"));
        }
    }
    std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("benchrig")
            .join("config.toml")
    })
}
