//! CLI parse: clap types for benchrig. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Benchrig CLI - reproducible benchmark experiment driver
#[derive(Parser)]
#[command(name = "benchrig")]
#[command(about = "Drive reproducible benchmark experiments with guaranteed teardown")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (location of benchrig.toml)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an action sequence against a server
    Run {
        /// Executor to run against (engine, local, cluster)
        #[arg(long, default_value = "engine")]
        executor: String,

        /// Output directory name under the output root (default: timestamp)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Do not fail the sequence on non-zero workload exits
        #[arg(long)]
        ignore_error: bool,

        /// Print the server command and wait instead of spawning it
        #[arg(long)]
        no_server: bool,

        /// Force a server configuration preset
        #[arg(long)]
        preset: Option<String>,

        /// Action tokens: `manual` or `<name> <batch_size> <batch_num> <pause>` groups
        #[arg(trailing_var_arg = true)]
        tokens: Vec<String>,
    },
    /// List configured workloads
    Workloads {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the engine server command line and exit
    ServerCmd,
}
