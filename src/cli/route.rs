//! CLI route: single route table and run context. Dispatches to the
//! sequence engine and formats results for the terminal.

use crate::cli::parse::Commands;
use crate::config::{presets, ConfigLoader, RigConfig};
use crate::error::DriverError;
use crate::prompt::ConsolePrompt;
use crate::sequence::{parse_actions, run_sequence, Action, RunOptions};
use crate::server::{ClusterServer, EngineServer, NullServer};
use crate::workload::{ExecutorKind, Workload, WorkloadRegistry};
use comfy_table::Table;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Runtime context for CLI execution: resolved configuration plus the
/// workspace root relative paths are anchored to.
pub struct RunContext {
    config: RigConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Create a run context from a workspace root and optional explicit
    /// config path, using `ConfigLoader` only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, DriverError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self {
            config,
            workspace_root,
        })
    }

    /// Create a run context from an already-resolved configuration.
    pub fn from_config(config: RigConfig, workspace_root: PathBuf) -> Self {
        Self {
            config,
            workspace_root,
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Execute a CLI command, returning its terminal output.
    pub fn execute(&self, command: &Commands) -> Result<String, DriverError> {
        match command {
            Commands::Run {
                executor,
                output,
                ignore_error,
                no_server,
                preset,
                tokens,
            } => self.cmd_run(
                executor,
                output.as_deref(),
                *ignore_error,
                *no_server,
                preset.as_deref(),
                tokens,
            ),
            Commands::Workloads { format } => self.cmd_workloads(format),
            Commands::ServerCmd => self.cmd_server_cmd(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn cmd_run(
        &self,
        executor: &str,
        output: Option<&std::path::Path>,
        ignore_error: bool,
        no_server: bool,
        preset: Option<&str>,
        tokens: &[String],
    ) -> Result<String, DriverError> {
        let kind: ExecutorKind = executor.parse()?;
        if no_server && kind != ExecutorKind::Engine {
            return Err(DriverError::Usage(
                "--no-server only applies to the engine executor".to_string(),
            ));
        }

        let mut server_config = self.config.server.clone();
        if let Some(name) = preset {
            info!(preset = %name, "using server config preset");
            server_config = presets::apply(name, server_config)?;
        }

        let registry = WorkloadRegistry::new(self.config.workloads.clone());
        let mut actions = parse_actions(&registry, tokens)?;
        if kind == ExecutorKind::Engine {
            let endpoint = server_config.endpoint.clone();
            actions = actions
                .into_iter()
                .map(|action| match action {
                    Action::LaunchWorkload(w) => {
                        Action::LaunchWorkload(w.with_endpoint(&endpoint))
                    }
                    other => other,
                })
                .collect();
        }

        let output_dir = self.resolve_output_dir(output);
        let prompt = ConsolePrompt;
        let opts = RunOptions {
            output_dir: output_dir.clone(),
            ignore_error: ignore_error || self.config.ignore_error,
            interaction: &prompt,
        };

        let workloads = match kind {
            ExecutorKind::Engine => {
                let mut server = if no_server {
                    EngineServer::attached(server_config)
                } else {
                    EngineServer::new(server_config)
                };
                run_sequence(&mut server, actions, &opts)?
            }
            ExecutorKind::Local => {
                let mut server = NullServer;
                run_sequence(&mut server, actions, &opts)?
            }
            ExecutorKind::Cluster => {
                let mut server = ClusterServer::new(self.config.cluster.clone());
                run_sequence(&mut server, actions, &opts)?
            }
        };

        Ok(format_run_summary(&workloads, &output_dir))
    }

    fn cmd_workloads(&self, format: &str) -> Result<String, DriverError> {
        let registry = WorkloadRegistry::new(self.config.workloads.clone());
        match format {
            "json" => {
                let ordered: BTreeMap<_, _> = self.config.workloads.iter().collect();
                Ok(serde_json::to_string_pretty(&ordered)
                    .map_err(|e| DriverError::Config(e.to_string()))?)
            }
            "text" => {
                if registry.is_empty() {
                    return Ok("no workloads configured".to_string());
                }
                let mut table = Table::new();
                table.set_header(vec!["Name", "Executor", "Command"]);
                for (name, def) in registry.sorted() {
                    table.add_row(vec![
                        name.clone(),
                        def.executor.to_string(),
                        def.command.join(" "),
                    ]);
                }
                Ok(table.to_string())
            }
            other => Err(DriverError::Usage(format!(
                "unknown format `{}` (expected text or json)",
                other
            ))),
        }
    }

    fn cmd_server_cmd(&self) -> Result<String, DriverError> {
        let server = EngineServer::new(self.config.server.clone());
        let args = server.command_line()?;
        Ok(args.join(" "))
    }

    /// Resolve the run's publish directory: an explicit name under the
    /// output root, or a timestamped default. A relative output root is
    /// anchored at the workspace.
    fn resolve_output_dir(&self, output: Option<&std::path::Path>) -> PathBuf {
        let root = if self.config.output_root.is_absolute() {
            self.config.output_root.clone()
        } else {
            self.workspace_root.join(&self.config.output_root)
        };
        match output {
            Some(name) => root.join(name),
            None => root.join(chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()),
        }
    }
}

fn format_run_summary(workloads: &[Workload], output_dir: &std::path::Path) -> String {
    let mut out = String::new();
    for workload in workloads {
        let ok = workload
            .exit_status()
            .map(|s| s.success())
            .unwrap_or(false);
        let marker = if ok {
            "ok".green().to_string()
        } else {
            "failed".red().to_string()
        };
        out.push_str(&format!("{:<32} {}\n", workload.canonical_name(), marker));
    }
    out.push_str(&format!(
        "published {} workload output(s) to {}",
        workloads.len(),
        output_dir.display()
    ));
    out
}
