//! Named server-configuration presets.
//!
//! A preset rewrites the scheduling-relevant parts of a [`ServerConfig`]
//! while leaving deployment settings (build tree, endpoint, environment)
//! untouched. Selected from configuration or with `--preset`.

use crate::config::ServerConfig;
use crate::error::DriverError;

/// Preset names, in listing order.
pub const NAMES: &[&str] = &["fair", "packed", "exclusive"];

/// Apply a named preset on top of the given server configuration.
pub fn apply(name: &str, base: ServerConfig) -> Result<ServerConfig, DriverError> {
    let mut cfg = base;
    match name {
        "fair" => {
            cfg.scheduler = "fair".to_string();
        }
        "packed" => {
            cfg.scheduler = "packed".to_string();
            cfg.extra_args.push("--disable-admission-control".to_string());
        }
        "exclusive" => {
            cfg.scheduler = "exclusive".to_string();
            cfg.extra_args.push("--max-sessions".to_string());
            cfg.extra_args.push("1".to_string());
        }
        other => {
            return Err(DriverError::Usage(format!(
                "unknown preset `{}` (expected one of {:?})",
                other, NAMES
            )))
        }
    }
    Ok(cfg)
}
