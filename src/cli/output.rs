//! CLI output: error mapping from domain errors to a stable CLI surface.

use crate::error::DriverError;

/// Map domain errors to a string for CLI output.
/// Keeps route handlers thin; extend with stable categories if needed.
pub fn map_error(e: &DriverError) -> String {
    e.to_string()
}
