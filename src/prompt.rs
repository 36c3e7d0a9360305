//! Human interaction prompts.
//!
//! Manual pauses and kill-escalation confirmations go through the
//! [`Interaction`] trait so that automated runs and tests can substitute a
//! no-op implementation.

use crate::error::DriverError;
use dialoguer::Confirm;

/// Blocking human-interaction points used by the sequence executor and the
/// server wrappers.
pub trait Interaction {
    /// Block until the operator acknowledges (press enter to continue).
    fn pause(&self) -> Result<(), DriverError>;

    /// Ask a yes/no question; returns the operator's answer.
    fn confirm(&self, message: &str) -> Result<bool, DriverError>;
}

/// Console prompts backed by `dialoguer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl Interaction for ConsolePrompt {
    fn pause(&self) -> Result<(), DriverError> {
        Confirm::new()
            .with_prompt("Paused. Continue?")
            .default(true)
            .show_default(false)
            .interact()
            .map_err(|e| DriverError::Prompt(e.to_string()))?;
        Ok(())
    }

    fn confirm(&self, message: &str) -> Result<bool, DriverError> {
        Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .map_err(|e| DriverError::Prompt(e.to_string()))
    }
}

/// Non-interactive stub: pauses are no-ops and confirmations always answer
/// yes. Used in tests and batch runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPrompt;

impl Interaction for NoopPrompt {
    fn pause(&self) -> Result<(), DriverError> {
        Ok(())
    }

    fn confirm(&self, _message: &str) -> Result<bool, DriverError> {
        Ok(true)
    }
}
