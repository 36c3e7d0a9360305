//! The action model: one closed set of experiment steps.

use crate::workload::Workload;
use std::fmt;
use std::path::Path;

/// Signature for user-supplied hooks: a read-only view of the workloads
/// launched so far plus the staging directory path. The return value is
/// ignored on success; an error fails the sequence.
pub type CallbackFn = Box<dyn FnOnce(&[Workload], &Path) -> anyhow::Result<()>>;

/// One step in an experiment sequence.
///
/// Actions are immutable once constructed and do not know their position in
/// the sequence; each is consumed exactly once by the executor.
pub enum Action {
    /// Launch a workload against the active server
    LaunchWorkload(Workload),
    /// Sleep the controlling thread for the given number of seconds
    TimedPause(u64),
    /// Block until every workload launched so far has exited
    WaitForDrain,
    /// Block on a human-interaction prompt
    ManualPause,
    /// Run an arbitrary hook
    Callback(CallbackFn),
}

impl Action {
    /// Convenience constructor for callback actions.
    pub fn callback<F>(hook: F) -> Self
    where
        F: FnOnce(&[Workload], &Path) -> anyhow::Result<()> + 'static,
    {
        Action::Callback(Box::new(hook))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::LaunchWorkload(w) => f
                .debug_tuple("LaunchWorkload")
                .field(&w.canonical_name())
                .finish(),
            Action::TimedPause(secs) => f.debug_tuple("TimedPause").field(secs).finish(),
            Action::WaitForDrain => write!(f, "WaitForDrain"),
            Action::ManualPause => write!(f, "ManualPause"),
            Action::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}
