//! Sequence Executor
//!
//! Applies an action list against a server lifecycle with guaranteed
//! teardown: whatever happens during dispatch, every workload process is
//! reaped or hard-killed, the server is stopped, and staged output is either
//! published atomically or discarded. The original failure, if any, is
//! re-raised only after cleanup has completed so the caller sees the root
//! cause rather than a cleanup-time symptom.

use crate::error::DriverError;
use crate::process;
use crate::prompt::Interaction;
use crate::sequence::action::Action;
use crate::server::ServerHandle;
use crate::staging::StagedDir;
use crate::workload::Workload;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const DRAIN_POLL: Duration = Duration::from_millis(250);

/// Options for one sequence run.
pub struct RunOptions<'a> {
    /// Directory the run's outputs are published to on success. Must not
    /// already exist.
    pub output_dir: PathBuf,
    /// When true, non-zero workload exits are logged instead of raised.
    pub ignore_error: bool,
    /// Prompt used for manual pauses and pre-failure inspection.
    pub interaction: &'a dyn Interaction,
}

/// Run an action sequence against a server lifecycle.
///
/// Dispatch order follows the list exactly; a health check precedes every
/// action, and one final drain barrier follows the last one. On success the
/// staging directory is published and every workload's output path is
/// rewritten to the published location before exit statuses are validated.
/// On failure the staging directory is discarded and the original error is
/// returned after cleanup.
pub fn run_sequence<S: ServerHandle>(
    server: &mut S,
    actions: Vec<Action>,
    opts: &RunOptions<'_>,
) -> Result<Vec<Workload>, DriverError> {
    let staging = StagedDir::begin(&opts.output_dir)?;
    let mut workloads: Vec<Workload> = Vec::new();

    let outcome = drive(server, actions, &mut workloads, staging.path(), opts);

    // Guaranteed cleanup, on every exit path: force-kill whatever is still
    // running, then stop the server.
    for workload in workloads.iter_mut() {
        if workload.is_running() {
            warn!(
                workload = %workload.canonical_name(),
                "killing workload that is not stopped yet"
            );
            if let Err(e) = workload.kill(true) {
                warn!(
                    workload = %workload.canonical_name(),
                    error = %e,
                    "failed to kill workload"
                );
            }
        }
    }
    server.stop();

    // Re-raise the original failure; the staging scope drops unpublished.
    outcome?;

    let published = staging.commit()?;

    // Rewrite output paths to the published location and validate exit
    // statuses. Relocation happens for every workload, including ones whose
    // failure is ignored, so partial output stays reachable downstream.
    let mut failure: Option<(String, String)> = None;
    for workload in workloads.iter_mut() {
        workload.relocate_output(&published);
        let status = match workload.exit_status() {
            Some(status) => status,
            None => continue,
        };
        if !status.success() {
            let detail = process::describe_status(status);
            if opts.ignore_error {
                warn!(
                    workload = %workload.canonical_name(),
                    status = %detail,
                    "ignoring workload failure"
                );
            } else if failure.is_none() {
                failure = Some((workload.canonical_name(), detail));
            }
        }
    }

    if let Some((name, status)) = failure {
        // Give the operator a chance to inspect before the error propagates.
        opts.interaction.pause()?;
        return Err(DriverError::WorkloadFailed { name, status });
    }

    Ok(workloads)
}

fn drive<S: ServerHandle>(
    server: &mut S,
    actions: Vec<Action>,
    workloads: &mut Vec<Workload>,
    staging: &Path,
    opts: &RunOptions<'_>,
) -> Result<(), DriverError> {
    server.start()?;

    for action in actions {
        server.health_check()?;

        match action {
            Action::LaunchWorkload(mut workload) => {
                if workload.executor() != server.executor_kind() {
                    return Err(DriverError::ExecutorMismatch {
                        name: workload.canonical_name(),
                        required: workload.executor(),
                        active: server.executor_kind(),
                    });
                }
                let output = staging.join(workload.output_file_name(workloads.len()));
                workload.launch(&output)?;
                workloads.push(workload);
            }
            Action::TimedPause(secs) => {
                info!(seconds = secs, "sleeping");
                std::thread::sleep(Duration::from_secs(secs));
            }
            Action::WaitForDrain => {
                info!(
                    count = workloads.len(),
                    "waiting for current workloads to finish"
                );
                wait_for_drain(server, workloads, None)?;
            }
            Action::ManualPause => opts.interaction.pause()?,
            Action::Callback(hook) => {
                hook(workloads.as_slice(), staging).map_err(DriverError::Callback)?
            }
        }
    }

    info!(count = workloads.len(), "waiting for all workloads to finish");
    wait_for_drain(server, workloads, None)?;
    Ok(())
}

/// Block until every launched workload has exited, polling with a fixed
/// backoff and health-checking the server each tick. With a timeout the
/// wait returns once it elapses; the return value is how many workloads are
/// still running.
pub fn wait_for_drain<S: ServerHandle>(
    server: &mut S,
    workloads: &mut [Workload],
    timeout: Option<Duration>,
) -> Result<usize, DriverError> {
    let start = Instant::now();
    loop {
        server.health_check()?;

        let mut alive = 0;
        for workload in workloads.iter_mut() {
            if workload.poll()?.is_none() {
                alive += 1;
            }
        }
        if alive == 0 {
            return Ok(0);
        }
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                return Ok(alive);
            }
        }
        std::thread::sleep(DRAIN_POLL);
    }
}
