//! Child process plumbing.
//!
//! Small helpers over `std::process::Child`: bounded waits via polling,
//! graceful termination with SIGKILL escalation, and unconditional hard
//! kills. Waits never spin; the poll interval is fixed at 50ms.

use std::process::{Child, ExitStatus};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Wait for a child to exit, up to `timeout`. Returns `Ok(None)` if the
/// child is still running when the timeout elapses.
pub fn wait_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        match child.try_wait()? {
            Some(status) => return Ok(Some(status)),
            None => {
                if start.elapsed() >= timeout {
                    return Ok(None);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Ask a child to terminate with SIGTERM and wait up to `grace` for it to
/// exit. Returns the exit status if the child exited within the grace
/// window, `None` if it is still alive afterwards.
pub fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<Option<ExitStatus>> {
    if let Some(status) = child.try_wait()? {
        return Ok(Some(status));
    }

    let pid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    wait_timeout(child, grace)
}

/// Kill a child with SIGKILL and reap it. Killing an already-exited child is
/// a no-op beyond reaping.
pub fn kill_hard(child: &mut Child) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    child.kill()?;
    child.wait()
}

/// Render an exit status for logs and error messages: the exit code when the
/// process exited normally, otherwise the raw status (signal) description.
pub fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => status.to_string(),
    }
}
