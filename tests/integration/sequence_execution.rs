//! End-to-end tests for the sequence executor: dispatch order, cleanup
//! guarantees, and output publication.

use crate::integration::test_utils::{pid_exists, sh_workload, FakeServer};
use benchrig::error::DriverError;
use benchrig::prompt::NoopPrompt;
use benchrig::sequence::{run_sequence, wait_for_drain, Action, RunOptions};
use benchrig::workload::{ExecutorKind, Workload};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn options(output_dir: &Path) -> RunOptions<'static> {
    RunOptions {
        output_dir: output_dir.to_path_buf(),
        ignore_error: false,
        interaction: &NoopPrompt,
    }
}

/// Entries directly under `root`, for asserting nothing is left behind.
fn dir_entries(root: &Path) -> Vec<String> {
    match fs::read_dir(root) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn empty_sequence_publishes_empty_directory() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let workloads = run_sequence(&mut server, Vec::new(), &options(&output_dir)).unwrap();

    assert!(workloads.is_empty());
    assert!(server.started());
    assert_eq!(server.stop_count(), 1);
    assert!(output_dir.is_dir());
    assert_eq!(fs::read_dir(&output_dir).unwrap().count(), 0);
}

#[test]
fn successful_sequence_publishes_deterministic_names() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let alpha = Workload::new(
        "alpha",
        ExecutorKind::Local,
        vec!["sh".into(), "-c".into(), "echo alpha-out".into()],
        32,
        100,
    );
    let beta = Workload::new(
        "beta",
        ExecutorKind::Local,
        vec!["sh".into(), "-c".into(), "echo beta-out".into()],
        8,
        50,
    );
    let actions = vec![
        Action::LaunchWorkload(alpha),
        Action::LaunchWorkload(beta),
        Action::WaitForDrain,
    ];

    let workloads = run_sequence(&mut server, actions, &options(&output_dir)).unwrap();

    assert_eq!(workloads.len(), 2);
    let alpha_out = output_dir.join("alpha_32.100iter.0.output");
    let beta_out = output_dir.join("beta_8.50iter.1.output");
    assert_eq!(fs::read_to_string(&alpha_out).unwrap(), "alpha-out\n");
    assert_eq!(fs::read_to_string(&beta_out).unwrap(), "beta-out\n");

    // Workload records point at the published paths.
    assert_eq!(workloads[0].output_file().unwrap(), alpha_out);
    assert_eq!(workloads[1].output_file().unwrap(), beta_out);

    // Nothing but the published directory remains under the root.
    assert_eq!(dir_entries(root.path()), vec!["run".to_string()]);
}

#[test]
fn failing_workload_raises_after_relocation() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    // A exits 0 after 1s, B exits 1 after 2s.
    let a = sh_workload("a", "sleep 1; echo a-done");
    let b = sh_workload("b", "sleep 2; echo b-dying; exit 1");

    let pids = Arc::new(Mutex::new(Vec::new()));
    let pid_slot = Arc::clone(&pids);
    let actions = vec![
        Action::LaunchWorkload(a),
        Action::LaunchWorkload(b),
        Action::callback(move |workloads, _| {
            pid_slot
                .lock()
                .unwrap()
                .extend(workloads.iter().filter_map(|w| w.pid()));
            Ok(())
        }),
        Action::WaitForDrain,
    ];

    let err = run_sequence(&mut server, actions, &options(&output_dir)).unwrap_err();
    match err {
        DriverError::WorkloadFailed { name, status } => {
            assert_eq!(name, "b_1");
            assert!(status.contains("1"));
        }
        other => panic!("expected WorkloadFailed, got {:?}", other),
    }

    // Both outputs were relocated before the raise.
    assert_eq!(
        fs::read_to_string(output_dir.join("a_1.1iter.0.output")).unwrap(),
        "a-done\n"
    );
    assert_eq!(
        fs::read_to_string(output_dir.join("b_1.1iter.1.output")).unwrap(),
        "b-dying\n"
    );
    assert_eq!(server.stop_count(), 1);

    // No stray processes afterwards.
    let pids = pids.lock().unwrap();
    assert_eq!(pids.len(), 2);
    for pid in pids.iter() {
        assert!(!pid_exists(*pid), "workload {} still running", pid);
    }
}

#[test]
fn cleanup_kills_only_still_running_workloads() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let pids = Arc::new(Mutex::new(Vec::new()));
    let pid_slot = Arc::clone(&pids);
    let marker = root.path().join("quick-done");
    let quick = sh_workload("quick", &format!("touch {}", marker.display()));

    // The quick workload has exited by the time the callback fails; the slow
    // one is still running and is the only one cleanup has to kill.
    let actions = vec![
        Action::LaunchWorkload(quick),
        Action::LaunchWorkload(sh_workload("slow", "sleep 30")),
        Action::callback(move |workloads, _| {
            while !marker.exists() {
                std::thread::sleep(Duration::from_millis(20));
            }
            std::thread::sleep(Duration::from_millis(100));
            pid_slot
                .lock()
                .unwrap()
                .extend(workloads.iter().filter_map(|w| w.pid()));
            anyhow::bail!("abort after quick finished")
        }),
    ];

    let started = Instant::now();
    let err = run_sequence(&mut server, actions, &options(&output_dir)).unwrap_err();
    assert!(matches!(err, DriverError::Callback(_)));

    // The slow workload was killed rather than waited out, and neither
    // process survives cleanup.
    assert!(started.elapsed() < Duration::from_secs(10));
    let pids = pids.lock().unwrap();
    assert_eq!(pids.len(), 2);
    for pid in pids.iter() {
        assert!(!pid_exists(*pid), "workload {} still running", pid);
    }
    assert!(!output_dir.exists());
}

#[test]
fn ignored_failure_completes_with_outputs() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let actions = vec![
        Action::LaunchWorkload(sh_workload("bad", "echo partial; exit 7")),
        Action::WaitForDrain,
    ];
    let opts = RunOptions {
        ignore_error: true,
        ..options(&output_dir)
    };

    let workloads = run_sequence(&mut server, actions, &opts).unwrap();
    assert_eq!(workloads.len(), 1);
    assert_eq!(workloads[0].exit_status().unwrap().code(), Some(7));
    assert_eq!(
        fs::read_to_string(output_dir.join("bad_1.1iter.0.output")).unwrap(),
        "partial\n"
    );
}

#[test]
fn callback_failure_discards_staging_and_kills_workloads() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let observed_pid = Arc::new(Mutex::new(None::<u32>));
    let pid_slot = Arc::clone(&observed_pid);

    let actions = vec![
        Action::LaunchWorkload(sh_workload("straggler", "sleep 30")),
        Action::callback(move |workloads, staging| {
            assert_eq!(workloads.len(), 1);
            assert!(staging.is_dir());
            *pid_slot.lock().unwrap() = workloads[0].pid();
            anyhow::bail!("hook rejected the run")
        }),
    ];

    let started = Instant::now();
    let err = run_sequence(&mut server, actions, &options(&output_dir)).unwrap_err();
    assert!(matches!(err, DriverError::Callback(_)));

    // Cleanup hard-killed the straggler rather than waiting out its sleep.
    assert!(started.elapsed() < Duration::from_secs(10));
    let pid = observed_pid.lock().unwrap().expect("callback saw a pid");
    assert!(!pid_exists(pid), "workload process should be gone");

    // Unpublished: nothing remains under the output root.
    assert!(!output_dir.exists());
    assert!(dir_entries(root.path()).is_empty());
    assert_eq!(server.stop_count(), 1);
}

#[test]
fn dead_server_aborts_remaining_actions() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let marker = root.path().join("second-ran");
    // First health check (before the first action) passes, the next fails.
    let mut server = FakeServer::failing_after(ExecutorKind::Local, 1);

    let actions = vec![
        Action::LaunchWorkload(sh_workload("first", "sleep 30")),
        Action::LaunchWorkload(sh_workload(
            "second",
            &format!("touch {}", marker.display()),
        )),
    ];

    let err = run_sequence(&mut server, actions, &options(&output_dir)).unwrap_err();
    assert!(matches!(err, DriverError::Server(_)));

    // The second action was never applied, and nothing was published.
    assert!(!marker.exists());
    assert!(!output_dir.exists());
    assert_eq!(server.stop_count(), 1);
}

#[test]
fn executor_mismatch_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let wrong = Workload::new(
        "wrong",
        ExecutorKind::Engine,
        vec!["true".into()],
        1,
        1,
    );
    let err = run_sequence(
        &mut server,
        vec![Action::LaunchWorkload(wrong)],
        &options(&output_dir),
    )
    .unwrap_err();

    match err {
        DriverError::ExecutorMismatch {
            required, active, ..
        } => {
            assert_eq!(required, ExecutorKind::Engine);
            assert_eq!(active, ExecutorKind::Local);
        }
        other => panic!("expected ExecutorMismatch, got {:?}", other),
    }
    assert!(!output_dir.exists());
}

#[test]
fn timed_pause_blocks_for_duration() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let started = Instant::now();
    run_sequence(
        &mut server,
        vec![Action::TimedPause(1)],
        &options(&output_dir),
    )
    .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[test]
fn manual_pause_uses_interaction_stub() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    // NoopPrompt turns the manual pause into a no-op; the run completes.
    run_sequence(
        &mut server,
        vec![Action::ManualPause],
        &options(&output_dir),
    )
    .unwrap();
    assert!(output_dir.is_dir());
}

#[test]
fn mid_sequence_drain_waits_for_earlier_launches() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let marker = root.path().join("drained");
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let drained_flag = marker.clone();
    let actions = vec![
        Action::LaunchWorkload(sh_workload("quick", "sleep 1; echo done")),
        Action::WaitForDrain,
        Action::callback(move |workloads, _| {
            // The barrier guarantees the earlier launch has exited.
            assert!(workloads
                .iter()
                .all(|w| w.exit_status().is_some()));
            std::fs::write(&drained_flag, b"yes")?;
            Ok(())
        }),
    ];

    run_sequence(&mut server, actions, &options(&output_dir)).unwrap();
    assert!(marker.exists());
}

#[test]
fn drain_timeout_reports_still_running() {
    let root = tempfile::tempdir().unwrap();
    let mut server = FakeServer::healthy(ExecutorKind::Local);

    let mut w = sh_workload("slow", "sleep 30");
    w.launch(&root.path().join("slow.output")).unwrap();
    let mut workloads = vec![w];

    let alive = wait_for_drain(
        &mut server,
        &mut workloads,
        Some(Duration::from_millis(300)),
    )
    .unwrap();
    assert_eq!(alive, 1);

    workloads[0].kill(true).unwrap();
    let alive = wait_for_drain(&mut server, &mut workloads, None).unwrap();
    assert_eq!(alive, 0);
}
