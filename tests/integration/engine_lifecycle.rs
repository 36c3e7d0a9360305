//! Engine-server sequences end to end: fake build tree, spawn, health
//! monitoring, and teardown.

use benchrig::config::ServerConfig;
use benchrig::error::DriverError;
use benchrig::prompt::NoopPrompt;
use benchrig::sequence::{run_sequence, Action, RunOptions};
use benchrig::server::EngineServer;
use benchrig::workload::{ExecutorKind, Workload};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

/// Lay out a fake build tree whose "server" runs the given shell script.
fn fake_build(root: &Path, script: &str) -> ServerConfig {
    let bin_dir = root.join("build").join("Release").join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    let exe = bin_dir.join("rig-server");
    std::fs::write(&exe, format!("#!/bin/sh\n{}\n", script)).unwrap();
    let mut perms = std::fs::metadata(&exe).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&exe, perms).unwrap();

    ServerConfig {
        build_dir: root.join("build"),
        startup_wait_secs: 0,
        kill_timeout_secs: 1,
        ..Default::default()
    }
}

fn engine_workload(name: &str, script: &str) -> Workload {
    Workload::new(
        name,
        ExecutorKind::Engine,
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        1,
        1,
    )
}

#[test]
fn engine_sequence_publishes_and_tears_down() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let config = fake_build(root.path(), "sleep 30");
    let mut server = EngineServer::new(config).with_interaction(Box::new(NoopPrompt));

    let actions = vec![
        Action::LaunchWorkload(
            engine_workload("client", "echo endpoint is {endpoint}")
                .with_endpoint("tcp://127.0.0.1:5501"),
        ),
        Action::WaitForDrain,
    ];
    let opts = RunOptions {
        output_dir: output_dir.clone(),
        ignore_error: false,
        interaction: &NoopPrompt,
    };

    let workloads = run_sequence(&mut server, actions, &opts).unwrap();
    assert_eq!(workloads.len(), 1);
    let contents =
        std::fs::read_to_string(output_dir.join("client_1.1iter.0.output")).unwrap();
    assert_eq!(contents, "endpoint is tcp://127.0.0.1:5501\n");
}

#[test]
fn engine_death_mid_sequence_aborts_and_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    // The server dies on its own after one second.
    let config = fake_build(root.path(), "sleep 1");
    let mut server = EngineServer::new(config).with_interaction(Box::new(NoopPrompt));

    let actions = vec![
        Action::LaunchWorkload(engine_workload("victim", "sleep 30")),
        Action::TimedPause(2),
        Action::LaunchWorkload(engine_workload("never", "sleep 30")),
    ];
    let opts = RunOptions {
        output_dir: output_dir.clone(),
        ignore_error: false,
        interaction: &NoopPrompt,
    };

    let started = Instant::now();
    let err = run_sequence(&mut server, actions, &opts).unwrap_err();
    match err {
        DriverError::Server(e) => assert!(e.to_string().contains("died")),
        other => panic!("expected server error, got {:?}", other),
    }

    // Cleanup killed the running workload instead of waiting out its sleep,
    // and nothing was published.
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!output_dir.exists());
}

#[test]
fn engine_rejects_local_workload() {
    let root = tempfile::tempdir().unwrap();
    let output_dir = root.path().join("run");
    let config = fake_build(root.path(), "sleep 30");
    let mut server = EngineServer::new(config).with_interaction(Box::new(NoopPrompt));

    let local = Workload::new(
        "misfit",
        ExecutorKind::Local,
        vec!["true".to_string()],
        1,
        1,
    );
    let opts = RunOptions {
        output_dir,
        ignore_error: false,
        interaction: &NoopPrompt,
    };

    let err = run_sequence(&mut server, vec![Action::LaunchWorkload(local)], &opts).unwrap_err();
    assert!(matches!(err, DriverError::ExecutorMismatch { .. }));
}
