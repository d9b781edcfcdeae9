//! Supervisor tests against the in-memory mock process table
//!
//! Timing-sensitive tests run under tokio's paused clock, so watch intervals
//! elapse instantly and deterministically.

use super::adapters::{MockInspector, MockLauncher, MockTableHandle};
use super::*;
use schema::{ProcessIdentity, SupervisionSpec};
use std::time::Duration;
use tempfile::TempDir;

fn test_spec(dir: &TempDir, command: &str) -> SupervisionSpec {
    SupervisionSpec {
        command: command.to_string(),
        args: Vec::new(),
        stdout_file: None,
        stderr_file: None,
        pid_file: dir
            .path()
            .join("supervised.pid")
            .to_string_lossy()
            .into_owned(),
        command_unique: false,
        keep_alive: false,
        wait_for_exit: false,
        watch_interval_secs: 1,
        log_rotate_size_bytes: 0,
    }
}

fn table_row(pid: i32, command: &str) -> ProcessIdentity {
    ProcessIdentity {
        pid,
        parent_pid: 1,
        group_id: pid,
        session_id: pid,
        state: "S".to_string(),
        command: command.to_string(),
    }
}

fn mock_supervisor(spec: SupervisionSpec, table: &MockTableHandle) -> Supervisor {
    Supervisor::with_adapters(
        spec,
        Arc::new(MockInspector::new(table.clone())),
        Arc::new(MockLauncher::new(table.clone())),
    )
}

#[tokio::test]
async fn test_ensure_running_spawns_when_nothing_is_running() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);

    sup.ensure_running().await.unwrap();

    assert_eq!(table.spawn_count(), 1);
    let identity = sup.identity().expect("identity resolved");
    assert!(identity.pid > 0);
    assert_eq!(identity.command, "worker");
    assert_eq!(identity.session_id, identity.pid);
    assert!(table.contains(identity.pid));
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), identity.pid);
}

#[tokio::test]
async fn test_ensure_running_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);

    sup.ensure_running().await.unwrap();
    let first_pid = sup.identity().unwrap().pid;

    sup.ensure_running().await.unwrap();

    assert_eq!(table.spawn_count(), 1);
    assert_eq!(sup.identity().unwrap().pid, first_pid);
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), first_pid);
}

#[tokio::test]
async fn test_killed_process_is_replaced_on_next_ensure() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);

    sup.ensure_running().await.unwrap();
    let first_pid = sup.identity().unwrap().pid;

    table.kill(first_pid);
    sup.ensure_running().await.unwrap();

    assert_eq!(table.spawn_count(), 2);
    let second_pid = sup.identity().unwrap().pid;
    assert_ne!(second_pid, first_pid);
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), second_pid);
}

#[tokio::test]
async fn test_reused_pid_is_not_mistaken_for_the_supervised_process() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let spec = test_spec(&dir, "worker");

    // Pid file points at a live process that belongs to someone else now
    table.insert(table_row(4242, "other"));
    pidfile::save(&spec.pid_file, 4242).unwrap();

    let mut sup = mock_supervisor(spec, &table);
    sup.ensure_running().await.unwrap();

    assert_eq!(table.spawn_count(), 1);
    let pid = sup.identity().unwrap().pid;
    assert_ne!(pid, 4242);
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), pid);
}

#[tokio::test]
async fn test_adopts_process_found_by_name_scan() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut spec = test_spec(&dir, "sleeper");
    spec.command_unique = true;

    table.insert(table_row(777, "sleeper"));

    let mut sup = mock_supervisor(spec, &table);
    sup.ensure_running().await.unwrap();

    assert_eq!(table.spawn_count(), 0);
    assert_eq!(sup.identity().unwrap().pid, 777);
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), 777);
}

#[tokio::test]
async fn test_name_scan_adopts_lowest_pid() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut spec = test_spec(&dir, "racer");
    spec.command_unique = true;
    for pid in [900, 300, 600] {
        table.insert(table_row(pid, "racer"));
    }

    let mut sup = mock_supervisor(spec, &table);
    sup.ensure_running().await.unwrap();

    assert_eq!(table.spawn_count(), 0);
    assert_eq!(sup.identity().unwrap().pid, 300);
}

#[tokio::test]
async fn test_name_scan_is_skipped_unless_command_unique() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    table.insert(table_row(777, "sleeper"));

    let mut sup = mock_supervisor(test_spec(&dir, "sleeper"), &table);
    sup.ensure_running().await.unwrap();

    // Without the uniqueness promise the running lookalike is ignored
    assert_eq!(table.spawn_count(), 1);
    assert_ne!(sup.identity().unwrap().pid, 777);
}

#[tokio::test]
async fn test_ensure_running_requires_pid_file() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut spec = test_spec(&dir, "worker");
    spec.pid_file = String::new();

    let mut sup = mock_supervisor(spec, &table);
    let err = sup.ensure_running().await.unwrap_err();
    assert!(matches!(err, CoreError::ConfigurationError(_)));
    assert_eq!(table.spawn_count(), 0);
}

#[tokio::test]
async fn test_malformed_pid_file_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let spec = test_spec(&dir, "worker");
    std::fs::write(&spec.pid_file, "not-a-pid\n").unwrap();

    let mut sup = mock_supervisor(spec, &table);
    sup.ensure_running().await.unwrap();

    assert_eq!(table.spawn_count(), 1);
    let pid = sup.identity().unwrap().pid;
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), pid);
}

#[tokio::test]
async fn test_resolve_existing_tracks_liveness() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);

    assert!(sup.resolve_existing().await.is_none());

    sup.ensure_running().await.unwrap();
    let pid = sup.identity().unwrap().pid;
    let resolved = sup.resolve_existing().await.expect("running");
    assert_eq!(resolved.pid, pid);

    table.kill(pid);
    assert!(sup.resolve_existing().await.is_none());
}

#[tokio::test]
async fn test_watch_requires_resolved_identity() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);

    let err = sup.watch().await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test(start_paused = true)]
async fn test_watch_restarts_an_exited_process() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut spec = test_spec(&dir, "worker");
    spec.keep_alive = true;

    let mut sup = mock_supervisor(spec, &table);
    sup.ensure_running().await.unwrap();
    let first_pid = sup.identity().unwrap().pid;

    let saboteur = {
        let table = table.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            table.kill(first_pid);
        })
    };
    let stop = sup.stop_handle();
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(4200)).await;
        stop.stop();
    });

    sup.watch().await.unwrap();
    saboteur.await.unwrap();
    stopper.await.unwrap();

    assert_eq!(table.spawn_count(), 2);
    let new_pid = sup.identity().unwrap().pid;
    assert_ne!(new_pid, first_pid);
    assert!(table.contains(new_pid));
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), new_pid);
    assert!(!sup.is_watching());
}

#[tokio::test(start_paused = true)]
async fn test_watch_ends_when_restart_is_disabled() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);
    sup.ensure_running().await.unwrap();
    let pid = sup.identity().unwrap().pid;

    let saboteur = {
        let table = table.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            table.kill(pid);
        })
    };

    // No stop request; the loop ends on its own once the process is gone
    sup.watch().await.unwrap();
    saboteur.await.unwrap();

    assert_eq!(table.spawn_count(), 1);
    assert!(!sup.is_watching());
}

#[tokio::test(start_paused = true)]
async fn test_stop_request_before_watch_returns_immediately() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);
    sup.ensure_running().await.unwrap();

    sup.stop_handle().stop();

    let watched = tokio::time::timeout(Duration::from_secs(60), sup.watch()).await;
    assert!(matches!(watched, Ok(Ok(()))));
    assert!(!sup.is_watching());
}

#[tokio::test(start_paused = true)]
async fn test_failed_restart_is_retried_next_tick() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut spec = test_spec(&dir, "worker");
    spec.keep_alive = true;

    let mut sup = mock_supervisor(spec, &table);
    sup.ensure_running().await.unwrap();
    let first_pid = sup.identity().unwrap().pid;

    let saboteur = {
        let table = table.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            table.fail_next_spawn();
            table.kill(first_pid);
        })
    };
    let stop = sup.stop_handle();
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3700)).await;
        stop.stop();
    });

    sup.watch().await.unwrap();
    saboteur.await.unwrap();
    stopper.await.unwrap();

    // First restart attempt fails, the next tick succeeds
    assert_eq!(table.spawn_count(), 2);
    let new_pid = sup.identity().unwrap().pid;
    assert_ne!(new_pid, first_pid);
    assert_eq!(pidfile::load(&sup.spec().pid_file).unwrap(), new_pid);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_exit_returns_child_status() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);
    sup.ensure_running().await.unwrap();
    let pid = sup.identity().unwrap().pid;

    let killer = {
        let table = table.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            table.kill(pid);
        })
    };

    let exit = sup.wait_for_exit().await.unwrap();
    killer.await.unwrap();
    assert_eq!(exit.pid, pid);
    assert!(exit.success());

    // The attachment is consumed by the wait
    let err = sup.wait_for_exit().await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_exit_polls_an_adopted_process() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let spec = test_spec(&dir, "daemonish");
    table.insert(table_row(555, "daemonish"));
    pidfile::save(&spec.pid_file, 555).unwrap();

    let mut sup = mock_supervisor(spec, &table);
    sup.ensure_running().await.unwrap();
    assert_eq!(table.spawn_count(), 0);

    let killer = {
        let table = table.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            table.kill(555);
        })
    };

    let exit = sup.wait_for_exit().await.unwrap();
    killer.await.unwrap();
    assert_eq!(exit.pid, 555);
    assert_eq!(exit.exit_code, None);
    assert_eq!(exit.signal, None);
}

#[tokio::test]
async fn test_wait_for_exit_requires_attachment() {
    let dir = TempDir::new().unwrap();
    let table = MockTableHandle::new();
    let mut sup = mock_supervisor(test_spec(&dir, "worker"), &table);

    let err = sup.wait_for_exit().await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));
}
