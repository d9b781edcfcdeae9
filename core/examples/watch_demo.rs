//! Simple demonstration of the supervision loop
//!
//! Runs the supervisor against the in-memory mock process table: ensures a
//! fake process is running, kills it behind the supervisor's back, and lets
//! the watch loop restart it before stopping.

#![allow(unused_crate_dependencies)]

use schema::SupervisionSpec;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;
use vigil_core::supervisor::{MockInspector, MockLauncher, MockTableHandle};
use vigil_core::{Result, Supervisor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    vigil_core::utils::init_tracing("debug")?;

    info!("🚀 Starting watch demo");

    let dir = tempfile::tempdir().map_err(vigil_core::CoreError::IoError)?;
    let spec = SupervisionSpec {
        command: "demo-worker".to_string(),
        args: vec!["--loop".to_string()],
        stdout_file: None,
        stderr_file: None,
        pid_file: dir.path().join("demo.pid").to_string_lossy().into_owned(),
        command_unique: false,
        keep_alive: true,
        wait_for_exit: false,
        watch_interval_secs: 1,
        log_rotate_size_bytes: 0,
    };

    let table = MockTableHandle::new();
    let mut supervisor = Supervisor::with_adapters(
        spec,
        Arc::new(MockInspector::new(table.clone())),
        Arc::new(MockLauncher::new(table.clone())),
    );

    info!("📋 Ensuring the demo process is running...");
    supervisor.ensure_running().await?;
    let first_pid = supervisor.identity().map(|i| i.pid).unwrap_or_default();
    info!("✅ Supervising pid {}", first_pid);

    // Sabotage the process mid-watch, then ask the loop to stop
    let stop = supervisor.stop_handle();
    let saboteur = {
        let table = table.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            info!("💥 Killing pid {} behind the supervisor's back", first_pid);
            table.kill(first_pid);

            tokio::time::sleep(Duration::from_millis(2500)).await;
            info!("🛑 Requesting stop...");
            stop.stop();
        })
    };

    info!("👁 Watching...");
    supervisor.watch().await?;
    let _ = saboteur.await;

    let new_pid = supervisor.identity().map(|i| i.pid).unwrap_or_default();
    info!("🔁 Watch ended; pid {} was replaced by pid {}", first_pid, new_pid);
    info!("✨ Demo completed successfully!");

    Ok(())
}
