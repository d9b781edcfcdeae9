//! Process adapters for abstracting process launching
//!
//! This module provides traits and implementations for abstracting process
//! creation, enabling testing with mock implementations and keeping the
//! supervisor independent of the concrete OS launcher.
//!
//! The mock side is a small in-memory process table shared between
//! `MockInspector` and `MockLauncher`, so supervisor tests can spawn, list,
//! and kill fake processes without touching the real process table.

use crate::inspector::ProcessInspector;
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{ProcessExit, ProcessIdentity, SupervisionSpec};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Trait for launching supervised processes
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn a new detached process according to the supervision spec
    async fn spawn(&self, spec: &SupervisionSpec) -> Result<Box<dyn LaunchedProcess>>;
}

/// A process handle returned by a launcher
///
/// Only the instance that spawned a process holds one of these; it is the
/// sole OS wait channel for that child.
#[async_trait]
pub trait LaunchedProcess: Send + Sync {
    /// Get the process ID
    fn pid(&self) -> i32;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessExit>;

    /// Collect the exit status without blocking, if the process has exited
    fn try_wait(&mut self) -> Result<Option<ProcessExit>>;
}

/// Launcher backed by the Unix session-detach spawn
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct UnixLauncher;

#[cfg(unix)]
impl UnixLauncher {
    /// Create a new Unix launcher
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessLauncher for UnixLauncher {
    async fn spawn(&self, spec: &SupervisionSpec) -> Result<Box<dyn LaunchedProcess>> {
        debug!("Spawning Unix process: {} {:?}", spec.command, spec.args);
        let child = crate::process::unix::spawn(spec)?;
        Ok(Box::new(UnixLaunchedProcess { child }))
    }
}

/// Unix launched-process implementation
#[cfg(unix)]
struct UnixLaunchedProcess {
    child: crate::process::unix::ChildProcess,
}

#[cfg(unix)]
fn exit_from_status(pid: i32, status: std::process::ExitStatus) -> ProcessExit {
    let (exit_code, signal) = if let Some(code) = status.code() {
        (Some(code), None)
    } else {
        use std::os::unix::process::ExitStatusExt;
        (None, status.signal())
    };
    ProcessExit {
        pid,
        exit_code,
        signal,
    }
}

#[cfg(unix)]
#[async_trait]
impl LaunchedProcess for UnixLaunchedProcess {
    fn pid(&self) -> i32 {
        self.child.pid()
    }

    async fn wait(&mut self) -> Result<ProcessExit> {
        let status = self.child.wait().await?;
        Ok(exit_from_status(self.child.pid(), status))
    }

    fn try_wait(&mut self) -> Result<Option<ProcessExit>> {
        let status = self.child.try_wait()?;
        Ok(status.map(|s| exit_from_status(self.child.pid(), s)))
    }
}

/// Shared in-memory process table backing the mock inspector and launcher
///
/// Cloning the handle shares the table, so a test can hold one clone to
/// script events (kill a pid, fail the next spawn) while the supervisor
/// works through its own clones.
#[derive(Debug, Clone, Default)]
pub struct MockTableHandle {
    inner: Arc<Mutex<MockTable>>,
}

#[derive(Debug, Default)]
struct MockTable {
    processes: HashMap<i32, ProcessIdentity>,
    next_pid: i32,
    spawn_count: usize,
    fail_next_spawn: bool,
}

impl MockTableHandle {
    /// Create an empty mock process table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTable> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Preload a process record, as if it were already running
    pub fn insert(&self, identity: ProcessIdentity) {
        self.lock().processes.insert(identity.pid, identity);
    }

    /// Remove a process record, as if the process had been killed
    pub fn kill(&self, pid: i32) {
        self.lock().processes.remove(&pid);
    }

    /// Whether a process record exists for `pid`
    pub fn contains(&self, pid: i32) -> bool {
        self.lock().processes.contains_key(&pid)
    }

    /// The current record for `pid`, if any
    pub fn identity(&self, pid: i32) -> Option<ProcessIdentity> {
        self.lock().processes.get(&pid).cloned()
    }

    /// Number of successful mock spawns so far
    pub fn spawn_count(&self) -> usize {
        self.lock().spawn_count
    }

    /// Make the next spawn attempt fail with a spawn error
    pub fn fail_next_spawn(&self) {
        self.lock().fail_next_spawn = true;
    }
}

/// Mock inspector reading the shared in-memory table
#[derive(Debug, Clone)]
pub struct MockInspector {
    table: MockTableHandle,
}

impl MockInspector {
    /// Create an inspector over the given table
    pub fn new(table: MockTableHandle) -> Self {
        Self { table }
    }
}

#[async_trait]
impl ProcessInspector for MockInspector {
    async fn resolve_by_pid(&self, pid: i32) -> Result<ProcessIdentity> {
        if pid <= 0 {
            return Err(CoreError::ValidationError(format!(
                "cannot resolve non-positive pid {}",
                pid
            )));
        }
        self.table
            .identity(pid)
            .ok_or_else(|| CoreError::ProcessNotFound(format!("no process with pid {}", pid)))
    }

    async fn resolve_by_command(&self, name: &str) -> Result<ProcessIdentity> {
        let table = self.table.lock();
        table
            .processes
            .values()
            .filter(|identity| identity.matches_command(name))
            .min_by_key(|identity| identity.pid)
            .cloned()
            .ok_or_else(|| {
                CoreError::ProcessNotFound(format!("no process with command '{}'", name))
            })
    }
}

/// Mock launcher registering fake processes in the shared table
#[derive(Debug, Clone)]
pub struct MockLauncher {
    table: MockTableHandle,
}

impl MockLauncher {
    /// Create a launcher over the given table
    pub fn new(table: MockTableHandle) -> Self {
        Self { table }
    }
}

#[async_trait]
impl ProcessLauncher for MockLauncher {
    async fn spawn(&self, spec: &SupervisionSpec) -> Result<Box<dyn LaunchedProcess>> {
        debug!("Spawning mock process for: {} {:?}", spec.command, spec.args);

        let mut table = self.table.lock();
        if table.fail_next_spawn {
            table.fail_next_spawn = false;
            return Err(CoreError::ProcessSpawn(format!(
                "Scripted spawn failure for '{}'",
                spec.command
            )));
        }

        table.next_pid += 1;
        let pid = 41000 + table.next_pid;
        // Mock children are session leaders, like the real launcher's
        let identity = ProcessIdentity {
            pid,
            parent_pid: std::process::id() as i32,
            group_id: pid,
            session_id: pid,
            state: "S".to_string(),
            command: spec.command.clone(),
        };
        table.processes.insert(pid, identity);
        table.spawn_count += 1;
        drop(table);

        Ok(Box::new(MockLaunchedProcess {
            pid,
            table: self.table.clone(),
        }))
    }
}

/// Mock launched process polling the shared table for its own disappearance
struct MockLaunchedProcess {
    pid: i32,
    table: MockTableHandle,
}

impl MockLaunchedProcess {
    fn exit(&self) -> ProcessExit {
        ProcessExit {
            pid: self.pid,
            exit_code: Some(0),
            signal: None,
        }
    }
}

#[async_trait]
impl LaunchedProcess for MockLaunchedProcess {
    fn pid(&self) -> i32 {
        self.pid
    }

    async fn wait(&mut self) -> Result<ProcessExit> {
        while self.table.contains(self.pid) {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        Ok(self.exit())
    }

    fn try_wait(&mut self) -> Result<Option<ProcessExit>> {
        if self.table.contains(self.pid) {
            Ok(None)
        } else {
            Ok(Some(self.exit()))
        }
    }
}
