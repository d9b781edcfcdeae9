//! Supervision engine: ensure-running and keep-alive semantics
//!
//! The supervisor ties the pid store, the process inspector, and the process
//! launcher together. `ensure_running` resolves or spawns the supervised
//! process and records its pid; `watch` polls liveness on an interval and
//! restarts on exit when configured to; `wait_for_exit` blocks until the
//! process is gone.
//!
//! The pid file is shared, unlocked state: two supervisors pointed at the
//! same pid file can race each other. Known limitation, kept deliberately.

pub mod adapters;

#[cfg(test)]
mod supervisor_tests;

use crate::inspector::ProcessInspector;
use crate::{pidfile, CoreError, Result};
use adapters::{LaunchedProcess, ProcessLauncher};
use schema::{ProcessExit, ProcessIdentity, SupervisionSpec};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub use adapters::{MockInspector, MockLauncher, MockTableHandle};
#[cfg(unix)]
pub use adapters::UnixLauncher;

/// Attachment to the supervised process
///
/// `Spawned` holds the live child handle; the OS delivers the exact exit
/// status only to the spawning parent. `Adopted` covers processes discovered
/// via pid file or name scan, where no wait channel exists and exit
/// detection degrades to polling.
enum SupervisedProcess {
    Spawned { child: Box<dyn LaunchedProcess> },
    Adopted,
}

/// Handle for stopping a running watch loop from another task
///
/// Stopping is one-shot: once requested, any current or future `watch` call
/// on the supervisor returns at its next tick boundary.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Request the watch loop to exit at its next tick boundary
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Supervises a single process according to its `SupervisionSpec`
///
/// All state is owned by the instance and mutated only through `&mut self`
/// calls, so ensure/watch cycles can never overlap within one supervisor.
pub struct Supervisor {
    spec: SupervisionSpec,
    inspector: Arc<dyn ProcessInspector>,
    launcher: Arc<dyn ProcessLauncher>,
    identity: Option<ProcessIdentity>,
    attachment: Option<SupervisedProcess>,
    watching: bool,
    stop_tx: Arc<watch::Sender<bool>>,
}

#[cfg(unix)]
impl Supervisor {
    /// Create a supervisor backed by the real process table and launcher
    pub fn new(spec: SupervisionSpec) -> Self {
        Self::with_adapters(
            spec,
            Arc::new(crate::inspector::ProcInspector::new()),
            Arc::new(adapters::UnixLauncher::new()),
        )
    }
}

impl Supervisor {
    /// Create a supervisor with explicit inspector and launcher
    /// implementations
    pub fn with_adapters(
        spec: SupervisionSpec,
        inspector: Arc<dyn ProcessInspector>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            spec,
            inspector,
            launcher,
            identity: None,
            attachment: None,
            watching: false,
            stop_tx: Arc::new(stop_tx),
        }
    }

    /// The spec this supervisor runs
    pub fn spec(&self) -> &SupervisionSpec {
        &self.spec
    }

    /// Last identity resolved for the supervised process, if any
    pub fn identity(&self) -> Option<&ProcessIdentity> {
        self.identity.as_ref()
    }

    /// Whether the watch loop is currently running
    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Handle that can stop a `watch` call from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Make sure the supervised process is running and its pid is recorded
    ///
    /// Resolution order: pid file (accepted only when the resolved command
    /// matches the configured command), then name scan when `command_unique`
    /// is set, then a fresh spawn. The pid file is rewritten unconditionally
    /// so it always reflects the pid that was just verified or created.
    pub async fn ensure_running(&mut self) -> Result<()> {
        if self.spec.pid_file.is_empty() {
            return Err(CoreError::ConfigurationError(
                "pidFile must be configured for supervision".to_string(),
            ));
        }

        self.reap_spawned();

        let identity = match self.resolve_existing().await {
            Some(identity) => {
                debug!(
                    "Process {} ('{}') is already running",
                    identity.pid, identity.command
                );
                let spawned_match = matches!(
                    &self.attachment,
                    Some(SupervisedProcess::Spawned { child }) if child.pid() == identity.pid
                );
                if !spawned_match {
                    self.attachment = Some(SupervisedProcess::Adopted);
                }
                identity
            }
            None => self.spawn_process().await?,
        };

        pidfile::save(&self.spec.pid_file, identity.pid)?;
        info!(
            "Supervising '{}' (pid {}, session {})",
            identity.command, identity.pid, identity.session_id
        );
        self.identity = Some(identity);
        Ok(())
    }

    /// Resolve the currently-running supervised process, if there is one
    ///
    /// Inspection failures are folded into "not running": a missing,
    /// unreadable, or malformed pid file, a dead pid, and a pid now owned by
    /// an unrelated command all mean the process has to be found another way
    /// or spawned fresh.
    pub async fn resolve_existing(&self) -> Option<ProcessIdentity> {
        match pidfile::load(&self.spec.pid_file) {
            Ok(pid) if pid > 0 => match self.inspector.resolve_by_pid(pid).await {
                Ok(identity) if identity.matches_command(&self.spec.command) => {
                    return Some(identity);
                }
                Ok(identity) => {
                    debug!(
                        "Pid {} now belongs to '{}', not '{}'; ignoring stale pid file",
                        pid, identity.command, self.spec.command
                    );
                }
                Err(e) => {
                    debug!("Pid {} from pid file did not resolve: {}", pid, e);
                }
            },
            Ok(pid) => {
                debug!("Ignoring non-positive pid {} from pid file", pid);
            }
            Err(e) => {
                debug!("No usable pid file at '{}': {}", self.spec.pid_file, e);
            }
        }

        if self.spec.command_unique {
            match self.inspector.resolve_by_command(&self.spec.command).await {
                Ok(identity) => {
                    debug!(
                        "Adopting '{}' (pid {}) found by name scan",
                        identity.command, identity.pid
                    );
                    return Some(identity);
                }
                Err(e) => {
                    debug!("Name scan for '{}' found nothing: {}", self.spec.command, e);
                }
            }
        }

        None
    }

    /// Poll the supervised process until stopped or, when restart is
    /// disabled, until it exits
    ///
    /// Liveness per tick: the last-known pid must resolve and carry a
    /// plausible parent. A failed resolve or a parentless record counts as
    /// exited. Restart errors are absorbed and retried next tick; the loop
    /// only fails when called before any identity has been resolved.
    pub async fn watch(&mut self) -> Result<()> {
        let watched = match &self.identity {
            Some(identity) => identity.pid,
            None => {
                return Err(CoreError::ValidationError(
                    "cannot watch before a process has been resolved; call ensure_running first"
                        .to_string(),
                ));
            }
        };

        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow_and_update() {
            debug!("Stop already requested; not starting watch loop");
            return Ok(());
        }

        let interval = self.spec.watch_interval();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Watching pid {} every {:?}", watched, interval);
        self.watching = true;
        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow_and_update() {
                        info!("Watch loop stopped");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if !self.poll_once().await {
                        break;
                    }
                }
            }
        }
        self.watching = false;
        Ok(())
    }

    /// Block until the supervised process exits
    ///
    /// With a spawned child this is an OS wait delivering the exact exit
    /// status. An adopted process has no wait channel, so detection degrades
    /// to polling on the watch interval and the exit record carries no
    /// status.
    pub async fn wait_for_exit(&mut self) -> Result<ProcessExit> {
        match self.attachment.take() {
            Some(SupervisedProcess::Spawned { mut child }) => {
                let exit = child.wait().await?;
                info!("Supervised child exited: {:?}", exit);
                Ok(exit)
            }
            Some(SupervisedProcess::Adopted) => {
                let pid = match &self.identity {
                    Some(identity) => identity.pid,
                    None => {
                        return Err(CoreError::ValidationError(
                            "no resolved process to wait for".to_string(),
                        ));
                    }
                };
                debug!("Adopted process {}: polling for exit", pid);
                let mut ticker = tokio::time::interval(self.spec.watch_interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if !self.check_alive().await {
                        info!("Adopted process {} is gone", pid);
                        return Ok(ProcessExit {
                            pid,
                            exit_code: None,
                            signal: None,
                        });
                    }
                }
            }
            None => Err(CoreError::ValidationError(
                "no supervised process attached; call ensure_running first".to_string(),
            )),
        }
    }

    /// One watch cycle: reap, check liveness, maybe restart
    ///
    /// Returns false when the loop should end (process gone and restart
    /// disabled).
    async fn poll_once(&mut self) -> bool {
        self.reap_spawned();

        if self.check_alive().await {
            return true;
        }

        if !self.spec.keep_alive {
            info!("Supervised process exited; restart disabled, ending watch");
            self.attachment = None;
            return false;
        }

        warn!("Supervised process is gone; restarting");
        if let Err(e) = self.ensure_running().await {
            warn!("Restart failed, retrying next interval: {}", e);
        }
        true
    }

    /// Whether the last-known pid still resolves to a live record
    ///
    /// Refreshes the cached identity on success so parent/group/session stay
    /// current across the process's lifetime.
    async fn check_alive(&mut self) -> bool {
        let pid = match &self.identity {
            Some(identity) => identity.pid,
            None => return false,
        };

        match self.inspector.resolve_by_pid(pid).await {
            Ok(identity) if identity.has_parent() => {
                self.identity = Some(identity);
                true
            }
            Ok(identity) => {
                debug!(
                    "Process {} has no parent (state '{}'); treating as exited",
                    pid, identity.state
                );
                false
            }
            Err(e) => {
                debug!("Liveness check for pid {} failed: {}", pid, e);
                false
            }
        }
    }

    /// Collect the exit status of a child this instance spawned, if it has
    /// exited, so the process table stops carrying it as a zombie
    fn reap_spawned(&mut self) {
        if let Some(SupervisedProcess::Spawned { child }) = &mut self.attachment {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    info!("Supervised child exited: {:?}", exit);
                    self.attachment = None;
                }
                Ok(None) => {}
                Err(e) => debug!("Could not poll spawned child: {}", e),
            }
        }
    }

    /// Spawn a fresh process and resolve its full identity
    async fn spawn_process(&mut self) -> Result<ProcessIdentity> {
        let child = self.launcher.spawn(&self.spec).await?;
        let pid = child.pid();
        info!("Spawned '{}' with pid {}", self.spec.command, pid);
        self.attachment = Some(SupervisedProcess::Spawned { child });

        // Re-resolve so the cached identity carries parent/group/session
        self.inspector.resolve_by_pid(pid).await
    }
}
