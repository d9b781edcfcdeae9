//! Unix process launching with session detachment
//!
//! Children are placed in their own session via `setsid()` before exec, so
//! each spawned process:
//!
//! - becomes a session leader and a process-group leader
//! - has no controlling terminal
//! - survives the supervisor process and its shell
//!
//! Stdout and stderr are appended to the files named in the `SupervisionSpec`
//! (created when absent); a stream without a configured file is wired to
//! null, as is stdin always. The child handle never sets `kill_on_drop`: the
//! supervised process must outlive the supervisor.

// Allow unsafe code for this module since session detachment requires libc::setsid() calls
#![allow(unsafe_code)]

use crate::{CoreError, Result};
use nix::unistd::Pid;
use schema::SupervisionSpec;
use std::fs::OpenOptions;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, error};

/// A child process detached into its own session
///
/// The handle owns the OS wait channel for the child: dropping it without
/// waiting leaves the exit status uncollected until the supervisor's next
/// reap, so callers keep it alive for as long as they supervise the process.
#[derive(Debug)]
pub struct ChildProcess {
    /// The process ID of the spawned process
    pid: Pid,
    /// The underlying Child handle for waiting and status checking
    child: Child,
}

impl ChildProcess {
    /// Get the process ID
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Wait for the process to exit and return its exit status (async)
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ProcessWait(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }

    /// Try to collect the exit status without blocking
    pub fn try_wait(&mut self) -> Result<Option<std::process::ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            CoreError::ProcessWait(format!(
                "Failed to try_wait for process {}: {}",
                self.pid, e
            ))
        })
    }
}

/// Spawn the configured command detached into a new session
///
/// The environment is inherited from the supervisor. Spawn failure (missing
/// executable, permissions, unopenable stdio file) is fatal for this attempt
/// and is not retried here.
///
/// ## Safety
///
/// `libc::setsid()` is called in the child between fork and exec. It is
/// async-signal-safe and therefore appropriate for use in `pre_exec`.
pub fn spawn(spec: &SupervisionSpec) -> Result<ChildProcess> {
    debug!("Spawning process: {} {:?}", spec.command, spec.args);

    let mut command = Command::new(&spec.command);
    command.args(&spec.args);
    command.stdin(Stdio::null());
    command.stdout(output_stdio(spec.stdout_file.as_deref(), "stdout")?);
    command.stderr(output_stdio(spec.stderr_file.as_deref(), "stderr")?);

    // Use pre_exec to call setsid() in the child process
    #[deny(unsafe_op_in_unsafe_fn)]
    unsafe {
        command.pre_exec(|| {
            // Create a new session and process group
            let result = libc::setsid();
            if result == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn process '{}': {}", spec.command, e);
        CoreError::ProcessSpawn(format!("Failed to spawn '{}': {}", spec.command, e))
    })?;

    // tokio::process::Child::id() may return Option on some platforms
    let raw_pid = child
        .id()
        .ok_or_else(|| CoreError::ProcessSpawn("Spawned child did not have a PID".to_string()))?;
    let pid = Pid::from_raw(raw_pid as i32);
    debug!("Successfully spawned process {} in new session", pid);

    Ok(ChildProcess { pid, child })
}

/// Build the Stdio for one output stream: append-create when a file is
/// configured, null otherwise
fn output_stdio(path: Option<&str>, stream: &str) -> Result<Stdio> {
    match path {
        Some(p) if !p.is_empty() => {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(p)
                .map_err(|e| {
                    CoreError::ProcessSpawn(format!(
                        "Failed to open {} file '{}': {}",
                        stream, p, e
                    ))
                })?;
            Ok(Stdio::from(file))
        }
        _ => Ok(Stdio::null()),
    }
}
