//! Supervision data model
//!
//! These types travel between the configuration layer, the supervision
//! engine, and the CLI. `SupervisionSpec` is the caller-supplied, read-only
//! description of what to supervise; `ProcessIdentity` is a snapshot of one
//! process-table record; `ProcessExit` carries exit information for a child
//! this supervisor spawned.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of an OS process as reported by the process table
///
/// Produced fresh on every inspector query and replaced wholesale, never
/// mutated in place. The process table is external state that can change
/// between any two queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessIdentity {
    /// Process ID
    pub pid: i32,

    /// Parent process ID
    pub parent_pid: i32,

    /// Process group ID
    pub group_id: i32,

    /// Session ID
    pub session_id: i32,

    /// Single-character scheduler state code (e.g. "S", "R", "Z")
    pub state: String,

    /// Command name as recorded in the process table
    pub command: String,
}

impl ProcessIdentity {
    /// Whether this record belongs to the given command name (exact match,
    /// not argument-aware)
    pub fn matches_command(&self, command: &str) -> bool {
        self.command == command
    }

    /// Whether the process table reports a plausible parent for this record
    pub fn has_parent(&self) -> bool {
        self.parent_pid > 0
    }
}

/// Exit information for a supervised child process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessExit {
    /// Process ID that exited
    pub pid: i32,

    /// Exit code, when the process exited normally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Signal number, when the process was killed by a signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
}

impl ProcessExit {
    /// Whether the process exited normally with a zero status
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Specification of a single supervised process
///
/// Constructed once by the caller (usually from the TOML config) and never
/// changed afterwards; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionSpec {
    /// Executable to launch (must be in PATH or an absolute path).
    ///
    /// Liveness verification compares this value against the command name
    /// recorded in the process table, so prefer the bare command name over
    /// a path when both would launch the same binary.
    pub command: String,

    /// Command line arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// File that child stdout is appended to; unset leaves stdout null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_file: Option<String>,

    /// File that child stderr is appended to; unset leaves stderr null
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_file: Option<String>,

    /// Path of the pid file recording the supervised process id
    #[serde(default)]
    pub pid_file: String,

    /// Caller asserts the command name is unique in the process table,
    /// enabling adoption by name scan when the pid file does not resolve
    #[serde(default)]
    pub command_unique: bool,

    /// Restart the process when the watch loop detects it has exited
    #[serde(default)]
    pub keep_alive: bool,

    /// Poll interval of the watch loop in seconds; 0 falls back to the
    /// default at use sites
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,

    /// Block until the supervised process exits instead of returning after
    /// the pid is recorded
    #[serde(default)]
    pub wait_for_exit: bool,

    /// Log-rotation size threshold in bytes; accepted and carried, but
    /// rotation itself is an external log-management concern and is not
    /// performed by the engine
    #[serde(default)]
    pub log_rotate_size_bytes: u64,
}

const fn default_watch_interval_secs() -> u64 {
    5
}

impl SupervisionSpec {
    /// Watch-loop poll interval, substituting the default for a zero value
    pub fn watch_interval(&self) -> Duration {
        let secs = if self.watch_interval_secs == 0 {
            default_watch_interval_secs()
        } else {
            self.watch_interval_secs
        };
        Duration::from_secs(secs)
    }
}
