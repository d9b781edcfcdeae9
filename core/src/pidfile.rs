//! Durable pid-file storage
//!
//! A pid file is a plain-text file holding the decimal pid of the supervised
//! process, with optional surrounding whitespace. `save` overwrites the file;
//! `load` trims before parsing, so either side tolerates the other's exact
//! formatting.
//!
//! The pid file is shared state between supervisor instances and is accessed
//! without any cross-process locking. Two supervisors pointed at the same pid
//! file can race each other; known limitation, kept deliberately.

use crate::{CoreError, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Write `pid` to the file at `path`, replacing any previous content
pub fn save(path: impl AsRef<Path>, pid: i32) -> Result<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(CoreError::ConfigurationError(
            "pid file path cannot be empty".to_string(),
        ));
    }

    fs::write(path, pid.to_string())?;
    debug!("Recorded pid {} in {:?}", pid, path);
    Ok(())
}

/// Read a pid back from the file at `path`
///
/// Returns `ParseFailure` when the content is not a non-negative integer;
/// callers treat that the same as an absent pid file.
pub fn load(path: impl AsRef<Path>) -> Result<i32> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(CoreError::ConfigurationError(
            "pid file path cannot be empty".to_string(),
        ));
    }

    let data = fs::read_to_string(path)?;
    let trimmed = data.trim();
    let pid: i32 = trimmed.parse().map_err(|_| {
        CoreError::ParseFailure(format!(
            "pid file {:?} does not contain a pid: {:?}",
            path, trimmed
        ))
    })?;
    if pid < 0 {
        return Err(CoreError::ParseFailure(format!(
            "pid file {:?} contains a negative pid: {}",
            path, pid
        )));
    }

    Ok(pid)
}
