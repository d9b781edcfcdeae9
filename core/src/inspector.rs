//! Process-table inspection
//!
//! Resolves live process identity from the OS process table, either by pid
//! (the per-process stat record) or by command name (the system `ps`
//! lister). Both paths are read-only and never cache: the process table is
//! external state that can change between any two queries, so every answer
//! is a fresh snapshot.
//!
//! The trait seam keeps the supervisor testable without a live process
//! table; the mock implementation lives next to the launcher mocks in
//! `supervisor::adapters`.

use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::ProcessIdentity;

#[cfg(unix)]
use std::process::Stdio;
#[cfg(unix)]
use tokio::process::Command;
#[cfg(unix)]
use tracing::debug;

/// Read-only access to the OS process table
#[async_trait]
pub trait ProcessInspector: Send + Sync {
    /// Resolve the identity of the process with the given pid
    async fn resolve_by_pid(&self, pid: i32) -> Result<ProcessIdentity>;

    /// Resolve the identity of the process whose command name equals `name`
    ///
    /// Intended for callers that assert the name is unique in the process
    /// table. When several processes match anyway, the one with the lowest
    /// pid is returned, so repeated scans agree with each other.
    async fn resolve_by_command(&self, name: &str) -> Result<ProcessIdentity>;
}

/// Column set requested from the `ps` lister, in the order the row parser
/// expects them
#[cfg(unix)]
const PS_COLUMNS: &str = "pid,ppid,pgid,sid,state,command";

/// Inspector backed by the `/proc` stat records and the system `ps` lister
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ProcInspector;

#[cfg(unix)]
impl ProcInspector {
    /// Create a new proc-backed inspector
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessInspector for ProcInspector {
    async fn resolve_by_pid(&self, pid: i32) -> Result<ProcessIdentity> {
        if pid <= 0 {
            return Err(CoreError::ValidationError(format!(
                "cannot resolve non-positive pid {}",
                pid
            )));
        }

        let stat_path = format!("/proc/{}/stat", pid);
        let record = tokio::fs::read_to_string(&stat_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::ProcessNotFound(format!("no process with pid {}", pid))
            } else {
                CoreError::IoError(e)
            }
        })?;

        parse_stat_record(&record)
    }

    async fn resolve_by_command(&self, name: &str) -> Result<ProcessIdentity> {
        let child = Command::new("ps")
            .args(["xao", PS_COLUMNS])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                CoreError::ProcessSpawn(format!("Failed to run process lister: {}", e))
            })?;

        // Remember the lister's own pid so its row never matches itself
        let lister_pid = child.id().map(|id| id as i32);
        let output = child.wait_with_output().await.map_err(|e| {
            CoreError::ProcessWait(format!("Failed to collect process listing: {}", e))
        })?;
        if !output.status.success() {
            return Err(CoreError::ProcessWait(format!(
                "Process lister exited with status {}",
                output.status
            )));
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        debug!("Scanning process listing for command '{}'", name);
        select_by_command(&listing, name, lister_pid)
    }
}

/// Parse one per-process stat record into a `ProcessIdentity`
///
/// The command field is parenthesized and may itself contain spaces or
/// parentheses, so the name spans the first `(` to the LAST `)` in the
/// record. The fields after it are positional: state, parent pid, group id,
/// session id.
fn parse_stat_record(record: &str) -> Result<ProcessIdentity> {
    let open = record
        .find('(')
        .ok_or_else(|| CoreError::ParseFailure(format!("stat record has no '(': {:?}", record)))?;
    let close = record
        .rfind(')')
        .ok_or_else(|| CoreError::ParseFailure(format!("stat record has no ')': {:?}", record)))?;
    if close < open {
        return Err(CoreError::ParseFailure(format!(
            "stat record has mismatched parentheses: {:?}",
            record
        )));
    }

    let pid: i32 = record[..open].trim().parse().map_err(|_| {
        CoreError::ParseFailure(format!("stat record has no leading pid: {:?}", record))
    })?;
    let command = record[open + 1..close].to_string();

    let mut fields = record[close + 1..].split_whitespace();
    let state = fields
        .next()
        .ok_or_else(|| {
            CoreError::ParseFailure(format!("stat record missing state field: {:?}", record))
        })?
        .to_string();
    let parent_pid = next_numeric_field(&mut fields, "ppid", record)?;
    let group_id = next_numeric_field(&mut fields, "pgrp", record)?;
    let session_id = next_numeric_field(&mut fields, "session", record)?;

    Ok(ProcessIdentity {
        pid,
        parent_pid,
        group_id,
        session_id,
        state,
        command,
    })
}

fn next_numeric_field<'a>(
    fields: &mut impl Iterator<Item = &'a str>,
    name: &str,
    record: &str,
) -> Result<i32> {
    fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| {
            CoreError::ParseFailure(format!(
                "stat record missing numeric {} field: {:?}",
                name, record
            ))
        })
}

/// Pick the target process out of a `ps` listing
///
/// Rows need at least six whitespace-separated columns (pid, ppid, pgid,
/// sid, state, command...); the header and malformed rows are skipped. The
/// command column is matched on its first token only, so arguments never
/// participate. Rows belonging to the listing invocation itself are
/// excluded. Several matches resolve to the lowest pid.
fn select_by_command(
    listing: &str,
    name: &str,
    lister_pid: Option<i32>,
) -> Result<ProcessIdentity> {
    let mut best: Option<ProcessIdentity> = None;
    for line in listing.lines() {
        let Some(identity) = parse_listing_row(line) else {
            continue;
        };
        if Some(identity.pid) == lister_pid {
            continue;
        }
        if !identity.matches_command(name) {
            continue;
        }
        match &best {
            Some(current) if current.pid <= identity.pid => {}
            _ => best = Some(identity),
        }
    }

    best.ok_or_else(|| CoreError::ProcessNotFound(format!("no process with command '{}'", name)))
}

/// Parse one `ps` row; `None` for the header and malformed rows
fn parse_listing_row(line: &str) -> Option<ProcessIdentity> {
    let cols: Vec<&str> = line.split_whitespace().collect();
    if cols.len() < 6 {
        return None;
    }

    Some(ProcessIdentity {
        pid: cols[0].parse().ok()?,
        parent_pid: cols[1].parse().ok()?,
        group_id: cols[2].parse().ok()?,
        session_id: cols[3].parse().ok()?,
        state: cols[4].to_string(),
        command: cols[5].to_string(),
    })
}
