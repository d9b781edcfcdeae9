//! Process launching for the vigil core library
//!
//! Platform-specific process creation. The Unix implementation detaches the
//! child into its own session so it survives the supervisor, its process
//! group, and its controlling terminal.

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;
