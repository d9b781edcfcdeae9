//! Core functionality for the Vigil supervisor
//!
//! This crate contains the supervision engine and its collaborators: pid
//! file persistence, process inspection, detached spawning, and TOML
//! configuration loading. The CLI builds on these pieces.

pub mod config;
pub mod error;
pub mod inspector;
pub mod pidfile;
#[cfg(unix)]
pub mod process;
pub mod supervisor;

// Re-export schema types for convenience
pub use schema::*;

pub use error::{CoreError, Result};
#[cfg(unix)]
pub use inspector::ProcInspector;
pub use inspector::ProcessInspector;
pub use supervisor::{StopHandle, Supervisor};

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
