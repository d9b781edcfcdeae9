//! Shared pieces of the vigil CLI
//!
//! The binary keeps its command handling in `main.rs`; this crate root holds
//! the error type and the config-path resolution the binary and its tests
//! share.

pub mod error;

pub use error::{CliError, Result};

use std::path::PathBuf;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "VIGIL_CONFIG";

/// Resolve the configuration file path
///
/// Precedence: the explicit flag, then `$VIGIL_CONFIG`, then
/// `<user config dir>/vigil/config.toml`, and finally `vigil.toml` in the
/// working directory.
pub fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }
    if let Some(config_dir) = dirs_next::config_dir() {
        return config_dir.join("vigil").join("config.toml");
    }
    PathBuf::from("vigil.toml")
}
