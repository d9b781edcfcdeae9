//! Configuration loading and validation for supervised processes
//!
//! This module parses a TOML configuration into a `schema::SupervisionSpec`,
//! applies sane defaults (via serde defaults on schema types), and performs
//! strict validation with field-path error messages.

use crate::{CoreError, Result};
use schema::SupervisionSpec;
use std::fs;
use std::path::Path;

/// Load a supervision spec from a TOML file path
pub fn load_spec_from_toml_path(path: impl AsRef<Path>) -> Result<SupervisionSpec> {
    let data = fs::read_to_string(&path).map_err(|e| {
        CoreError::ConfigurationError(format!("Failed to read config {:?}: {}", path.as_ref(), e))
    })?;
    load_spec_from_toml_str(&data)
}

/// Load a supervision spec from a TOML string
pub fn load_spec_from_toml_str(input: &str) -> Result<SupervisionSpec> {
    let spec: SupervisionSpec = toml::from_str(input)
        .map_err(|e| CoreError::ConfigurationError(format!("TOML parse error: {}", e)))?;
    validate_spec(&spec)?;
    Ok(spec)
}

/// Validate a supervision spec, with field-path error messages
pub fn validate_spec(spec: &SupervisionSpec) -> Result<()> {
    if spec.command.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "command: cannot be empty".to_string(),
        ));
    }
    if spec.pid_file.trim().is_empty() {
        return Err(CoreError::ValidationError(
            "pidFile: cannot be empty".to_string(),
        ));
    }
    if let Some(path) = &spec.stdout_file {
        if path.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "stdoutFile: cannot be empty when set".to_string(),
            ));
        }
    }
    if let Some(path) = &spec.stderr_file {
        if path.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "stderrFile: cannot be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}
