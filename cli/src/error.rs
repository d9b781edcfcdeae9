//! CLI error types

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Supervision error: {0}")]
    CoreError(#[from] vigil_core::CoreError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CliError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CliError::InvalidArgument(_) => "CLI001",
            CliError::ConfigError(_) => "CLI002",
            CliError::CoreError(_) => "CLI003",
            CliError::IoError(_) => "CLI004",
        }
    }
}

/// CLI-specific result type
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CliError::InvalidArgument("test".to_string()).code(), "CLI001");
        assert_eq!(CliError::ConfigError("test".to_string()).code(), "CLI002");
        let core = vigil_core::CoreError::Other("test".to_string());
        assert_eq!(CliError::CoreError(core).code(), "CLI003");
    }

    #[test]
    fn test_error_display() {
        let error = CliError::ConfigError("no config found".to_string());
        assert_eq!(error.to_string(), "Configuration error: no config found");
    }

    #[test]
    fn test_core_error_conversion() {
        let core = vigil_core::CoreError::ValidationError("command: cannot be empty".to_string());
        let cli: CliError = core.into();
        assert!(cli.to_string().contains("command: cannot be empty"));
    }
}
