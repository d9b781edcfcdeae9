//! Core error types and utilities

use thiserror::Error;

/// Core-specific error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Process spawn error: {0}")]
    ProcessSpawn(String),

    #[error("Process wait error: {0}")]
    ProcessWait(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Parse error: {0}")]
    ParseFailure(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Generic error: {0}")]
    Other(String),
}

impl CoreError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::ProcessSpawn(_) => "CORE004",
            CoreError::ProcessWait(_) => "CORE005",
            CoreError::ProcessNotFound(_) => "CORE006",
            CoreError::ParseFailure(_) => "CORE007",
            CoreError::IoError(_) => "CORE008",
            CoreError::SerializationError(_) => "CORE009",
            CoreError::Other(_) => "CORE999",
        }
    }
}

/// Core-specific result type
pub type Result<T> = std::result::Result<T, CoreError>;

// Convenience implementations
impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}
