//! Error types for scout
//!
//! Only configuration and selection errors are meant to abort a run. Suite
//! execution and notification errors are contained by their callers and
//! end up in logs and alert bodies.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scout
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file '{path}': {message}")]
    ConfigParse { path: String, message: String },

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Unknown {kind} '{name}'. Configured: {configured}")]
    UnknownName {
        kind: &'static str,
        name: String,
        configured: String,
    },

    // === Execution Errors ===
    #[error("Suite execution failed: {0}")]
    SuiteExecution(String),

    #[error("Test framework command '{0}' not found on PATH")]
    FrameworkNotFound(String),

    // === Notification Errors ===
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unknown name error listing what is configured
    pub fn unknown_name<S: AsRef<str>>(kind: &'static str, name: &str, configured: &[S]) -> Self {
        Self::UnknownName {
            kind,
            name: name.to_string(),
            configured: configured
                .iter()
                .map(|s| s.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Create a parse error for a config file
    pub fn config_parse(path: &std::path::Path, message: impl ToString) -> Self {
        Self::ConfigParse {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Whether this error should stop the whole run rather than a single suite
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ConfigParse { .. }
                | Error::FileRead { .. }
                | Error::UnknownName { .. }
        )
    }
}

/// Render an error and its `source()` chain, one cause per line
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        lines.push(format!("caused by: {cause}"));
        current = cause.source();
    }
    lines
}
