//! CLI-specific error types
//!
//! CLI errors abort the command. Errors of a single request are reported on
//! stdout instead and never reach this type.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::errors::StoreError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Dataset file could not be loaded
    DatasetError,
    /// Request line could not be parsed
    RequestError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DOCSHARD_CLI_CONFIG_ERROR",
            Self::IoError => "DOCSHARD_CLI_IO_ERROR",
            Self::DatasetError => "DOCSHARD_CLI_DATASET_ERROR",
            Self::RequestError => "DOCSHARD_CLI_REQUEST_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn dataset_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::DatasetError, msg)
    }

    pub fn request_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RequestError, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::request_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::dataset_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::config_error("partitions must be > 0");
        assert_eq!(err.to_string(), "DOCSHARD_CLI_CONFIG_ERROR: partitions must be > 0");
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_json_errors_are_request_errors() {
        let err: CliError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.code_str(), "DOCSHARD_CLI_REQUEST_ERROR");
    }
}
