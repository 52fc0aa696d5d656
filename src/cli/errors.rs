//! CLI-specific error types
//!
//! All CLI errors end the process with exit code 1.

use std::fmt;
use std::io;

use crate::recovery::{RecoveryError, RecoveryErrorCode};

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Replay or listing aborted
    RecoveryFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "WALREC_CLI_CONFIG_ERROR",
            Self::IoError => "WALREC_CLI_IO_ERROR",
            Self::RecoveryFailed => "WALREC_CLI_RECOVERY_FAILED",
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
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
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
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<RecoveryError> for CliError {
    fn from(e: RecoveryError) -> Self {
        match e.code() {
            RecoveryErrorCode::InvalidConfig => Self::config_error(e.message()),
            _ => Self::new(CliErrorCode::RecoveryFailed, e.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::Lsn;

    #[test]
    fn test_recovery_error_keeps_inner_code() {
        let err = CliError::from(RecoveryError::not_in_recovery(Lsn(0x200)));
        assert_eq!(err.code_str(), "WALREC_CLI_RECOVERY_FAILED");
        assert!(err.message().contains("WALREC_NOT_IN_RECOVERY"));
    }

    #[test]
    fn test_invalid_config_maps_to_config_error() {
        let err = CliError::from(RecoveryError::invalid_config("bad segment size"));
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
        assert_eq!(err.message(), "bad segment size");
    }
}
