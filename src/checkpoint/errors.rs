//! Checkpoint-specific error types
//!
//! Error codes:
//! - WALREC_CHECKPOINT_FAILED (FATAL)
//! - WALREC_CHECKPOINT_MARKER_FAILED (ERROR)
//!
//! A failed end-of-recovery checkpoint leaves the control file already
//! advanced; the next replay resumes from there.

use std::fmt;
use std::io;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The marker could not be recorded; storage was synced
    Error,
    /// Storage could not be made durable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Checkpoint error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointErrorCode {
    /// General checkpoint failure
    CheckpointFailed,
    /// Marker file write failure
    MarkerFailed,
}

impl CheckpointErrorCode {
    /// Returns the stable string code
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointErrorCode::CheckpointFailed => "WALREC_CHECKPOINT_FAILED",
            CheckpointErrorCode::MarkerFailed => "WALREC_CHECKPOINT_MARKER_FAILED",
        }
    }

    /// Returns the severity level for this error code
    pub fn severity(&self) -> Severity {
        match self {
            CheckpointErrorCode::CheckpointFailed => Severity::Fatal,
            CheckpointErrorCode::MarkerFailed => Severity::Error,
        }
    }
}

impl fmt::Display for CheckpointErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checkpoint error with full context
#[derive(Debug)]
pub struct CheckpointError {
    code: CheckpointErrorCode,
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CheckpointError {
    fn new(
        code: CheckpointErrorCode,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    /// Creates a general checkpoint failure error
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CheckpointErrorCode::CheckpointFailed, message, None)
    }

    /// Creates a checkpoint failure with source error
    pub fn failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            CheckpointErrorCode::CheckpointFailed,
            message,
            Some(Box::new(source)),
        )
    }

    /// Creates a marker write failure error
    pub fn marker_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(CheckpointErrorCode::MarkerFailed, message, Some(Box::new(source)))
    }

    /// Returns the error code
    pub fn code(&self) -> CheckpointErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the severity of this error
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CheckpointErrorCode::CheckpointFailed.as_str(),
            "WALREC_CHECKPOINT_FAILED"
        );
        assert_eq!(
            CheckpointErrorCode::MarkerFailed.as_str(),
            "WALREC_CHECKPOINT_MARKER_FAILED"
        );
    }

    #[test]
    fn test_marker_failure_is_not_fatal() {
        let err = CheckpointError::marker_failed(
            "write failed",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert!(!err.is_fatal());
        assert_eq!(err.code(), CheckpointErrorCode::MarkerFailed);
    }

    #[test]
    fn test_display_format() {
        let err = CheckpointError::failed_with_source(
            "could not sync relation files",
            io::Error::new(io::ErrorKind::Other, "EIO"),
        );
        let display = format!("{}", err);
        assert!(display.starts_with("[FATAL] WALREC_CHECKPOINT_FAILED"));
        assert!(display.contains("caused by: EIO"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
