//! Recovery error types
//!
//! Error codes (all FATAL):
//! - WALREC_NOT_IN_RECOVERY
//! - WALREC_CONTROL_UNREADABLE
//! - WALREC_SEGMENT_OPEN_FAILED
//! - WALREC_INVALID_PAGE_HEADER
//! - WALREC_LOG_READ_FAILED
//! - WALREC_UNKNOWN_RESOURCE_MANAGER
//! - WALREC_REDO_FAILED
//! - WALREC_CHECKPOINT_FAILED
//! - WALREC_OUTPUT_FAILED
//! - WALREC_CONTROL_UPDATE_FAILED
//! - WALREC_INVALID_CONFIG
//!
//! Every one of them aborts the operation without touching the control
//! file. End of log and decode errors are not errors at this level.

use std::fmt;

use crate::checkpoint::CheckpointError;
use crate::control::ControlError;
use crate::rmgr::RedoError;
use crate::wal::{Lsn, WalError, WalErrorCode};

/// Severity levels for recovery errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation must stop immediately
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Recovery error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryErrorCode {
    /// Redo position equals the checkpoint position
    NotInRecovery,
    /// Control file missing, short or corrupt
    ControlUnreadable,
    /// Segment holding the redo position cannot be opened
    SegmentOpenFailed,
    /// A page header failed validation
    InvalidPageHeader,
    /// I/O failure reading the log, or read-ahead could not start
    LogReadFailed,
    /// Record names a resource manager outside the table
    UnknownResourceManager,
    /// A redo routine failed
    RedoFailed,
    /// End-of-recovery checkpoint failed
    CheckpointFailed,
    /// Writing rows to the caller failed
    OutputFailed,
    /// Advancing the control file failed
    ControlUpdateFailed,
    /// Configuration rejected
    InvalidConfig,
}

impl RecoveryErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            RecoveryErrorCode::NotInRecovery => "WALREC_NOT_IN_RECOVERY",
            RecoveryErrorCode::ControlUnreadable => "WALREC_CONTROL_UNREADABLE",
            RecoveryErrorCode::SegmentOpenFailed => "WALREC_SEGMENT_OPEN_FAILED",
            RecoveryErrorCode::InvalidPageHeader => "WALREC_INVALID_PAGE_HEADER",
            RecoveryErrorCode::LogReadFailed => "WALREC_LOG_READ_FAILED",
            RecoveryErrorCode::UnknownResourceManager => "WALREC_UNKNOWN_RESOURCE_MANAGER",
            RecoveryErrorCode::RedoFailed => "WALREC_REDO_FAILED",
            RecoveryErrorCode::CheckpointFailed => "WALREC_CHECKPOINT_FAILED",
            RecoveryErrorCode::OutputFailed => "WALREC_OUTPUT_FAILED",
            RecoveryErrorCode::ControlUpdateFailed => "WALREC_CONTROL_UPDATE_FAILED",
            RecoveryErrorCode::InvalidConfig => "WALREC_INVALID_CONFIG",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for RecoveryErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Recovery error type with full context
#[derive(Debug)]
pub struct RecoveryError {
    /// Error code
    code: RecoveryErrorCode,
    /// Human-readable message
    message: String,
    /// Log position if applicable
    position: Option<Lsn>,
    /// Underlying failure
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RecoveryError {
    fn new(code: RecoveryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            position: None,
            source: None,
        }
    }

    fn at(mut self, position: Lsn) -> Self {
        self.position = Some(position);
        self
    }

    fn caused_by(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Nothing to replay: redo and checkpoint positions are equal
    pub fn not_in_recovery(position: Lsn) -> Self {
        Self::new(
            RecoveryErrorCode::NotInRecovery,
            format!("not in recovery: redo and checkpoint are both at {}, nothing to replay", position),
        )
        .at(position)
    }

    /// The control file could not be read
    pub fn control_unreadable(source: ControlError) -> Self {
        Self::new(RecoveryErrorCode::ControlUnreadable, source.message().to_string()).caused_by(source)
    }

    /// The control file could not be rewritten
    pub fn control_update_failed(position: Lsn, source: ControlError) -> Self {
        Self::new(
            RecoveryErrorCode::ControlUpdateFailed,
            format!("could not advance redo position to {}: {}", position, source.message()),
        )
        .at(position)
        .caused_by(source)
    }

    /// A record names a resource manager outside the table
    pub fn unknown_resource_manager(rmgr_id: u8, position: Lsn) -> Self {
        Self::new(
            RecoveryErrorCode::UnknownResourceManager,
            format!("resource manager with ID {} not registered at {}", rmgr_id, position),
        )
        .at(position)
    }

    /// Redo storage could not be opened
    pub fn storage_unavailable(reason: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::RedoFailed, reason)
    }

    /// The end-of-recovery checkpoint failed
    pub fn checkpoint_failed(position: Lsn, source: CheckpointError) -> Self {
        Self::new(
            RecoveryErrorCode::CheckpointFailed,
            format!("end-of-recovery checkpoint at {} failed: {}", position, source.message()),
        )
        .at(position)
        .caused_by(source)
    }

    /// A row could not be written to the caller
    pub fn output_failed(source: std::io::Error) -> Self {
        Self::new(RecoveryErrorCode::OutputFailed, format!("could not emit row: {}", source)).caused_by(source)
    }

    /// Read-ahead workers could not be started
    pub fn read_ahead_failed(source: std::io::Error) -> Self {
        Self::new(
            RecoveryErrorCode::LogReadFailed,
            format!("could not start read-ahead workers: {}", source),
        )
        .caused_by(source)
    }

    /// Configuration was rejected
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(RecoveryErrorCode::InvalidConfig, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> RecoveryErrorCode {
        self.code
    }

    /// Returns the severity (always FATAL)
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the log position if applicable
    pub fn position(&self) -> Option<Lsn> {
        self.position
    }

    /// Returns true (recovery errors are always fatal)
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl From<WalError> for RecoveryError {
    fn from(err: WalError) -> Self {
        let code = match err.code() {
            WalErrorCode::SegmentOpenFailed => RecoveryErrorCode::SegmentOpenFailed,
            WalErrorCode::InvalidPageHeader => RecoveryErrorCode::InvalidPageHeader,
            WalErrorCode::ReadFailed | WalErrorCode::TruncatedRead | WalErrorCode::CorruptedPage => {
                RecoveryErrorCode::LogReadFailed
            }
        };
        let message = match err.details() {
            Some(details) => format!("{} ({})", err.message(), details),
            None => err.message().to_string(),
        };
        Self::new(code, message).caused_by(err)
    }
}

impl From<RedoError> for RecoveryError {
    fn from(err: RedoError) -> Self {
        let position = err.position();
        Self::new(RecoveryErrorCode::RedoFailed, format!("redo failed: {}", err))
            .at(position)
            .caused_by(err)
    }
}

impl fmt::Display for RecoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)
    }
}

impl std::error::Error for RecoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type for recovery operations
pub type RecoveryResult<T> = Result<T, RecoveryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_codes() {
        assert_eq!(RecoveryErrorCode::NotInRecovery.code(), "WALREC_NOT_IN_RECOVERY");
        assert_eq!(
            RecoveryErrorCode::UnknownResourceManager.code(),
            "WALREC_UNKNOWN_RESOURCE_MANAGER"
        );
        assert_eq!(RecoveryErrorCode::RedoFailed.code(), "WALREC_REDO_FAILED");
        assert_eq!(RecoveryErrorCode::InvalidPageHeader.code(), "WALREC_INVALID_PAGE_HEADER");
    }

    #[test]
    fn test_all_errors_are_fatal() {
        let err = RecoveryError::not_in_recovery(Lsn(0x200));
        assert!(err.is_fatal());
        assert_eq!(err.severity(), Severity::Fatal);
        assert_eq!(err.position(), Some(Lsn(0x200)));
    }

    #[test]
    fn test_error_display() {
        let err = RecoveryError::unknown_resource_manager(42, Lsn(0x140));
        let display = format!("{}", err);
        assert!(display.contains("FATAL"));
        assert!(display.contains("WALREC_UNKNOWN_RESOURCE_MANAGER"));
        assert!(display.contains("ID 42"));
        assert!(display.contains("0/140"));
    }

    #[test]
    fn test_wal_error_mapping() {
        let open = WalError::segment_open_failed(
            &PathBuf::from("/data/000000010000000000000000"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let err = RecoveryError::from(open);
        assert_eq!(err.code(), RecoveryErrorCode::SegmentOpenFailed);
        assert!(err.message().contains("000000010000000000000000"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_redo_error_mapping() {
        let redo = RedoError::UnsupportedSubtype {
            position: Lsn(0x180),
            kind: "Heap/LOCK".into(),
        };
        let err = RecoveryError::from(redo);
        assert_eq!(err.code(), RecoveryErrorCode::RedoFailed);
        assert_eq!(err.position(), Some(Lsn(0x180)));
        assert!(err.message().contains("Heap/LOCK"));
    }
}
