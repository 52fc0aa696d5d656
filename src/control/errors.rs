//! Control file error types
//!
//! Error codes (all FATAL):
//! - WALREC_CONTROL_OPEN_FAILED
//! - WALREC_CONTROL_SHORT_READ
//! - WALREC_CONTROL_CORRUPTED
//! - WALREC_CONTROL_WRITE_FAILED

use std::fmt;
use std::io;
use std::path::Path;

/// Control file error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlErrorCode {
    /// Control file missing or unopenable
    OpenFailed,
    /// Control file has the wrong size
    ShortRead,
    /// Bad magic, version or checksum
    Corrupted,
    /// Atomic replace failed
    WriteFailed,
}

impl ControlErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ControlErrorCode::OpenFailed => "WALREC_CONTROL_OPEN_FAILED",
            ControlErrorCode::ShortRead => "WALREC_CONTROL_SHORT_READ",
            ControlErrorCode::Corrupted => "WALREC_CONTROL_CORRUPTED",
            ControlErrorCode::WriteFailed => "WALREC_CONTROL_WRITE_FAILED",
        }
    }
}

impl fmt::Display for ControlErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Control file error with full context
#[derive(Debug)]
pub struct ControlError {
    code: ControlErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl ControlError {
    pub fn open_failed(path: &Path, source: io::Error) -> Self {
        Self {
            code: ControlErrorCode::OpenFailed,
            message: format!("could not open control file \"{}\"", path.display()),
            source: Some(source),
        }
    }

    pub fn short_read(path: &Path, read: usize, expected: usize) -> Self {
        Self {
            code: ControlErrorCode::ShortRead,
            message: format!(
                "could not read control file \"{}\": read {} of {}",
                path.display(),
                read,
                expected
            ),
            source: None,
        }
    }

    pub fn corrupted(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            code: ControlErrorCode::Corrupted,
            message: format!("control file \"{}\" is corrupt: {}", path.display(), reason.into()),
            source: None,
        }
    }

    pub fn write_failed(path: &Path, step: &str, source: io::Error) -> Self {
        Self {
            code: ControlErrorCode::WriteFailed,
            message: format!("could not {} control file \"{}\"", step, path.display()),
            source: Some(source),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> ControlErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Control file errors always abort the operation
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[FATAL] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for control file operations
pub type ControlResult<T> = Result<T, ControlError>;
