//! WAL read-path error types
//!
//! Error codes:
//! - WALREC_WAL_SEGMENT_OPEN_FAILED (FATAL)
//! - WALREC_WAL_READ_FAILED (FATAL)
//! - WALREC_WAL_TRUNCATED_READ (ERROR, end of available log)
//! - WALREC_WAL_CORRUPTED_PAGE (FATAL)
//! - WALREC_WAL_INVALID_PAGE_HEADER (FATAL)

use std::fmt;
use std::io;
use std::path::Path;

use super::lsn::Lsn;
use super::page::PageHeader;

/// Severity levels for WAL errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The caller may treat the condition as the end of the log
    Error,
    /// The current operation must abort
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

/// WAL-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalErrorCode {
    /// Segment file missing or unopenable
    SegmentOpenFailed,
    /// Seek or read failed
    ReadFailed,
    /// Fewer bytes than required were available
    TruncatedRead,
    /// The read returned an inconsistent byte count
    CorruptedPage,
    /// Page header did not validate
    InvalidPageHeader,
}

impl WalErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            WalErrorCode::SegmentOpenFailed => "WALREC_WAL_SEGMENT_OPEN_FAILED",
            WalErrorCode::ReadFailed => "WALREC_WAL_READ_FAILED",
            WalErrorCode::TruncatedRead => "WALREC_WAL_TRUNCATED_READ",
            WalErrorCode::CorruptedPage => "WALREC_WAL_CORRUPTED_PAGE",
            WalErrorCode::InvalidPageHeader => "WALREC_WAL_INVALID_PAGE_HEADER",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            WalErrorCode::TruncatedRead => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for WalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// WAL error with full context
#[derive(Debug)]
pub struct WalError {
    code: WalErrorCode,
    message: String,
    details: Option<String>,
    /// Bytes actually read, for truncated reads
    read_len: Option<usize>,
    source: Option<io::Error>,
}

impl WalError {
    fn new(code: WalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            read_len: None,
            source: None,
        }
    }

    /// Segment file could not be opened
    pub fn segment_open_failed(path: &Path, source: io::Error) -> Self {
        let message = if source.kind() == io::ErrorKind::NotFound {
            format!("WAL segment not found: {}", path.display())
        } else {
            format!("Failed to open WAL segment: {}", path.display())
        };
        Self {
            source: Some(source),
            ..Self::new(WalErrorCode::SegmentOpenFailed, message)
        }
    }

    /// Seek or read failure on an open segment
    pub fn read_failed(path: &Path, offset: u64, source: io::Error) -> Self {
        Self {
            details: Some(format!("offset: {}", offset)),
            source: Some(source),
            ..Self::new(
                WalErrorCode::ReadFailed,
                format!("Failed to read WAL segment {}", path.display()),
            )
        }
    }

    /// Fewer bytes available than the caller required
    pub fn truncated_read(page_address: Lsn, read_len: usize, required: usize) -> Self {
        Self {
            details: Some(format!("read {} of {} bytes", read_len, required)),
            read_len: Some(read_len),
            ..Self::new(
                WalErrorCode::TruncatedRead,
                format!("Truncated read of WAL page at {}", page_address),
            )
        }
    }

    /// The read returned more bytes than a page holds
    pub fn corrupted_page(path: &Path, page_address: Lsn, read_len: usize, page_size: usize) -> Self {
        Self {
            details: Some(format!("read {} of {} bytes", read_len, page_size)),
            ..Self::new(
                WalErrorCode::CorruptedPage,
                format!(
                    "Could not read from WAL segment {}, LSN {}",
                    path.display(),
                    page_address
                ),
            )
        }
    }

    /// Page header failed validation; raw header fields go into the details
    pub fn invalid_page_header(
        reason: impl Into<String>,
        segment_offset: u64,
        expected: Lsn,
        header: &PageHeader,
    ) -> Self {
        Self {
            details: Some(format!(
                "page off: {}, expected pageaddr: {}, pageaddr: {}, info: {:#06x}, rem length: {}",
                segment_offset, expected, header.page_address, header.info, header.remaining_length
            )),
            ..Self::new(
                WalErrorCode::InvalidPageHeader,
                format!("Invalid page header: {}", reason.into()),
            )
        }
    }

    /// Returns the error code
    pub fn code(&self) -> WalErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Bytes read before a truncated read ended
    pub fn read_len(&self) -> Option<usize> {
        self.read_len
    }

    /// Returns whether this error must abort the operation
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for WalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;
