//! # Redo Errors

use thiserror::Error;

use crate::storage::StorageError;
use crate::wal::Lsn;

/// Result type for redo
pub type RedoResult<T> = Result<T, RedoError>;

/// Failure applying one record.
///
/// Every variant stops replay; a record is never skipped after its redo
/// failed.
#[derive(Debug, Error)]
pub enum RedoError {
    #[error("storage failure applying {kind} at {position}: {source}")]
    Storage {
        position: Lsn,
        kind: String,
        #[source]
        source: StorageError,
    },

    #[error("{kind} at {position} needs {needed} block reference(s), has {present}")]
    MissingBlockRef {
        position: Lsn,
        kind: String,
        needed: usize,
        present: usize,
    },

    #[error("malformed {kind} payload at {position}: {reason}")]
    MalformedPayload {
        position: Lsn,
        kind: String,
        reason: String,
    },

    #[error("no redo routine for {kind} at {position}")]
    UnsupportedSubtype { position: Lsn, kind: String },
}

impl RedoError {
    /// Position of the record whose redo failed.
    pub fn position(&self) -> Lsn {
        match self {
            RedoError::Storage { position, .. }
            | RedoError::MissingBlockRef { position, .. }
            | RedoError::MalformedPayload { position, .. }
            | RedoError::UnsupportedSubtype { position, .. } => *position,
        }
    }
}
