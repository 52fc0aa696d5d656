//! # Redo Storage Errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::wal::BlockRef;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Relation storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("slot {slot} out of range (block holds {slots} slots)")]
    SlotOutOfRange { slot: u16, slots: usize },

    #[error("tuple of {len} bytes exceeds slot capacity of {max} bytes")]
    TupleTooLarge { len: usize, max: usize },

    #[error("malformed block {}/{}: {reason}", block.relation, block.block)]
    MalformedBlock { block: BlockRef, reason: String },

    #[error("invalid relation file name in {0}")]
    InvalidRelationName(PathBuf),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = StorageError::MalformedBlock {
            block: BlockRef::new(16384, 7),
            reason: "short block".into(),
        };
        assert_eq!(err.to_string(), "malformed block 16384/7: short block");

        let err = StorageError::SlotOutOfRange { slot: 80, slots: 63 };
        assert!(err.to_string().contains("slot 80"));
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;
        let err = StorageError::io("/tmp/x", io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(err.source().is_some());
    }
}
