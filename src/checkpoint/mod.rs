//! Checkpoint scheduling for walrecover
//!
//! Replay requests one immediate, synchronous end-of-recovery checkpoint
//! after it has advanced the control file. The request goes through the
//! [`CheckpointRequester`] seam so replay does not depend on how the
//! checkpoint is carried out.
//!
//! # Algorithm (local checkpointer)
//!
//! 1. fsync every relation file under `base/`
//! 2. fsync `base/`
//! 3. Write the checkpoint marker (`checkpoint.json`) and fsync it
//! 4. fsync the data directory
//!
//! # Important
//!
//! The checkpointer never touches the control file; replay owns it.

mod errors;
mod marker;

pub use errors::{CheckpointError, CheckpointErrorCode, CheckpointResult, Severity};
pub use marker::{marker_path, CheckpointMarker};

use std::fmt;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};

use crate::observability::{log_event_with_fields, Event};
use crate::storage::RelationStore;
use crate::wal::Lsn;

/// Flags carried by a checkpoint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckpointFlags(u8);

impl CheckpointFlags {
    /// The checkpoint ends a recovery pass
    pub const END_OF_RECOVERY: CheckpointFlags = CheckpointFlags(0x01);
    /// Run at once, without spreading I/O
    pub const IMMEDIATE: CheckpointFlags = CheckpointFlags(0x02);
    /// The caller blocks until completion
    pub const WAIT: CheckpointFlags = CheckpointFlags(0x04);

    /// The flags replay requests with.
    pub fn end_of_recovery() -> Self {
        Self::END_OF_RECOVERY | Self::IMMEDIATE | Self::WAIT
    }

    pub fn contains(self, other: CheckpointFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the set flags, in bit order.
    pub fn names(self) -> Vec<String> {
        [
            (Self::END_OF_RECOVERY, "END_OF_RECOVERY"),
            (Self::IMMEDIATE, "IMMEDIATE"),
            (Self::WAIT, "WAIT"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name.to_string())
        .collect()
    }
}

impl std::ops::BitOr for CheckpointFlags {
    type Output = CheckpointFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        CheckpointFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for CheckpointFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join("|"))
    }
}

/// A request for a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRequest {
    pub flags: CheckpointFlags,
    /// Redo position recorded in the control file before the request
    pub redo: Lsn,
    /// Data directory the replay ran against
    pub data_dir: PathBuf,
}

/// Performs checkpoints on behalf of replay.
///
/// `request_checkpoint` blocks until the checkpoint is complete.
pub trait CheckpointRequester {
    fn request_checkpoint(&self, request: &CheckpointRequest) -> CheckpointResult<()>;
}

/// Local checkpointer: syncs relation storage and records a marker.
#[derive(Debug, Default)]
pub struct StorageCheckpointer;

impl StorageCheckpointer {
    pub fn new() -> Self {
        Self
    }
}

impl CheckpointRequester for StorageCheckpointer {
    fn request_checkpoint(&self, request: &CheckpointRequest) -> CheckpointResult<()> {
        let store = RelationStore::open(&request.data_dir).map_err(|e| {
            CheckpointError::failed_with_source(
                format!("Failed to open relation storage in {}", request.data_dir.display()),
                e,
            )
        })?;
        let synced = store
            .sync_all()
            .map_err(|e| CheckpointError::failed_with_source("Failed to sync relation files", e))?;

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let marker = CheckpointMarker::new(request.redo, request.flags.names(), &created_at);
        marker.write_to_file(&marker_path(&request.data_dir))?;

        log_event_with_fields(
            Event::CheckpointComplete,
            &[
                ("flags", &request.flags.to_string()),
                ("redo", &request.redo.to_string()),
                ("relations_synced", &synced.to_string()),
            ],
        );
        Ok(())
    }
}
