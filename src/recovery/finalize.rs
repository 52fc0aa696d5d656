//! Recovery finalization
//!
//! Runs once after the record loop when at least one record was applied.
//!
//! 1. Rewrite the control file with the new redo position and the
//!    transaction-id high-water mark (atomic replace)
//! 2. Request an immediate, blocking end-of-recovery checkpoint
//!
//! The control file is written before the checkpoint is requested. A
//! crash between the two resumes from the new redo position.

use std::path::Path;

use chrono::Utc;

use crate::checkpoint::{CheckpointFlags, CheckpointRequest, CheckpointRequester};
use crate::control::{ControlFile, ControlMetadata};
use crate::observability::{log_event_with_fields, Event};

use super::errors::{RecoveryError, RecoveryResult};
use super::replay::ReplayProgress;

/// Persists replay progress and checkpoints.
pub struct RecoveryFinalizer<'a> {
    control: &'a ControlFile,
    checkpointer: &'a dyn CheckpointRequester,
}

impl<'a> RecoveryFinalizer<'a> {
    pub fn new(control: &'a ControlFile, checkpointer: &'a dyn CheckpointRequester) -> Self {
        Self { control, checkpointer }
    }

    /// Returns the metadata written, or `None` when nothing was applied.
    pub fn finalize(
        &self,
        data_dir: &Path,
        current: &ControlMetadata,
        progress: &ReplayProgress,
    ) -> RecoveryResult<Option<ControlMetadata>> {
        let Some(last) = &progress.last_applied else {
            return Ok(None);
        };

        let updated = ControlMetadata {
            redo: last.position,
            next_xid: current.next_xid.max(progress.xid_high_water as u64 + 1),
            updated_at: Utc::now().timestamp(),
            ..current.clone()
        };
        self.control
            .write_atomic(&updated)
            .map_err(|e| RecoveryError::control_update_failed(last.position, e))?;
        log_event_with_fields(
            Event::ControlUpdated,
            &[
                ("next_xid", &updated.next_xid.to_string()),
                ("previous_redo", &current.redo.to_string()),
                ("redo", &updated.redo.to_string()),
            ],
        );

        let request = CheckpointRequest {
            flags: CheckpointFlags::end_of_recovery(),
            redo: updated.redo,
            data_dir: data_dir.to_path_buf(),
        };
        log_event_with_fields(
            Event::CheckpointRequested,
            &[("flags", &request.flags.to_string()), ("redo", &request.redo.to_string())],
        );
        self.checkpointer
            .request_checkpoint(&request)
            .map_err(|e| RecoveryError::checkpoint_failed(request.redo, e))?;

        Ok(Some(updated))
    }
}
