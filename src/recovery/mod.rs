//! Recovery subsystem for walrecover
//!
//! Targeted replay of the write-ahead log from the redo position recorded
//! in the control file, and a read-only listing variant of the same pass.
//!
//! # Replay sequence (strict order)
//!
//! 1. Read the control file; nothing to do when redo equals checkpoint
//! 2. Open the segment holding the redo position
//! 3. Decode records until end of log or the first decode error
//! 4. Apply DML records through the resource manager table
//! 5. Advance the control file's redo position to the last applied record
//! 6. Request an end-of-recovery checkpoint and wait for it
//!
//! # Invariants
//!
//! - Redo order is log order; replay is single-threaded
//! - The control file is only written after every redo call succeeded
//! - An unknown resource manager, a redo failure or an invalid page
//!   header aborts the pass with the control file untouched
//! - Listing never applies records, writes the control file or checkpoints

mod adapters;
mod config;
mod errors;
mod finalize;
mod list;
mod manager;
mod replay;

pub use adapters::StorageRedo;
pub use config::{ReplayConfig, DATA_DIR_ENV};
pub use errors::{RecoveryError, RecoveryErrorCode, RecoveryResult, Severity};
pub use finalize::RecoveryFinalizer;
pub use list::{list_records, JsonLinesSink, ListSummary, ListedRecord, RecordSink};
pub use manager::{RecoveryManager, ReplayResult, ReplayState};
pub use replay::{LastApplied, LogRead, RedoTarget, ReplayProgress, StopReason, WalReplayer};
