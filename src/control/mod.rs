//! Control metadata for walrecover
//!
//! The control file holds the redo position replay resumes from, the
//! position of the last completed checkpoint, and the timeline. It is read
//! once at the start of every operation and rewritten only by the replay
//! finalizer, always by atomic replace.

mod errors;
mod file;

pub use errors::{ControlError, ControlErrorCode, ControlResult};
pub use file::{
    resolve_directory, ControlFile, ControlMetadata, DbState, ResolvedDirectory, CONTROL_FILE_SIZE,
    CONTROL_MAGIC, CONTROL_VERSION,
};
