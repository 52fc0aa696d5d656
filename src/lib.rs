//! walrecover - targeted write-ahead log replay
//!
//! Replays data-modifying log records from the redo position recorded in
//! a data directory's control file, advances that position, and requests
//! an end-of-recovery checkpoint. A read-only listing pass reports the
//! same records without applying them.

pub mod checkpoint;
pub mod cli;
pub mod control;
pub mod observability;
pub mod recovery;
pub mod rmgr;
pub mod storage;
pub mod wal;
