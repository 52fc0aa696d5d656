//! Redo target storage for walrecover
//!
//! Relation files made of page-sized heap blocks. Every block carries the
//! position of the last record applied to it, which is what makes redo
//! idempotent: a record at or below a block's position is already
//! reflected there and is not applied again.
//!
//! # Design Principles
//!
//! - Blocks past the end of a relation read as empty
//! - Reads consult the read-ahead cache first, then the file
//! - Writes invalidate the cache after the bytes reach the file
//! - Durability is established by the end-of-recovery checkpoint

mod block;
mod cache;
mod errors;
mod relation;

pub use block::{HeapBlock, BLOCK_HEADER_SIZE, MAX_TUPLE_LEN, SLOTS_PER_BLOCK, SLOT_SIZE};
pub use cache::{BlockCache, CacheStats, DEFAULT_CACHE_CAPACITY};
pub use errors::{StorageError, StorageResult};
pub use relation::RelationStore;
