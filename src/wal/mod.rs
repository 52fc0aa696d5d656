//! Write-ahead log read path for walrecover
//!
//! Locates the segment holding a log position, reads and validates its
//! pages, and reassembles the record stream. Replay and listing consume
//! records only through [`RecordDecoder`] or its read-ahead wrapper
//! [`Prefetcher`].
//!
//! # Invariants Enforced
//!
//! - A page header validates before any byte on the page is trusted
//! - An invalid page header is fatal, never retried
//! - Every record is checksum-verified and prev-linked before it is yielded
//! - End of log and decode errors are distinct outcomes, neither fatal
//! - The segment file is closed on every exit path
//!
//! # Optimizations
//!
//! - Read-ahead: background block loads for upcoming records (optional,
//!   disabled by default)

mod builder;
mod checksum;
mod decoder;
mod errors;
mod lsn;
mod page;
mod prefetch;
mod record;
mod segment;

pub use builder::SegmentBuilder;
pub use checksum::compute_record_checksum;
pub use decoder::{ReadOutcome, RecordDecoder, DEFAULT_MAX_RECORD_SIZE};
pub use errors::{Severity, WalError, WalErrorCode, WalResult};
pub use lsn::Lsn;
pub use page::{
    LongHeaderFields, Page, PageHeader, PageRead, PageReader, BKP_REMOVABLE, FIRST_IS_CONTRECORD,
    LONG_HEADER, LONG_HEADER_SIZE, PAGE_MAGIC, SHORT_HEADER_SIZE,
};
pub use prefetch::{BlockPrefetch, PrefetchConfig, PrefetchStats, Prefetcher};
pub use record::{
    encode_record, BlockRef, DecodedRecord, RecordHeader, INFO_MASK, RECORD_ALIGN,
    RECORD_HEADER_SIZE,
};
pub use segment::{page_address, SegmentFile, SegmentGeometry, DEFAULT_SEGMENT_SIZE, PAGE_SIZE};
