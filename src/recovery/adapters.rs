//! Adapter implementations for recovery traits
//!
//! Binds the replay loop to the concrete decoder, read-ahead wrapper and
//! relation storage.

use std::sync::Arc;

use crate::rmgr::{RedoOutcome, RmgrId};
use crate::storage::RelationStore;
use crate::wal::{DecodedRecord, Prefetcher, ReadOutcome, RecordDecoder};

use super::errors::RecoveryResult;
use super::replay::{LogRead, RedoTarget};

// ============================================================================
// LogRead implementations
// ============================================================================

impl LogRead for RecordDecoder {
    fn read_record(&mut self) -> RecoveryResult<ReadOutcome> {
        Ok(RecordDecoder::read_record(self)?)
    }

    fn segment_name(&self) -> &str {
        RecordDecoder::segment_name(self)
    }

    fn pages_read(&self) -> u64 {
        RecordDecoder::pages_read(self)
    }
}

impl LogRead for Prefetcher {
    fn read_record(&mut self) -> RecoveryResult<ReadOutcome> {
        Ok(Prefetcher::read_record(self)?)
    }

    fn segment_name(&self) -> &str {
        self.decoder().segment_name()
    }

    fn pages_read(&self) -> u64 {
        self.decoder().pages_read()
    }
}

// ============================================================================
// RedoTarget implementation for relation storage
// ============================================================================

/// Applies records to relation files through the dispatch table.
pub struct StorageRedo {
    store: Arc<RelationStore>,
}

impl StorageRedo {
    pub fn new(store: Arc<RelationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RelationStore {
        &self.store
    }
}

impl RedoTarget for StorageRedo {
    fn redo(&mut self, rmgr: RmgrId, record: &DecodedRecord) -> RecoveryResult<RedoOutcome> {
        Ok(rmgr.redo(record, &self.store)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rmgr::heap::{HeapOp, XLOG_HEAP_INSERT};
    use crate::wal::{
        BlockRef, PageReader, SegmentBuilder, SegmentFile, SegmentGeometry, DEFAULT_MAX_RECORD_SIZE,
    };
    use tempfile::TempDir;

    fn write_segment(dir: &std::path::Path) -> crate::wal::Lsn {
        let mut builder = SegmentBuilder::new(SegmentGeometry::default(), 1, 7, 0);
        let insert = HeapOp::Insert {
            slot: 2,
            tuple: b"hello".to_vec(),
        };
        let start = builder
            .append(10, XLOG_HEAP_INSERT, 100, &[BlockRef::new(16384, 0)], &insert.encode())
            .unwrap();
        builder.write_to(dir).unwrap();
        start
    }

    #[test]
    fn test_decoder_as_log_read() {
        let temp_dir = TempDir::new().unwrap();
        let start = write_segment(temp_dir.path());

        let segment = SegmentFile::open(temp_dir.path(), SegmentGeometry::default(), 1, start).unwrap();
        let mut decoder = RecordDecoder::begin(PageReader::new(segment, 7), start, DEFAULT_MAX_RECORD_SIZE);
        let log: &mut dyn LogRead = &mut decoder;

        assert!(matches!(log.read_record().unwrap(), ReadOutcome::Record(_)));
        assert_eq!(log.read_record().unwrap(), ReadOutcome::EndOfLog);
        assert_eq!(log.segment_name(), "000000010000000000000000");
        assert!(log.pages_read() >= 1);
    }

    #[test]
    fn test_storage_redo_applies_heap_insert() {
        let temp_dir = TempDir::new().unwrap();
        let start = write_segment(temp_dir.path());

        let segment = SegmentFile::open(temp_dir.path(), SegmentGeometry::default(), 1, start).unwrap();
        let mut decoder = RecordDecoder::begin(PageReader::new(segment, 7), start, DEFAULT_MAX_RECORD_SIZE);
        let ReadOutcome::Record(record) = decoder.read_record().unwrap() else {
            panic!("expected a record");
        };

        let store = Arc::new(RelationStore::open(temp_dir.path()).unwrap());
        let mut target = StorageRedo::new(Arc::clone(&store));
        assert_eq!(target.redo(RmgrId::Heap, &record).unwrap(), RedoOutcome::Applied);
        assert_eq!(target.redo(RmgrId::Heap, &record).unwrap(), RedoOutcome::AlreadyApplied);

        let block = store.read_block_direct(BlockRef::new(16384, 0)).unwrap();
        assert_eq!(block.tuple(2), Some(&b"hello"[..]));
        assert_eq!(block.lsn(), start);
    }
}
