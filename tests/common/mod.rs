//! Shared fixtures for integration tests
//!
//! Builds data directories holding a control file and one log segment.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use walrecover::checkpoint::{
    CheckpointRequest, CheckpointRequester, CheckpointResult, StorageCheckpointer,
};
use walrecover::control::{ControlFile, ControlMetadata, DbState};
use walrecover::recovery::{RecoveryManager, ReplayConfig};
use walrecover::rmgr::heap::{HeapOp, XLOG_HEAP_INSERT};
use walrecover::wal::{BlockRef, Lsn, SegmentBuilder, SegmentGeometry};

pub const SYSTEM_ID: u64 = 0x5EED;
pub const TIMELINE: u32 = 1;
pub const HEAP: u8 = 10;
pub const RELATION: u32 = 16384;

/// Tuple sized so that a one-block heap INSERT occupies exactly 0x40 bytes.
pub fn tuple(i: usize) -> Vec<u8> {
    format!("tuple-{:018}", i).into_bytes()
}

pub fn builder() -> SegmentBuilder {
    SegmentBuilder::new(SegmentGeometry::default(), TIMELINE, SYSTEM_ID, 0)
}

pub fn append_insert(builder: &mut SegmentBuilder, slot: u16, xid: u32) -> Lsn {
    let op = HeapOp::Insert {
        slot,
        tuple: tuple(slot as usize),
    };
    builder
        .append(HEAP, XLOG_HEAP_INSERT, xid, &[BlockRef::new(RELATION, 0)], &op.encode())
        .expect("append insert")
}

pub fn write_control(dir: &Path, redo: Lsn, checkpoint: Lsn) -> ControlMetadata {
    let metadata = ControlMetadata {
        system_id: SYSTEM_ID,
        redo,
        checkpoint,
        timeline: TIMELINE,
        state: DbState::InCrashRecovery,
        next_xid: 1,
        updated_at: 0,
    };
    ControlFile::in_directory(dir)
        .write_atomic(&metadata)
        .expect("write control file");
    metadata
}

pub fn read_control(dir: &Path) -> ControlMetadata {
    ControlFile::in_directory(dir).read().expect("read control file")
}

/// Three inserts at 0/100, 0/140 and 0/180 followed by a fourth record cut
/// off in the middle of its body.
pub fn scenario_segment(dir: &Path) -> Vec<Lsn> {
    let mut b = builder();
    b.pad_to(Lsn(0x100)).expect("pad");
    let positions = vec![
        append_insert(&mut b, 0, 100),
        append_insert(&mut b, 1, 101),
        append_insert(&mut b, 2, 102),
    ];
    let fourth = append_insert(&mut b, 3, 103);
    let path = b.write_to(dir).expect("write segment");

    let bytes = fs::read(&path).expect("read segment");
    let cut = fourth.as_u64() as usize + 30;
    fs::write(&path, &bytes[..cut]).expect("truncate segment");
    positions
}

/// Records every checkpoint request, then performs it on disk.
#[derive(Clone, Default)]
pub struct RecordingCheckpointer {
    pub requests: Arc<Mutex<Vec<CheckpointRequest>>>,
    pub calls: Arc<AtomicUsize>,
}

impl RecordingCheckpointer {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CheckpointRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl CheckpointRequester for RecordingCheckpointer {
    fn request_checkpoint(&self, request: &CheckpointRequest) -> CheckpointResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        StorageCheckpointer::new().request_checkpoint(request)
    }
}

pub fn config(default_dir: &Path) -> ReplayConfig {
    ReplayConfig {
        default_data_dir: default_dir.display().to_string(),
        ..Default::default()
    }
}

pub fn manager(config: ReplayConfig) -> (RecoveryManager, RecordingCheckpointer) {
    let checkpointer = RecordingCheckpointer::default();
    let manager = RecoveryManager::new(config, Box::new(checkpointer.clone()));
    (manager, checkpointer)
}

pub fn relation_bytes(dir: &Path, relation: u32) -> Vec<u8> {
    fs::read(dir.join("base").join(relation.to_string())).unwrap_or_default()
}
