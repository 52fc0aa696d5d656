//! Heap resource manager
//!
//! Payloads (little endian):
//! - INSERT, INPLACE: slot u16, len u16, tuple
//! - DELETE, LOCK: slot u16
//! - UPDATE, HOT_UPDATE: old slot u16, new slot u16, len u16, tuple
//!
//! The old tuple of an update lives on block reference 0 and the new one
//! on block reference 1, or on block 0 when only one is present.

use crate::storage::{HeapBlock, RelationStore, StorageResult};
use crate::wal::{BlockRef, DecodedRecord, Lsn, INFO_MASK};

use super::errors::{RedoError, RedoResult};
use super::RedoOutcome;

pub const XLOG_HEAP_INSERT: u8 = 0x00;
pub const XLOG_HEAP_DELETE: u8 = 0x10;
pub const XLOG_HEAP_UPDATE: u8 = 0x20;
pub const XLOG_HEAP_HOT_UPDATE: u8 = 0x40;
pub const XLOG_HEAP_LOCK: u8 = 0x60;
pub const XLOG_HEAP_INPLACE: u8 = 0x70;

/// A decoded heap operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapOp {
    Insert { slot: u16, tuple: Vec<u8> },
    Delete { slot: u16 },
    Update { old_slot: u16, new_slot: u16, tuple: Vec<u8>, hot: bool },
    Lock { slot: u16 },
    Inplace { slot: u16, tuple: Vec<u8> },
}

impl HeapOp {
    /// Sub-type bits for this operation.
    pub fn subtype(&self) -> u8 {
        match self {
            HeapOp::Insert { .. } => XLOG_HEAP_INSERT,
            HeapOp::Delete { .. } => XLOG_HEAP_DELETE,
            HeapOp::Update { hot: false, .. } => XLOG_HEAP_UPDATE,
            HeapOp::Update { hot: true, .. } => XLOG_HEAP_HOT_UPDATE,
            HeapOp::Lock { .. } => XLOG_HEAP_LOCK,
            HeapOp::Inplace { .. } => XLOG_HEAP_INPLACE,
        }
    }

    /// Serializes the payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            HeapOp::Insert { slot, tuple } | HeapOp::Inplace { slot, tuple } => {
                out.extend_from_slice(&slot.to_le_bytes());
                out.extend_from_slice(&(tuple.len() as u16).to_le_bytes());
                out.extend_from_slice(tuple);
            }
            HeapOp::Delete { slot } | HeapOp::Lock { slot } => {
                out.extend_from_slice(&slot.to_le_bytes());
            }
            HeapOp::Update {
                old_slot,
                new_slot,
                tuple,
                ..
            } => {
                out.extend_from_slice(&old_slot.to_le_bytes());
                out.extend_from_slice(&new_slot.to_le_bytes());
                out.extend_from_slice(&(tuple.len() as u16).to_le_bytes());
                out.extend_from_slice(tuple);
            }
        }
        out
    }

    /// Parses the payload of a record with the given `info`.
    pub fn decode(info: u8, payload: &[u8]) -> Result<Self, String> {
        let mut cursor = Cursor { bytes: payload, at: 0 };
        let op = match info & !INFO_MASK {
            XLOG_HEAP_INSERT => HeapOp::Insert {
                slot: cursor.u16()?,
                tuple: cursor.tuple()?,
            },
            XLOG_HEAP_INPLACE => HeapOp::Inplace {
                slot: cursor.u16()?,
                tuple: cursor.tuple()?,
            },
            XLOG_HEAP_DELETE => HeapOp::Delete { slot: cursor.u16()? },
            XLOG_HEAP_LOCK => HeapOp::Lock { slot: cursor.u16()? },
            sub @ (XLOG_HEAP_UPDATE | XLOG_HEAP_HOT_UPDATE) => HeapOp::Update {
                old_slot: cursor.u16()?,
                new_slot: cursor.u16()?,
                tuple: cursor.tuple()?,
                hot: sub == XLOG_HEAP_HOT_UPDATE,
            },
            other => return Err(format!("unknown heap sub-type {:#04x}", other)),
        };
        if cursor.at != payload.len() {
            return Err(format!("{} trailing bytes", payload.len() - cursor.at));
        }
        Ok(op)
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], String> {
        let end = self.at + n;
        if end > self.bytes.len() {
            return Err(format!("payload ends at {} bytes, needed {}", self.bytes.len(), end));
        }
        let out = &self.bytes[self.at..end];
        self.at = end;
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, String> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn tuple(&mut self) -> Result<Vec<u8>, String> {
        let len = self.u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

pub fn identify(info: u8) -> &'static str {
    match info & !INFO_MASK {
        XLOG_HEAP_INSERT => "INSERT",
        XLOG_HEAP_DELETE => "DELETE",
        XLOG_HEAP_UPDATE => "UPDATE",
        XLOG_HEAP_HOT_UPDATE => "HOT_UPDATE",
        XLOG_HEAP_LOCK => "LOCK",
        XLOG_HEAP_INPLACE => "INPLACE",
        _ => "UNKNOWN",
    }
}

/// Whether the sub-type is a data-modifying operation.
pub fn is_dml(info: u8) -> bool {
    matches!(
        info & !INFO_MASK,
        XLOG_HEAP_INSERT | XLOG_HEAP_DELETE | XLOG_HEAP_UPDATE | XLOG_HEAP_HOT_UPDATE | XLOG_HEAP_INPLACE
    )
}

pub fn redo(record: &DecodedRecord, store: &RelationStore) -> RedoResult<RedoOutcome> {
    let position = record.start();
    let kind = || format!("Heap/{}", identify(record.info()));

    let op = HeapOp::decode(record.info(), record.payload()).map_err(|reason| {
        RedoError::MalformedPayload {
            position,
            kind: kind(),
            reason,
        }
    })?;

    let blocks = record.blocks();
    let Some(&first) = blocks.first() else {
        return Err(RedoError::MissingBlockRef {
            position,
            kind: kind(),
            needed: 1,
            present: 0,
        });
    };

    let storage_err = |source| RedoError::Storage {
        position,
        kind: kind(),
        source,
    };

    let changed = match op {
        HeapOp::Insert { slot, tuple } | HeapOp::Inplace { slot, tuple } => {
            apply(store, first, position, |b| b.put_tuple(slot, &tuple)).map_err(storage_err)?
        }
        HeapOp::Delete { slot } => {
            apply(store, first, position, |b| b.clear(slot)).map_err(storage_err)?
        }
        HeapOp::Lock { .. } => false,
        HeapOp::Update {
            old_slot,
            new_slot,
            tuple,
            ..
        } => match blocks.get(1).copied().filter(|b| *b != first) {
            Some(second) => {
                let old = apply(store, first, position, |b| b.clear(old_slot)).map_err(storage_err)?;
                let new = apply(store, second, position, |b| b.put_tuple(new_slot, &tuple))
                    .map_err(storage_err)?;
                old || new
            }
            None => apply(store, first, position, |b| {
                b.clear(old_slot)?;
                b.put_tuple(new_slot, &tuple)
            })
            .map_err(storage_err)?,
        },
    };

    Ok(if changed {
        RedoOutcome::Applied
    } else if matches!(record.info() & !INFO_MASK, XLOG_HEAP_LOCK) {
        RedoOutcome::NoOp
    } else {
        RedoOutcome::AlreadyApplied
    })
}

/// Applies `change` to a block unless the block already reflects
/// `position`. Returns whether the block was written.
fn apply(
    store: &RelationStore,
    block: BlockRef,
    position: Lsn,
    change: impl FnOnce(&mut HeapBlock) -> StorageResult<()>,
) -> StorageResult<bool> {
    let mut image = store.read_block(block)?;
    if image.lsn() >= position {
        return Ok(false);
    }
    change(&mut image)?;
    image.set_lsn(position);
    store.write_block(block, &image)?;
    Ok(true)
}
