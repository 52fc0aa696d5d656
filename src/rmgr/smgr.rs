//! Storage manager records
//!
//! Payloads (little endian):
//! - CREATE: relation u32
//! - TRUNCATE: relation u32, block count u32

use crate::storage::RelationStore;
use crate::wal::{DecodedRecord, INFO_MASK};

use super::errors::{RedoError, RedoResult};
use super::RedoOutcome;

pub const XLOG_SMGR_CREATE: u8 = 0x10;
pub const XLOG_SMGR_TRUNCATE: u8 = 0x20;

pub fn identify(info: u8) -> &'static str {
    match info & !INFO_MASK {
        XLOG_SMGR_CREATE => "CREATE",
        XLOG_SMGR_TRUNCATE => "TRUNCATE",
        _ => "UNKNOWN",
    }
}

/// Payload of a CREATE record.
pub fn encode_create(relation: u32) -> Vec<u8> {
    relation.to_le_bytes().to_vec()
}

/// Payload of a TRUNCATE record.
pub fn encode_truncate(relation: u32, nblocks: u32) -> Vec<u8> {
    let mut out = relation.to_le_bytes().to_vec();
    out.extend_from_slice(&nblocks.to_le_bytes());
    out
}

fn read_u32(payload: &[u8], at: usize) -> Option<u32> {
    let bytes = payload.get(at..at + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn redo(record: &DecodedRecord, store: &RelationStore) -> RedoResult<RedoOutcome> {
    let position = record.start();
    let kind = format!("Storage/{}", identify(record.info()));
    let payload = record.payload();
    let malformed = |expected: usize| RedoError::MalformedPayload {
        position,
        kind: kind.clone(),
        reason: format!("expected {} bytes, found {}", expected, payload.len()),
    };

    let result = match record.info() & !INFO_MASK {
        XLOG_SMGR_CREATE => {
            let relation = read_u32(payload, 0).ok_or_else(|| malformed(4))?;
            store.create_relation(relation)
        }
        XLOG_SMGR_TRUNCATE => {
            let relation = read_u32(payload, 0).ok_or_else(|| malformed(8))?;
            let nblocks = read_u32(payload, 4).ok_or_else(|| malformed(8))?;
            store.truncate_relation(relation, nblocks)
        }
        _ => return Err(RedoError::UnsupportedSubtype { position, kind }),
    };

    result.map_err(|source| RedoError::Storage {
        position,
        kind: kind.clone(),
        source,
    })?;
    Ok(RedoOutcome::Applied)
}
