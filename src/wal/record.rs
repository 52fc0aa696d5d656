//! Log record layout
//!
//! Each record is laid out as:
//! - Total Length (u32 LE), header plus body
//! - Transaction id (u32 LE)
//! - Previous record position (u64 LE)
//! - Info (u8), low nibble reserved for the log layer
//! - Resource manager id (u8)
//! - Padding (2 bytes)
//! - Checksum (u32 LE)
//!
//! The body holds a block reference count (u8), the block references
//! (relation u32, block u32), then the resource-manager payload.
//! Records start on an 8-byte boundary.

use std::io;

use super::checksum::{compute_record_checksum, verify_record_checksum};
use super::lsn::Lsn;

/// Size of the fixed record header.
pub const RECORD_HEADER_SIZE: usize = 24;

/// Records start at multiples of this alignment.
pub const RECORD_ALIGN: u64 = 8;

/// Bits of `info` reserved for the log layer.
pub const INFO_MASK: u8 = 0x0F;

/// Most block references a record may carry.
pub const MAX_BLOCK_REFS: usize = u8::MAX as usize;

const CRC_OFFSET: usize = 20;
const BLOCK_REF_SIZE: usize = 8;

/// Fixed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub total_length: u32,
    pub xid: u32,
    pub prev: Lsn,
    pub info: u8,
    pub rmgr_id: u8,
    pub crc: u32,
}

impl RecordHeader {
    /// Parses a header from the first `RECORD_HEADER_SIZE` bytes.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return None;
        }
        Some(Self {
            total_length: u32::from_le_bytes(bytes[0..4].try_into().ok()?),
            xid: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            prev: Lsn(u64::from_le_bytes(bytes[8..16].try_into().ok()?)),
            info: bytes[16],
            rmgr_id: bytes[17],
            crc: u32::from_le_bytes(bytes[20..24].try_into().ok()?),
        })
    }

    /// Serializes the header.
    pub fn encode(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut out = [0u8; RECORD_HEADER_SIZE];
        out[0..4].copy_from_slice(&self.total_length.to_le_bytes());
        out[4..8].copy_from_slice(&self.xid.to_le_bytes());
        out[8..16].copy_from_slice(&self.prev.0.to_le_bytes());
        out[16] = self.info;
        out[17] = self.rmgr_id;
        out[20..24].copy_from_slice(&self.crc.to_le_bytes());
        out
    }
}

/// Reference to one storage block touched by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockRef {
    pub relation: u32,
    pub block: u32,
}

impl BlockRef {
    pub fn new(relation: u32, block: u32) -> Self {
        Self { relation, block }
    }
}

/// A fully reassembled and checksum-verified record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    start: Lsn,
    end: Lsn,
    header: RecordHeader,
    blocks: Vec<BlockRef>,
    payload: Vec<u8>,
}

impl DecodedRecord {
    /// Validates raw record bytes read from `start` up to `end`.
    ///
    /// Returns a description of the problem when the bytes do not form a
    /// valid record.
    pub fn from_bytes(start: Lsn, end: Lsn, bytes: &[u8]) -> Result<Self, String> {
        let header = RecordHeader::parse(bytes)
            .ok_or_else(|| format!("record at {} is shorter than its header", start))?;
        if header.total_length as usize != bytes.len() {
            return Err(format!(
                "record at {} has length {} but {} bytes were assembled",
                start,
                header.total_length,
                bytes.len()
            ));
        }

        let body = &bytes[RECORD_HEADER_SIZE..];
        if !verify_record_checksum(&bytes[..CRC_OFFSET], body, header.crc) {
            return Err(format!("incorrect resource manager data checksum in record at {}", start));
        }

        let (blocks, payload) =
            decode_body(body).map_err(|reason| format!("{} in record at {}", reason, start))?;

        Ok(Self {
            start,
            end,
            header,
            blocks,
            payload,
        })
    }

    /// Position of the first byte of the record.
    pub fn start(&self) -> Lsn {
        self.start
    }

    /// Position just past the last byte of the record.
    pub fn end(&self) -> Lsn {
        self.end
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    pub fn xid(&self) -> u32 {
        self.header.xid
    }

    pub fn info(&self) -> u8 {
        self.header.info
    }

    /// Resource-manager sub-type (`info` without the log-layer bits).
    pub fn subtype(&self) -> u8 {
        self.header.info & !INFO_MASK
    }

    pub fn rmgr_id(&self) -> u8 {
        self.header.rmgr_id
    }

    pub fn prev(&self) -> Lsn {
        self.header.prev
    }

    pub fn total_length(&self) -> u32 {
        self.header.total_length
    }

    pub fn blocks(&self) -> &[BlockRef] {
        &self.blocks
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Serializes a record body.
pub fn encode_body(blocks: &[BlockRef], payload: &[u8]) -> io::Result<Vec<u8>> {
    if blocks.len() > MAX_BLOCK_REFS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} block references exceed the limit of {}", blocks.len(), MAX_BLOCK_REFS),
        ));
    }
    let mut body = Vec::with_capacity(1 + blocks.len() * BLOCK_REF_SIZE + payload.len());
    body.push(blocks.len() as u8);
    for block in blocks {
        body.extend_from_slice(&block.relation.to_le_bytes());
        body.extend_from_slice(&block.block.to_le_bytes());
    }
    body.extend_from_slice(payload);
    Ok(body)
}

/// Splits a record body into block references and payload.
pub fn decode_body(body: &[u8]) -> Result<(Vec<BlockRef>, Vec<u8>), String> {
    let (&count, rest) = body
        .split_first()
        .ok_or_else(|| "missing block reference count".to_string())?;
    let refs_len = count as usize * BLOCK_REF_SIZE;
    if rest.len() < refs_len {
        return Err(format!(
            "{} block references need {} bytes, {} present",
            count,
            refs_len,
            rest.len()
        ));
    }

    let blocks = rest[..refs_len]
        .chunks_exact(BLOCK_REF_SIZE)
        .map(|chunk| {
            let mut relation = [0u8; 4];
            let mut block = [0u8; 4];
            relation.copy_from_slice(&chunk[0..4]);
            block.copy_from_slice(&chunk[4..8]);
            BlockRef::new(u32::from_le_bytes(relation), u32::from_le_bytes(block))
        })
        .collect();

    Ok((blocks, rest[refs_len..].to_vec()))
}

/// Serializes a complete record with its length and checksum filled in.
pub fn encode_record(
    xid: u32,
    prev: Lsn,
    info: u8,
    rmgr_id: u8,
    blocks: &[BlockRef],
    payload: &[u8],
) -> io::Result<Vec<u8>> {
    let body = encode_body(blocks, payload)?;
    let total_length = u32::try_from(RECORD_HEADER_SIZE + body.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record too large"))?;

    let mut header = RecordHeader {
        total_length,
        xid,
        prev,
        info,
        rmgr_id,
        crc: 0,
    };
    let unsigned = header.encode();
    header.crc = compute_record_checksum(&unsigned[..CRC_OFFSET], &body);

    let mut out = Vec::with_capacity(total_length as usize);
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&body);
    Ok(out)
}
