//! Heap block layout
//!
//! A block is one page of a relation file:
//! - Page LSN (u64 LE), position of the last record applied to the block
//! - Slot count (u16 LE), one past the highest occupied slot
//! - Padding (6 bytes)
//! - Fixed slots of `SLOT_SIZE` bytes: length (u16 LE) then tuple bytes.
//!   A zero length means the slot is empty.

use crate::wal::{BlockRef, Lsn, PAGE_SIZE};

use super::errors::{StorageError, StorageResult};

/// Size of the block header.
pub const BLOCK_HEADER_SIZE: usize = 16;

/// Size of one tuple slot.
pub const SLOT_SIZE: usize = 128;

/// Slots in one block.
pub const SLOTS_PER_BLOCK: usize = (PAGE_SIZE - BLOCK_HEADER_SIZE) / SLOT_SIZE;

/// Largest tuple a slot can hold.
pub const MAX_TUPLE_LEN: usize = SLOT_SIZE - 2;

/// In-memory image of one heap block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapBlock {
    lsn: Lsn,
    slots: Vec<Option<Vec<u8>>>,
}

impl Default for HeapBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapBlock {
    /// An empty, never-written block.
    pub fn new() -> Self {
        Self {
            lsn: Lsn::INVALID,
            slots: vec![None; SLOTS_PER_BLOCK],
        }
    }

    /// Parses a full page image.
    pub fn decode(block: BlockRef, bytes: &[u8]) -> StorageResult<Self> {
        let malformed = |reason: String| StorageError::MalformedBlock { block, reason };

        if bytes.len() != PAGE_SIZE {
            return Err(malformed(format!("block is {} bytes, expected {}", bytes.len(), PAGE_SIZE)));
        }

        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        let slot_count = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        if slot_count > SLOTS_PER_BLOCK {
            return Err(malformed(format!("slot count {} exceeds {}", slot_count, SLOTS_PER_BLOCK)));
        }

        let mut slots = vec![None; SLOTS_PER_BLOCK];
        for (i, slot) in slots.iter_mut().enumerate().take(slot_count) {
            let at = BLOCK_HEADER_SIZE + i * SLOT_SIZE;
            let len = u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize;
            if len > MAX_TUPLE_LEN {
                return Err(malformed(format!("slot {} claims {} bytes", i, len)));
            }
            if len > 0 {
                *slot = Some(bytes[at + 2..at + 2 + len].to_vec());
            }
        }

        Ok(Self {
            lsn: Lsn(u64::from_le_bytes(lsn)),
            slots,
        })
    }

    /// Serializes the block into a full page image.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; PAGE_SIZE];
        out[0..8].copy_from_slice(&self.lsn.as_u64().to_le_bytes());
        out[8..10].copy_from_slice(&(self.slot_count() as u16).to_le_bytes());
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(tuple) = slot {
                let at = BLOCK_HEADER_SIZE + i * SLOT_SIZE;
                out[at..at + 2].copy_from_slice(&(tuple.len() as u16).to_le_bytes());
                out[at + 2..at + 2 + tuple.len()].copy_from_slice(tuple);
            }
        }
        out
    }

    /// Position of the last record applied to this block.
    pub fn lsn(&self) -> Lsn {
        self.lsn
    }

    pub fn set_lsn(&mut self, lsn: Lsn) {
        self.lsn = lsn;
    }

    /// Tuple in `slot`, if any.
    pub fn tuple(&self, slot: u16) -> Option<&[u8]> {
        self.slots.get(slot as usize).and_then(|s| s.as_deref())
    }

    /// Stores `tuple` in `slot`, replacing what was there.
    pub fn put_tuple(&mut self, slot: u16, tuple: &[u8]) -> StorageResult<()> {
        if tuple.len() > MAX_TUPLE_LEN {
            return Err(StorageError::TupleTooLarge {
                len: tuple.len(),
                max: MAX_TUPLE_LEN,
            });
        }
        let entry = self.slot_mut(slot)?;
        *entry = if tuple.is_empty() { None } else { Some(tuple.to_vec()) };
        Ok(())
    }

    /// Empties `slot`.
    pub fn clear(&mut self, slot: u16) -> StorageResult<()> {
        *self.slot_mut(slot)? = None;
        Ok(())
    }

    /// One past the highest occupied slot.
    pub fn slot_count(&self) -> usize {
        self.slots.iter().rposition(Option::is_some).map_or(0, |i| i + 1)
    }

    /// Number of occupied slots.
    pub fn live_tuples(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn slot_mut(&mut self, slot: u16) -> StorageResult<&mut Option<Vec<u8>>> {
        let slots = self.slots.len();
        self.slots
            .get_mut(slot as usize)
            .ok_or(StorageError::SlotOutOfRange { slot, slots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(SLOTS_PER_BLOCK, 63);
        assert_eq!(MAX_TUPLE_LEN, 126);
    }

    #[test]
    fn test_encode_decode_preserves_slots_and_lsn() {
        let mut block = HeapBlock::new();
        block.put_tuple(0, b"first").unwrap();
        block.put_tuple(5, b"sixth").unwrap();
        block.set_lsn(Lsn(0x180));

        let image = block.encode();
        assert_eq!(image.len(), PAGE_SIZE);
        let back = HeapBlock::decode(BlockRef::new(1, 0), &image).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.slot_count(), 6);
        assert_eq!(back.live_tuples(), 2);
        assert_eq!(back.tuple(5), Some(&b"sixth"[..]));
        assert_eq!(back.tuple(1), None);
    }

    #[test]
    fn test_slot_bounds() {
        let mut block = HeapBlock::new();
        let err = block.put_tuple(SLOTS_PER_BLOCK as u16, b"x").unwrap_err();
        assert!(matches!(err, StorageError::SlotOutOfRange { .. }));
        assert!(block.clear(200).is_err());
    }

    #[test]
    fn test_tuple_too_large() {
        let mut block = HeapBlock::new();
        let err = block.put_tuple(0, &[1u8; MAX_TUPLE_LEN + 1]).unwrap_err();
        assert!(matches!(err, StorageError::TupleTooLarge { len: 127, max: 126 }));
    }

    #[test]
    fn test_decode_rejects_bad_slot_count() {
        let mut image = vec![0u8; PAGE_SIZE];
        image[8..10].copy_from_slice(&500u16.to_le_bytes());
        let err = HeapBlock::decode(BlockRef::new(2, 3), &image).unwrap_err();
        assert!(err.to_string().contains("2/3"));
    }

    #[test]
    fn test_decode_rejects_short_image() {
        assert!(HeapBlock::decode(BlockRef::new(1, 0), &[0u8; 100]).is_err());
    }
}
