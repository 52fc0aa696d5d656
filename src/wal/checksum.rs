//! CRC32 checksums for log records
//!
//! The checksum covers the record body followed by the header bytes that
//! precede the checksum field, so the body and the header are both
//! protected. Any mismatch is treated as the end of valid log.
//!
//! Uses CRC32 (IEEE polynomial) for checksums.

use crc32fast::Hasher;

/// Computes the record checksum over `body` then `header_prefix`.
///
/// `header_prefix` is the serialized record header up to (not including)
/// the checksum field.
pub fn compute_record_checksum(header_prefix: &[u8], body: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(body);
    hasher.update(header_prefix);
    hasher.finalize()
}

/// Verifies a record checksum.
pub fn verify_record_checksum(header_prefix: &[u8], body: &[u8], expected: u32) -> bool {
    compute_record_checksum(header_prefix, body) == expected
}
