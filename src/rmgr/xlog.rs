//! Log-layer records
//!
//! Checkpoint, switch and no-op markers. None of them touch relation
//! storage, so redo only reports that nothing was done.

use crate::wal::{DecodedRecord, INFO_MASK};

use super::errors::RedoResult;
use super::RedoOutcome;

pub const XLOG_CHECKPOINT_SHUTDOWN: u8 = 0x00;
pub const XLOG_CHECKPOINT_ONLINE: u8 = 0x10;
pub const XLOG_NOOP: u8 = 0x20;
pub const XLOG_NEXTXID: u8 = 0x30;
pub const XLOG_SWITCH: u8 = 0x40;

pub fn identify(info: u8) -> &'static str {
    match info & !INFO_MASK {
        XLOG_CHECKPOINT_SHUTDOWN => "CHECKPOINT_SHUTDOWN",
        XLOG_CHECKPOINT_ONLINE => "CHECKPOINT_ONLINE",
        XLOG_NOOP => "NOOP",
        XLOG_NEXTXID => "NEXTXID",
        XLOG_SWITCH => "SWITCH",
        _ => "UNKNOWN",
    }
}

pub fn redo(_record: &DecodedRecord) -> RedoResult<RedoOutcome> {
    Ok(RedoOutcome::NoOp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify() {
        assert_eq!(identify(XLOG_CHECKPOINT_ONLINE), "CHECKPOINT_ONLINE");
        assert_eq!(identify(XLOG_SWITCH | 0x0F), "SWITCH");
        assert_eq!(identify(0x90), "UNKNOWN");
    }
}
