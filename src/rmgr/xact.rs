//! Transaction records

use crate::wal::{DecodedRecord, INFO_MASK};

use super::errors::RedoResult;
use super::RedoOutcome;

pub const XLOG_XACT_COMMIT: u8 = 0x00;
pub const XLOG_XACT_ABORT: u8 = 0x20;

pub fn identify(info: u8) -> &'static str {
    match info & !INFO_MASK {
        XLOG_XACT_COMMIT => "COMMIT",
        XLOG_XACT_ABORT => "ABORT",
        _ => "UNKNOWN",
    }
}

/// Commit status is not tracked by relation storage.
pub fn redo(_record: &DecodedRecord) -> RedoResult<RedoOutcome> {
    Ok(RedoOutcome::NoOp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify() {
        assert_eq!(identify(XLOG_XACT_COMMIT), "COMMIT");
        assert_eq!(identify(XLOG_XACT_ABORT), "ABORT");
        assert_eq!(identify(0x10), "UNKNOWN");
    }
}
