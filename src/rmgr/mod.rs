//! Resource manager dispatch table
//!
//! A closed set of resource managers, each owning one category of log
//! record. The table answers three questions about a record: its
//! human-readable kind, whether it belongs to the data-modifying class
//! that replay applies, and how to apply it.
//!
//! An id that is not in the table is never guessed at: callers must
//! [`RmgrId::lookup`] before interpreting anything else in the record.

pub mod heap;
pub mod smgr;
pub mod xact;
pub mod xlog;

mod errors;

pub use errors::{RedoError, RedoResult};

use std::fmt;

use crate::storage::RelationStore;
use crate::wal::DecodedRecord;

/// What a redo call did to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedoOutcome {
    /// At least one block or file was changed
    Applied,
    /// Every affected block already reflected the record
    AlreadyApplied,
    /// The record has no storage effect
    NoOp,
}

/// Known resource managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RmgrId {
    Xlog = 0,
    Transaction = 1,
    Storage = 2,
    Heap = 10,
}

impl RmgrId {
    /// Every entry of the table, in id order.
    pub const ALL: [RmgrId; 4] = [RmgrId::Xlog, RmgrId::Transaction, RmgrId::Storage, RmgrId::Heap];

    /// Looks up a resource manager by its on-disk id.
    pub fn lookup(id: u8) -> Option<Self> {
        match id {
            0 => Some(RmgrId::Xlog),
            1 => Some(RmgrId::Transaction),
            2 => Some(RmgrId::Storage),
            10 => Some(RmgrId::Heap),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            RmgrId::Xlog => "XLOG",
            RmgrId::Transaction => "Transaction",
            RmgrId::Storage => "Storage",
            RmgrId::Heap => "Heap",
        }
    }

    /// Sub-type name for `info`, or `"UNKNOWN"`.
    pub fn identify(self, info: u8) -> &'static str {
        match self {
            RmgrId::Xlog => xlog::identify(info),
            RmgrId::Transaction => xact::identify(info),
            RmgrId::Storage => smgr::identify(info),
            RmgrId::Heap => heap::identify(info),
        }
    }

    /// Qualified kind for log fields and error messages, e.g. `Heap/INSERT`.
    pub fn record_kind(self, info: u8) -> String {
        format!("{}/{}", self.name(), self.identify(info))
    }

    /// Whether records with `info` are in the data-modifying class.
    pub fn is_dml(self, info: u8) -> bool {
        match self {
            RmgrId::Heap => heap::is_dml(info),
            RmgrId::Xlog | RmgrId::Transaction | RmgrId::Storage => false,
        }
    }

    /// Applies `record` to `store`.
    pub fn redo(self, record: &DecodedRecord, store: &RelationStore) -> RedoResult<RedoOutcome> {
        match self {
            RmgrId::Xlog => xlog::redo(record),
            RmgrId::Transaction => xact::redo(record),
            RmgrId::Storage => smgr::redo(record, store),
            RmgrId::Heap => heap::redo(record, store),
        }
    }
}

impl fmt::Display for RmgrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
