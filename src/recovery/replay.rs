//! WAL replay loop
//!
//! Pulls records from the log in order, filters them to the
//! data-modifying class, and hands each one to its resource manager's
//! redo routine.
//!
//! - The resource manager id is checked before anything else in the
//!   record is interpreted; an unknown id stops replay
//! - Records outside the DML class are passed over without error
//! - A redo failure stops replay; a failed record is never skipped
//! - End of log and decode errors end the loop normally
//!
//! Replay is strictly sequential. Redo order is log order.

use std::fmt;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::rmgr::{RedoOutcome, RmgrId};
use crate::wal::{DecodedRecord, Lsn, ReadOutcome};

use super::errors::{RecoveryError, RecoveryResult};

/// Source of decoded records
pub trait LogRead {
    /// Decode the next record.
    ///
    /// `EndOfLog` and `DecodeError` end the stream; `Err` is fatal.
    fn read_record(&mut self) -> RecoveryResult<ReadOutcome>;

    /// Name of the segment being read
    fn segment_name(&self) -> &str;

    /// Page reads issued so far
    fn pages_read(&self) -> u64;
}

/// Applies records to storage
pub trait RedoTarget {
    /// Apply `record`, which belongs to `rmgr`
    fn redo(&mut self, rmgr: RmgrId, record: &DecodedRecord) -> RecoveryResult<RedoOutcome>;
}

/// Why the record loop ended
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The reader ran past the last written record
    #[default]
    EndOfLog,
    /// A short or garbled record ended the log
    DecodeError(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfLog => write!(f, "end of log"),
            StopReason::DecodeError(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

/// The last record whose redo was invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastApplied {
    pub position: Lsn,
    pub record_kind: String,
}

/// In-memory replay progress, consumed by the finalizer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayProgress {
    /// Last record handed to redo
    pub last_applied: Option<LastApplied>,
    /// Records handed to redo
    pub records_applied: u64,
    /// Of those, records every block already reflected
    pub records_already_applied: u64,
    /// Records outside the DML class
    pub records_skipped: u64,
    /// Highest transaction id among applied records
    pub xid_high_water: u32,
    /// Why the loop ended
    pub stop: StopReason,
    /// Page reads issued by the decoder
    pub pages_read: u64,
}

impl ReplayProgress {
    /// Whether at least one record was applied
    pub fn applied(&self) -> bool {
        self.last_applied.is_some()
    }
}

/// WAL replayer that processes records sequentially
pub struct WalReplayer;

impl WalReplayer {
    /// Replay every DML record from `log` into `target`.
    ///
    /// Stops normally at end of log or at the first decode error, and
    /// returns what was applied up to there.
    pub fn replay<L, T>(log: &mut L, target: &mut T) -> RecoveryResult<ReplayProgress>
    where
        L: LogRead + ?Sized,
        T: RedoTarget + ?Sized,
    {
        let mut progress = ReplayProgress::default();

        loop {
            let record = match log.read_record()? {
                ReadOutcome::Record(record) => record,
                ReadOutcome::EndOfLog => {
                    progress.stop = StopReason::EndOfLog;
                    break;
                }
                ReadOutcome::DecodeError(msg) => {
                    progress.stop = StopReason::DecodeError(msg);
                    break;
                }
            };

            // The class of a record is only known through its manager, so
            // unknown ids stop replay even when they would be skipped.
            let rmgr = lookup_rmgr(&record)?;

            if !rmgr.is_dml(record.info()) {
                progress.records_skipped += 1;
                trace_record(Event::RecordSkipped, rmgr, &record);
                continue;
            }

            progress.xid_high_water = progress.xid_high_water.max(record.xid());

            let outcome = target.redo(rmgr, &record)?;
            if outcome == RedoOutcome::AlreadyApplied {
                progress.records_already_applied += 1;
            }
            progress.records_applied += 1;
            progress.last_applied = Some(LastApplied {
                position: record.start(),
                record_kind: rmgr.identify(record.info()).to_string(),
            });
            trace_record(Event::RecordApplied, rmgr, &record);
        }

        progress.pages_read = log.pages_read();
        log_stop(&progress.stop, log.segment_name());
        Ok(progress)
    }
}

/// Resolves the record's resource manager, refusing unknown ids.
pub(crate) fn lookup_rmgr(record: &DecodedRecord) -> RecoveryResult<RmgrId> {
    RmgrId::lookup(record.rmgr_id())
        .ok_or_else(|| RecoveryError::unknown_resource_manager(record.rmgr_id(), record.start()))
}

/// Whether replay would dispatch `record` to redo.
pub(crate) fn is_replayed(record: &DecodedRecord) -> bool {
    RmgrId::lookup(record.rmgr_id()).is_some_and(|rmgr| rmgr.is_dml(record.info()))
}

pub(crate) fn log_stop(stop: &StopReason, segment: &str) {
    match stop {
        StopReason::EndOfLog => log_event_with_fields(Event::ReplayEndOfLog, &[("segment", segment)]),
        StopReason::DecodeError(msg) => log_event_with_fields(
            Event::ReplayDecodeStopped,
            &[("reason", msg.as_str()), ("segment", segment)],
        ),
    }
}

fn trace_record(event: Event, rmgr: RmgrId, record: &DecodedRecord) {
    if !Logger::enabled(Severity::Trace) {
        return;
    }
    log_event_with_fields(
        event,
        &[
            ("position", &record.start().to_string()),
            ("record_kind", &rmgr.record_kind(record.info())),
            ("xid", &record.xid().to_string()),
        ],
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rmgr::{heap, xact, xlog};
    use crate::wal::{encode_record, BlockRef, RecordHeader, RECORD_HEADER_SIZE};
    use std::collections::VecDeque;

    /// Builds a decoded record at `start`.
    pub(crate) fn record_at(start: u64, rmgr_id: u8, info: u8, xid: u32) -> DecodedRecord {
        let bytes = encode_record(
            xid,
            Lsn::INVALID,
            info,
            rmgr_id,
            &[BlockRef::new(16384, 0)],
            &heap::HeapOp::Insert {
                slot: 0,
                tuple: b"row".to_vec(),
            }
            .encode(),
        )
        .unwrap();
        let header = RecordHeader::parse(&bytes[..RECORD_HEADER_SIZE]).unwrap();
        let end = Lsn(start + header.total_length as u64);
        DecodedRecord::from_bytes(Lsn(start), end, &bytes).unwrap()
    }

    pub(crate) struct MockLog {
        outcomes: VecDeque<RecoveryResult<ReadOutcome>>,
    }

    impl MockLog {
        pub(crate) fn new(records: Vec<DecodedRecord>, last: ReadOutcome) -> Self {
            let mut outcomes: VecDeque<_> = records.into_iter().map(|r| Ok(ReadOutcome::Record(r))).collect();
            outcomes.push_back(Ok(last));
            Self { outcomes }
        }

        pub(crate) fn failing_after(records: Vec<DecodedRecord>, err: RecoveryError) -> Self {
            let mut outcomes: VecDeque<_> = records.into_iter().map(|r| Ok(ReadOutcome::Record(r))).collect();
            outcomes.push_back(Err(err));
            Self { outcomes }
        }
    }

    impl LogRead for MockLog {
        fn read_record(&mut self) -> RecoveryResult<ReadOutcome> {
            self.outcomes.pop_front().unwrap_or(Ok(ReadOutcome::EndOfLog))
        }

        fn segment_name(&self) -> &str {
            "000000010000000000000000"
        }

        fn pages_read(&self) -> u64 {
            1
        }
    }

    #[derive(Default)]
    pub(crate) struct MockTarget {
        pub(crate) applied: Vec<Lsn>,
        pub(crate) fail_at: Option<Lsn>,
    }

    impl RedoTarget for MockTarget {
        fn redo(&mut self, rmgr: RmgrId, record: &DecodedRecord) -> RecoveryResult<RedoOutcome> {
            if self.fail_at == Some(record.start()) {
                return Err(RecoveryError::from(crate::rmgr::RedoError::UnsupportedSubtype {
                    position: record.start(),
                    kind: rmgr.record_kind(record.info()),
                }));
            }
            self.applied.push(record.start());
            Ok(RedoOutcome::Applied)
        }
    }

    #[test]
    fn test_applies_dml_records_in_order() {
        let mut log = MockLog::new(
            vec![
                record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 5),
                record_at(0x140, 10, heap::XLOG_HEAP_DELETE, 7),
                record_at(0x180, 10, heap::XLOG_HEAP_INSERT, 6),
            ],
            ReadOutcome::EndOfLog,
        );
        let mut target = MockTarget::default();

        let progress = WalReplayer::replay(&mut log, &mut target).unwrap();

        assert_eq!(target.applied, vec![Lsn(0x100), Lsn(0x140), Lsn(0x180)]);
        assert_eq!(progress.records_applied, 3);
        assert_eq!(progress.stop, StopReason::EndOfLog);
        assert_eq!(
            progress.last_applied,
            Some(LastApplied {
                position: Lsn(0x180),
                record_kind: "INSERT".into()
            })
        );
        assert_eq!(progress.pages_read, 1);
    }

    #[test]
    fn test_xid_high_water_is_maximum_of_applied() {
        let mut log = MockLog::new(
            vec![
                record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 9),
                record_at(0x140, 10, heap::XLOG_HEAP_INSERT, 3),
                // Skipped records do not move the high-water mark.
                record_at(0x180, 1, xact::XLOG_XACT_COMMIT, 500),
                record_at(0x1C0, 10, heap::XLOG_HEAP_INSERT, 12),
            ],
            ReadOutcome::EndOfLog,
        );
        let progress = WalReplayer::replay(&mut log, &mut MockTarget::default()).unwrap();
        assert_eq!(progress.xid_high_water, 12);
    }

    #[test]
    fn test_non_dml_records_are_skipped() {
        let mut log = MockLog::new(
            vec![
                record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 1),
                record_at(0x140, 0, xlog::XLOG_CHECKPOINT_ONLINE, 0),
                record_at(0x180, 10, heap::XLOG_HEAP_LOCK, 1),
            ],
            ReadOutcome::EndOfLog,
        );
        let mut target = MockTarget::default();
        let progress = WalReplayer::replay(&mut log, &mut target).unwrap();

        assert_eq!(target.applied, vec![Lsn(0x100)]);
        assert_eq!(progress.records_skipped, 2);
        // Redo position stays on the last dispatched record.
        assert_eq!(progress.last_applied.unwrap().position, Lsn(0x100));
    }

    #[test]
    fn test_decode_error_ends_replay_normally() {
        let mut log = MockLog::new(
            vec![record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 1)],
            ReadOutcome::DecodeError("record at 0/140 truncated".into()),
        );
        let progress = WalReplayer::replay(&mut log, &mut MockTarget::default()).unwrap();
        assert!(progress.applied());
        assert_eq!(
            progress.stop,
            StopReason::DecodeError("record at 0/140 truncated".into())
        );
    }

    #[test]
    fn test_unknown_rmgr_aborts() {
        let mut log = MockLog::new(
            vec![
                record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 1),
                record_at(0x140, 42, 0, 1),
                record_at(0x180, 10, heap::XLOG_HEAP_INSERT, 1),
            ],
            ReadOutcome::EndOfLog,
        );
        let mut target = MockTarget::default();
        let err = WalReplayer::replay(&mut log, &mut target).unwrap_err();

        assert_eq!(err.code().code(), "WALREC_UNKNOWN_RESOURCE_MANAGER");
        assert_eq!(err.position(), Some(Lsn(0x140)));
        assert_eq!(target.applied, vec![Lsn(0x100)]);
    }

    #[test]
    fn test_unknown_rmgr_aborts_before_class_filter() {
        // 0x30 is not a data-modifying sub-type for any known manager, yet
        // the id is resolved before the record is classified.
        let mut log = MockLog::new(
            vec![
                record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 1),
                record_at(0x140, 42, 0x30, 1),
                record_at(0x180, 10, heap::XLOG_HEAP_INSERT, 1),
            ],
            ReadOutcome::EndOfLog,
        );
        let mut target = MockTarget::default();
        let err = WalReplayer::replay(&mut log, &mut target).unwrap_err();

        assert_eq!(err.code().code(), "WALREC_UNKNOWN_RESOURCE_MANAGER");
        assert_eq!(err.position(), Some(Lsn(0x140)));
        assert_eq!(target.applied, vec![Lsn(0x100)]);
    }

    #[test]
    fn test_is_replayed_matches_dispatch() {
        assert!(is_replayed(&record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 1)));
        assert!(!is_replayed(&record_at(0x100, 10, heap::XLOG_HEAP_LOCK, 1)));
        assert!(!is_replayed(&record_at(0x100, 1, xact::XLOG_XACT_COMMIT, 1)));
        assert!(!is_replayed(&record_at(0x100, 42, heap::XLOG_HEAP_INSERT, 1)));
    }

    #[test]
    fn test_redo_failure_aborts() {
        let mut log = MockLog::new(
            vec![
                record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 1),
                record_at(0x140, 10, heap::XLOG_HEAP_INSERT, 1),
                record_at(0x180, 10, heap::XLOG_HEAP_INSERT, 1),
            ],
            ReadOutcome::EndOfLog,
        );
        let mut target = MockTarget {
            fail_at: Some(Lsn(0x140)),
            ..Default::default()
        };
        let err = WalReplayer::replay(&mut log, &mut target).unwrap_err();
        assert_eq!(err.code().code(), "WALREC_REDO_FAILED");
        assert_eq!(target.applied, vec![Lsn(0x100)]);
    }

    #[test]
    fn test_fatal_read_error_propagates() {
        let mut log = MockLog::failing_after(
            vec![record_at(0x100, 10, heap::XLOG_HEAP_INSERT, 1)],
            RecoveryError::read_ahead_failed(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
        );
        assert!(WalReplayer::replay(&mut log, &mut MockTarget::default()).is_err());
    }

    #[test]
    fn test_empty_log() {
        let mut log = MockLog::new(vec![], ReadOutcome::EndOfLog);
        let progress = WalReplayer::replay(&mut log, &mut MockTarget::default()).unwrap();
        assert!(!progress.applied());
        assert_eq!(progress.records_applied, 0);
    }
}
