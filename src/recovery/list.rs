//! Diagnostic record listing
//!
//! A dry pass over the log: every decodable record is reported with the
//! segment it was read from, its kind and its position. Nothing is
//! filtered, nothing is applied, and the control file is never written.

use std::io::Write;

use serde::Serialize;

use crate::wal::{Lsn, ReadOutcome};

use super::errors::{RecoveryError, RecoveryResult};
use super::replay::{log_stop, lookup_rmgr, LogRead, StopReason};

/// One reported record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedRecord {
    /// Segment file name
    pub segment: String,
    /// Identify-name of the record, e.g. `INSERT`
    pub record_kind: String,
    /// Start position
    pub position: Lsn,
}

/// Destination of listed records
pub trait RecordSink {
    fn emit(&mut self, record: ListedRecord) -> RecoveryResult<()>;
}

impl RecordSink for Vec<ListedRecord> {
    fn emit(&mut self, record: ListedRecord) -> RecoveryResult<()> {
        self.push(record);
        Ok(())
    }
}

/// Writes each record as one JSON line.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn emit(&mut self, record: ListedRecord) -> RecoveryResult<()> {
        serde_json::to_writer(&mut self.out, &record)
            .map_err(|e| RecoveryError::output_failed(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        writeln!(self.out).map_err(RecoveryError::output_failed)?;
        self.out.flush().map_err(RecoveryError::output_failed)
    }
}

/// Outcome of a listing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub segment: String,
    pub records: u64,
    pub stop: StopReason,
    pub pages_read: u64,
}

/// Streams every record in `log` to `sink`, in log order.
pub fn list_records<L, S>(log: &mut L, sink: &mut S) -> RecoveryResult<ListSummary>
where
    L: LogRead + ?Sized,
    S: RecordSink + ?Sized,
{
    let segment = log.segment_name().to_string();
    let mut records = 0u64;

    let stop = loop {
        let record = match log.read_record()? {
            ReadOutcome::Record(record) => record,
            ReadOutcome::EndOfLog => break StopReason::EndOfLog,
            ReadOutcome::DecodeError(msg) => break StopReason::DecodeError(msg),
        };

        let rmgr = lookup_rmgr(&record)?;
        sink.emit(ListedRecord {
            segment: segment.clone(),
            record_kind: rmgr.identify(record.info()).to_string(),
            position: record.start(),
        })?;
        records += 1;
    };

    log_stop(&stop, &segment);
    Ok(ListSummary {
        segment,
        records,
        stop,
        pages_read: log.pages_read(),
    })
}
