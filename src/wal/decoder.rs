//! Record decoding
//!
//! Reassembles records from the page stream. A record whose bytes reach
//! the end of a page continues after the next page's header, which must
//! announce the continuation and the number of bytes still missing.
//!
//! Every call yields exactly one of three outcomes. `EndOfLog` and
//! `DecodeError` both end the stream; only an `Err` is fatal. Once a
//! terminal outcome is produced it is repeated on every later call.

use super::errors::{WalErrorCode, WalResult};
use super::lsn::Lsn;
use super::page::{Page, PageRead, PageReader, SHORT_HEADER_SIZE};
use super::record::{DecodedRecord, RecordHeader, RECORD_ALIGN, RECORD_HEADER_SIZE};
use super::segment::{page_address, PAGE_SIZE};

/// Default upper bound on a single record (1 GiB).
pub const DEFAULT_MAX_RECORD_SIZE: u64 = 1024 * 1024 * 1024;

/// Result of one decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete, verified record
    Record(DecodedRecord),
    /// The reader ran past the last written record
    EndOfLog,
    /// A short or garbled record was found before the expected end of log
    DecodeError(String),
}

impl ReadOutcome {
    /// Whether this outcome ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReadOutcome::Record(_))
    }
}

enum Fetched {
    Ready,
    Unwritten,
    Truncated,
}

/// Sequential record decoder over one segment.
pub struct RecordDecoder {
    reader: PageReader,
    next: Lsn,
    prev: Option<Lsn>,
    max_record_size: u64,
    page: Option<Page>,
    terminal: Option<ReadOutcome>,
    records_decoded: u64,
}

impl RecordDecoder {
    /// Starts decoding at `start`, which must be a record boundary.
    pub fn begin(reader: PageReader, start: Lsn, max_record_size: u64) -> Self {
        Self {
            reader,
            next: start,
            prev: None,
            max_record_size,
            page: None,
            terminal: None,
            records_decoded: 0,
        }
    }

    /// Decodes the next record.
    pub fn read_record(&mut self) -> WalResult<ReadOutcome> {
        if let Some(terminal) = &self.terminal {
            return Ok(terminal.clone());
        }

        let outcome = self.decode_next()?;
        match &outcome {
            ReadOutcome::Record(record) => {
                self.prev = Some(record.start());
                self.next = record.end().align_up(RECORD_ALIGN);
                self.records_decoded += 1;
            }
            terminal => self.terminal = Some(terminal.clone()),
        }
        Ok(outcome)
    }

    /// Position the next record is expected at.
    pub fn next_position(&self) -> Lsn {
        self.next
    }

    /// Name of the segment being decoded.
    pub fn segment_name(&self) -> &str {
        self.reader.segment().name()
    }

    /// Page reads issued against the segment.
    pub fn pages_read(&self) -> u64 {
        self.reader.segment().pages_read()
    }

    /// Records successfully decoded so far.
    pub fn records_decoded(&self) -> u64 {
        self.records_decoded
    }

    fn fetch(&mut self, address: Lsn) -> WalResult<Fetched> {
        if self.page.as_ref().is_some_and(|p| p.address() == address) {
            return Ok(Fetched::Ready);
        }
        self.page = None;
        match self.reader.read_page(address, SHORT_HEADER_SIZE) {
            Ok(PageRead::Valid(page)) => {
                self.page = Some(page);
                Ok(Fetched::Ready)
            }
            Ok(PageRead::Unwritten) => Ok(Fetched::Unwritten),
            Err(e) if e.code() == WalErrorCode::TruncatedRead => Ok(Fetched::Truncated),
            Err(e) => Err(e),
        }
    }

    fn decode_next(&mut self) -> WalResult<ReadOutcome> {
        let page_size = PAGE_SIZE as u64;
        let mut pos = self.next;

        // A header never straddles pages; the writer pads to the next page.
        if page_size - pos.0 % page_size < RECORD_HEADER_SIZE as u64 {
            pos = page_address(pos).advance(page_size);
        }
        if !self.reader.segment().contains(pos) {
            return Ok(ReadOutcome::EndOfLog);
        }

        let first_page = page_address(pos);
        match self.fetch(first_page)? {
            Fetched::Ready => {}
            Fetched::Unwritten | Fetched::Truncated => return Ok(ReadOutcome::EndOfLog),
        }
        let Some(page) = self.page.as_ref() else {
            return Ok(ReadOutcome::EndOfLog);
        };

        if pos == first_page {
            if page.header().is_contrecord() {
                return Ok(ReadOutcome::DecodeError(format!(
                    "record start {} points into a continued record",
                    pos
                )));
            }
            pos = pos.advance(page.header().size() as u64);
        }

        let in_page = (pos.0 - first_page.0) as usize;
        if page.len() <= in_page {
            return Ok(ReadOutcome::EndOfLog);
        }
        if page.len() < in_page + RECORD_HEADER_SIZE {
            return Ok(ReadOutcome::DecodeError(format!(
                "record header at {} is truncated",
                pos
            )));
        }

        let header_bytes = &page.bytes()[in_page..in_page + RECORD_HEADER_SIZE];
        if header_bytes.iter().all(|b| *b == 0) {
            return Ok(ReadOutcome::EndOfLog);
        }
        let Some(header) = RecordHeader::parse(header_bytes) else {
            return Ok(ReadOutcome::DecodeError(format!("record header at {} is truncated", pos)));
        };

        if header.total_length == 0 {
            return Ok(ReadOutcome::EndOfLog);
        }
        if (header.total_length as usize) < RECORD_HEADER_SIZE {
            return Ok(ReadOutcome::DecodeError(format!(
                "invalid record length at {}: wanted {}, got {}",
                pos, RECORD_HEADER_SIZE, header.total_length
            )));
        }
        if header.total_length as u64 > self.max_record_size {
            return Ok(ReadOutcome::DecodeError(format!(
                "record length {} at {} too long",
                header.total_length, pos
            )));
        }
        match self.prev {
            Some(prev) if header.prev != prev => {
                return Ok(ReadOutcome::DecodeError(format!(
                    "record with incorrect prev-link {} at {}",
                    header.prev, pos
                )));
            }
            None if header.prev >= pos => {
                return Ok(ReadOutcome::DecodeError(format!(
                    "record with incorrect prev-link {} at {}",
                    header.prev, pos
                )));
            }
            _ => {}
        }

        let total = header.total_length as usize;
        let mut buf = Vec::with_capacity(total);
        let chunk = total.min(PAGE_SIZE - in_page);
        if page.len() < in_page + chunk {
            return Ok(ReadOutcome::DecodeError(format!(
                "record at {} is truncated within page {}",
                pos, first_page
            )));
        }
        buf.extend_from_slice(&page.bytes()[in_page..in_page + chunk]);
        let mut end = pos.advance(chunk as u64);
        let mut current = first_page;

        while buf.len() < total {
            let missing = total - buf.len();
            current = current.advance(page_size);
            if !self.reader.segment().contains(current) {
                return Ok(ReadOutcome::DecodeError(format!(
                    "record at {} continues past the end of segment {}",
                    pos,
                    self.reader.segment().name()
                )));
            }
            match self.fetch(current)? {
                Fetched::Ready => {}
                Fetched::Unwritten | Fetched::Truncated => {
                    return Ok(ReadOutcome::DecodeError(format!(
                        "missing contrecord at {} for record at {}",
                        current, pos
                    )));
                }
            }
            let Some(page) = self.page.as_ref() else {
                return Ok(ReadOutcome::DecodeError(format!("missing contrecord at {}", current)));
            };

            let header = page.header();
            if !header.is_contrecord() {
                return Ok(ReadOutcome::DecodeError(format!(
                    "there is no contrecord flag at {}",
                    current
                )));
            }
            if header.remaining_length as usize != missing {
                return Ok(ReadOutcome::DecodeError(format!(
                    "invalid contrecord length {} (expected {}) at {}",
                    header.remaining_length, missing, current
                )));
            }

            let offset = header.size();
            let chunk = missing.min(PAGE_SIZE - offset);
            if page.len() < offset + chunk {
                return Ok(ReadOutcome::DecodeError(format!(
                    "record at {} is truncated within page {}",
                    pos, current
                )));
            }
            buf.extend_from_slice(&page.bytes()[offset..offset + chunk]);
            end = current.advance((offset + chunk) as u64);
        }

        Ok(match DecodedRecord::from_bytes(pos, end, &buf) {
            Ok(record) => ReadOutcome::Record(record),
            Err(reason) => ReadOutcome::DecodeError(reason),
        })
    }
}
