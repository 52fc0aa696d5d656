//! Segment location
//!
//! Maps a log position to the segment that holds it and to the byte
//! offset inside that segment, and owns the open file for the duration of
//! one replay or listing pass. The file is closed when the `SegmentFile`
//! is dropped, on every exit path.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::observability::{log_event_with_fields, Event};

use super::errors::{WalError, WalResult};
use super::lsn::Lsn;

/// Size of a log page in bytes.
pub const PAGE_SIZE: usize = 8192;

/// Default segment size (16 MiB).
pub const DEFAULT_SEGMENT_SIZE: u64 = 16 * 1024 * 1024;

const MIN_SEGMENT_SIZE: u64 = 1024 * 1024;
const MAX_SEGMENT_SIZE: u64 = 1024 * 1024 * 1024;

/// Start of the page containing `lsn`.
pub fn page_address(lsn: Lsn) -> Lsn {
    Lsn(lsn.0 - lsn.0 % PAGE_SIZE as u64)
}

/// Segment size and the arithmetic derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentGeometry {
    segment_size: u64,
}

impl SegmentGeometry {
    /// Returns `None` unless `segment_size` is a power of two between
    /// 1 MiB and 1 GiB.
    pub fn new(segment_size: u64) -> Option<Self> {
        let valid = segment_size.is_power_of_two()
            && (MIN_SEGMENT_SIZE..=MAX_SEGMENT_SIZE).contains(&segment_size)
            && segment_size % PAGE_SIZE as u64 == 0;
        valid.then_some(Self { segment_size })
    }

    /// Segment size in bytes.
    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    /// Sequence number of the segment holding `lsn`.
    pub fn segment_number(&self, lsn: Lsn) -> u64 {
        lsn.0 / self.segment_size
    }

    /// Byte offset of `lsn` inside its segment.
    pub fn segment_offset(&self, lsn: Lsn) -> u64 {
        lsn.0 % self.segment_size
    }

    /// First position of segment `segno`.
    pub fn segment_start(&self, segno: u64) -> Lsn {
        Lsn(segno * self.segment_size)
    }

    /// Number of segments per 4 GiB of log.
    pub fn segments_per_id(&self) -> u64 {
        0x1_0000_0000 / self.segment_size
    }

    /// File name of segment `segno` on `timeline`: 24 uppercase hex digits.
    pub fn file_name(&self, timeline: u32, segno: u64) -> String {
        let per_id = self.segments_per_id();
        format!(
            "{:08X}{:08X}{:08X}",
            timeline,
            segno / per_id,
            segno % per_id
        )
    }
}

impl Default for SegmentGeometry {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

/// An open, read-only log segment.
pub struct SegmentFile {
    path: PathBuf,
    name: String,
    segno: u64,
    timeline: u32,
    geometry: SegmentGeometry,
    file: File,
    pages_read: u64,
}

impl SegmentFile {
    /// Opens the segment holding `start` inside `dir`.
    ///
    /// There is no fallback segment: a missing or unreadable file is a
    /// `WALREC_WAL_SEGMENT_OPEN_FAILED` error.
    pub fn open(dir: &Path, geometry: SegmentGeometry, timeline: u32, start: Lsn) -> WalResult<Self> {
        let segno = geometry.segment_number(start);
        let name = geometry.file_name(timeline, segno);
        let path = dir.join(&name);

        let file = File::open(&path).map_err(|e| WalError::segment_open_failed(&path, e))?;

        log_event_with_fields(
            Event::SegmentOpened,
            &[("path", &path.display().to_string()), ("segno", &segno.to_string())],
        );

        Ok(Self {
            path,
            name,
            segno,
            timeline,
            geometry,
            file,
            pages_read: 0,
        })
    }

    /// Path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name of the segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sequence number of the segment.
    pub fn segno(&self) -> u64 {
        self.segno
    }

    /// Timeline the segment belongs to.
    pub fn timeline(&self) -> u32 {
        self.timeline
    }

    /// Geometry used to locate the segment.
    pub fn geometry(&self) -> SegmentGeometry {
        self.geometry
    }

    /// Whether `lsn` falls inside this segment.
    pub fn contains(&self, lsn: Lsn) -> bool {
        self.geometry.segment_number(lsn) == self.segno
    }

    /// Number of page reads issued so far.
    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }

    /// Seeks to `offset` and reads until `buf` is full or the file ends.
    ///
    /// Returns the number of bytes read.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> WalResult<usize> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| WalError::read_failed(&self.path, offset, e))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(WalError::read_failed(&self.path, offset, e)),
            }
        }

        self.pages_read += 1;
        Ok(filled)
    }
}

impl Drop for SegmentFile {
    fn drop(&mut self) {
        log_event_with_fields(
            Event::SegmentClosed,
            &[("path", &self.path.display().to_string()), ("pages_read", &self.pages_read.to_string())],
        );
    }
}
