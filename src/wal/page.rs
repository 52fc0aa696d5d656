//! Page reading and header validation
//!
//! Every page starts with a header naming the log position it claims to
//! hold. The first page of a segment carries a long header that also
//! records the segment geometry and the system identifier. A header must
//! validate before anything on the page is trusted; a failure is a hard
//! stop, never a retry.

use super::errors::{WalError, WalResult};
use super::lsn::Lsn;
use super::segment::{SegmentFile, PAGE_SIZE};

/// Magic number in every page header.
pub const PAGE_MAGIC: u16 = 0xD116;

/// Size of a short page header.
pub const SHORT_HEADER_SIZE: usize = 24;

/// Size of a long page header (first page of a segment).
pub const LONG_HEADER_SIZE: usize = 40;

/// The page begins with the continuation of a record from the previous page.
pub const FIRST_IS_CONTRECORD: u16 = 0x0001;
/// The header is a long header.
pub const LONG_HEADER: u16 = 0x0002;
/// Backup blocks on this page may be removed; accepted and ignored.
pub const BKP_REMOVABLE: u16 = 0x0004;

const ALL_FLAGS: u16 = FIRST_IS_CONTRECORD | LONG_HEADER | BKP_REMOVABLE;

/// Extra fields carried by a long header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongHeaderFields {
    pub system_id: u64,
    pub segment_size: u32,
    pub page_size: u32,
}

/// Raw page header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub magic: u16,
    pub info: u16,
    pub timeline: u32,
    pub page_address: Lsn,
    /// Bytes of a record continuing from the previous page.
    pub remaining_length: u32,
    pub long: Option<LongHeaderFields>,
}

impl PageHeader {
    /// Parses a header from the start of `bytes`.
    ///
    /// Returns `None` when fewer bytes than the header needs are present.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SHORT_HEADER_SIZE {
            return None;
        }
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let info = u16::from_le_bytes([bytes[2], bytes[3]]);
        let timeline = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let page_address = Lsn(u64::from_le_bytes(bytes[8..16].try_into().ok()?));
        let remaining_length = u32::from_le_bytes(bytes[16..20].try_into().ok()?);

        let long = if info & LONG_HEADER != 0 {
            if bytes.len() < LONG_HEADER_SIZE {
                return None;
            }
            Some(LongHeaderFields {
                system_id: u64::from_le_bytes(bytes[24..32].try_into().ok()?),
                segment_size: u32::from_le_bytes(bytes[32..36].try_into().ok()?),
                page_size: u32::from_le_bytes(bytes[36..40].try_into().ok()?),
            })
        } else {
            None
        };

        Some(Self {
            magic,
            info,
            timeline,
            page_address,
            remaining_length,
            long,
        })
    }

    /// Writes the header into the start of `out`.
    pub fn encode(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.magic.to_le_bytes());
        out[2..4].copy_from_slice(&self.info.to_le_bytes());
        out[4..8].copy_from_slice(&self.timeline.to_le_bytes());
        out[8..16].copy_from_slice(&self.page_address.0.to_le_bytes());
        out[16..20].copy_from_slice(&self.remaining_length.to_le_bytes());
        out[20..24].fill(0);
        if let Some(long) = self.long {
            out[24..32].copy_from_slice(&long.system_id.to_le_bytes());
            out[32..36].copy_from_slice(&long.segment_size.to_le_bytes());
            out[36..40].copy_from_slice(&long.page_size.to_le_bytes());
        }
    }

    /// Size of this header on the page.
    pub fn size(&self) -> usize {
        if self.info & LONG_HEADER != 0 {
            LONG_HEADER_SIZE
        } else {
            SHORT_HEADER_SIZE
        }
    }

    /// Whether the page begins with a continued record.
    pub fn is_contrecord(&self) -> bool {
        self.info & FIRST_IS_CONTRECORD != 0
    }
}

/// What a page header is checked against.
#[derive(Debug, Clone, Copy)]
pub struct PageExpectation {
    pub page_address: Lsn,
    pub timeline: u32,
    pub first_in_segment: bool,
    pub segment_size: u64,
    pub system_id: u64,
}

impl PageExpectation {
    /// Returns the reason the header fails validation, if it does.
    pub fn check(&self, header: &PageHeader) -> Result<(), String> {
        if header.magic != PAGE_MAGIC {
            return Err(format!("invalid magic number {:#06x}", header.magic));
        }
        if header.info & !ALL_FLAGS != 0 {
            return Err(format!("invalid info bits {:#06x}", header.info));
        }
        if header.page_address != self.page_address {
            return Err(format!(
                "unexpected pageaddr {} (expected {})",
                header.page_address, self.page_address
            ));
        }
        if header.timeline != self.timeline {
            return Err(format!(
                "unexpected timeline {} (expected {})",
                header.timeline, self.timeline
            ));
        }
        match (self.first_in_segment, header.long) {
            (true, None) => Err("first page of segment lacks a long header".to_string()),
            (false, Some(_)) => Err("long header on a page that does not start a segment".to_string()),
            (false, None) => Ok(()),
            (true, Some(long)) => {
                if long.system_id != self.system_id {
                    return Err(format!(
                        "system identifier {} does not match control file ({})",
                        long.system_id, self.system_id
                    ));
                }
                if long.segment_size as u64 != self.segment_size {
                    return Err(format!("segment size {} is not {}", long.segment_size, self.segment_size));
                }
                if long.page_size as usize != PAGE_SIZE {
                    return Err(format!("page size {} is not {}", long.page_size, PAGE_SIZE));
                }
                Ok(())
            }
        }
    }
}

/// A validated page.
#[derive(Debug, Clone)]
pub struct Page {
    address: Lsn,
    segno: u64,
    segment_offset: u64,
    header: PageHeader,
    data: Vec<u8>,
}

impl Page {
    /// Log position of the first byte of the page.
    pub fn address(&self) -> Lsn {
        self.address
    }

    /// Segment the page came from.
    pub fn segno(&self) -> u64 {
        self.segno
    }

    /// Offset of the page inside its segment.
    pub fn segment_offset(&self) -> u64 {
        self.segment_offset
    }

    /// The validated header.
    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    /// Bytes read from the page (may be shorter than a full page).
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes read.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes were read.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of a page read.
#[derive(Debug, Clone)]
pub enum PageRead {
    /// A page whose header validated
    Valid(Page),
    /// Never-written log space (the header area is all zeroes)
    Unwritten,
}

/// Reads pages from the located segment.
pub struct PageReader {
    segment: SegmentFile,
    system_id: u64,
}

impl PageReader {
    /// Creates a reader over `segment`, validating long headers against
    /// `system_id`.
    pub fn new(segment: SegmentFile, system_id: u64) -> Self {
        Self { segment, system_id }
    }

    /// The segment being read.
    pub fn segment(&self) -> &SegmentFile {
        &self.segment
    }

    /// Reads the page at `page_address`.
    ///
    /// `required_len` is the number of bytes from the start of the page
    /// the caller needs; fewer available bytes is a
    /// `WALREC_WAL_TRUNCATED_READ` error.
    pub fn read_page(&mut self, page_address: Lsn, required_len: usize) -> WalResult<PageRead> {
        let geometry = self.segment.geometry();
        let offset = geometry.segment_offset(page_address);

        let mut buf = vec![0u8; PAGE_SIZE];
        let read_len = self.segment.read_at(offset, &mut buf)?;
        if read_len > PAGE_SIZE {
            return Err(WalError::corrupted_page(
                self.segment.path(),
                page_address,
                read_len,
                PAGE_SIZE,
            ));
        }
        if read_len < required_len.max(SHORT_HEADER_SIZE) {
            return Err(WalError::truncated_read(page_address, read_len, required_len));
        }
        buf.truncate(read_len);

        if buf[..SHORT_HEADER_SIZE].iter().all(|b| *b == 0) {
            return Ok(PageRead::Unwritten);
        }

        let header = PageHeader::parse(&buf)
            .ok_or_else(|| WalError::truncated_read(page_address, read_len, LONG_HEADER_SIZE))?;

        let expectation = PageExpectation {
            page_address,
            timeline: self.segment.timeline(),
            first_in_segment: offset == 0,
            segment_size: geometry.segment_size(),
            system_id: self.system_id,
        };
        expectation
            .check(&header)
            .map_err(|reason| WalError::invalid_page_header(reason, offset, page_address, &header))?;

        Ok(PageRead::Valid(Page {
            address: page_address,
            segno: self.segment.segno(),
            segment_offset: offset,
            header,
            data: buf,
        }))
    }
}
