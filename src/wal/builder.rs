//! Segment image builder
//!
//! Lays records out exactly as the decoder expects to find them: 8-byte
//! aligned starts, headers that never straddle a page, continuation pages
//! flagged with the bytes still missing, and a long header on the first
//! page. Used to produce fixtures; replay itself never writes log.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::lsn::Lsn;
use super::page::{
    LongHeaderFields, PageHeader, FIRST_IS_CONTRECORD, LONG_HEADER, PAGE_MAGIC,
};
use super::record::{encode_record, BlockRef, RECORD_ALIGN, RECORD_HEADER_SIZE};
use super::segment::{SegmentGeometry, PAGE_SIZE};

/// Builds the image of one segment in memory.
pub struct SegmentBuilder {
    geometry: SegmentGeometry,
    timeline: u32,
    system_id: u64,
    segno: u64,
    image: Vec<u8>,
    /// Next free byte, as an offset into the segment
    insert: u64,
    prev: Lsn,
}

impl SegmentBuilder {
    pub fn new(geometry: SegmentGeometry, timeline: u32, system_id: u64, segno: u64) -> Self {
        Self {
            geometry,
            timeline,
            system_id,
            segno,
            image: Vec::new(),
            insert: 0,
            prev: Lsn::INVALID,
        }
    }

    /// Position the next record would be placed at (before alignment).
    pub fn insert_position(&self) -> Lsn {
        self.geometry.segment_start(self.segno).advance(self.insert)
    }

    /// Leaves the space up to `target` unwritten so the next record starts
    /// there. Pages passed over still get valid headers.
    pub fn pad_to(&mut self, target: Lsn) -> io::Result<()> {
        let segment_start = self.geometry.segment_start(self.segno);
        if self.geometry.segment_number(target) != self.segno || target < self.insert_position() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot pad to {} from {}", target, self.insert_position()),
            ));
        }
        let target_offset = target.as_u64() - segment_start.as_u64();
        let page = PAGE_SIZE as u64;
        let mut offset = self.insert - self.insert % page;
        while offset <= target_offset {
            if offset >= self.image.len() as u64 {
                self.start_page(offset, 0);
            }
            offset += page;
        }
        self.insert = target_offset;
        Ok(())
    }

    /// Appends a record linked to the previously appended one.
    pub fn append(
        &mut self,
        rmgr_id: u8,
        info: u8,
        xid: u32,
        blocks: &[BlockRef],
        payload: &[u8],
    ) -> io::Result<Lsn> {
        self.append_with_prev(self.prev, rmgr_id, info, xid, blocks, payload)
    }

    /// Appends a record with an explicit previous-record link.
    pub fn append_with_prev(
        &mut self,
        prev: Lsn,
        rmgr_id: u8,
        info: u8,
        xid: u32,
        blocks: &[BlockRef],
        payload: &[u8],
    ) -> io::Result<Lsn> {
        let bytes = encode_record(xid, prev, info, rmgr_id, blocks, payload)?;
        let page = PAGE_SIZE as u64;

        self.insert = Lsn(self.insert).align_up(RECORD_ALIGN).as_u64();
        if page - self.insert % page < RECORD_HEADER_SIZE as u64 {
            self.insert += page - self.insert % page;
        }
        if self.insert % page == 0 {
            self.ensure_room(self.insert)?;
            self.start_page(self.insert, 0);
            self.insert += Self::header_size(self.insert) as u64;
        }
        let start = self.geometry.segment_start(self.segno).advance(self.insert);

        let mut written = 0usize;
        while written < bytes.len() {
            if self.insert % page == 0 {
                self.ensure_room(self.insert)?;
                self.start_page(self.insert, (bytes.len() - written) as u32);
                self.insert += Self::header_size(self.insert) as u64;
            }
            let room = (page - self.insert % page) as usize;
            let n = room.min(bytes.len() - written);
            let at = self.insert as usize;
            self.image[at..at + n].copy_from_slice(&bytes[written..written + n]);
            self.insert += n as u64;
            written += n;
        }

        self.prev = start;
        Ok(start)
    }

    /// The image written so far, whole pages only.
    pub fn image(&self) -> Vec<u8> {
        self.image.clone()
    }

    /// File name of the segment being built.
    pub fn segment_name(&self) -> String {
        self.geometry.file_name(self.timeline, self.segno)
    }

    /// Writes the image into `dir` under the segment's file name.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.segment_name());
        let mut file = File::create(&path)?;
        file.write_all(&self.image)?;
        file.sync_all()?;
        Ok(path)
    }

    fn header_size(offset: u64) -> usize {
        if offset == 0 {
            super::page::LONG_HEADER_SIZE
        } else {
            super::page::SHORT_HEADER_SIZE
        }
    }

    fn ensure_room(&self, offset: u64) -> io::Result<()> {
        if offset >= self.geometry.segment_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record does not fit in segment {}", self.segment_name()),
            ));
        }
        Ok(())
    }

    fn start_page(&mut self, offset: u64, remaining_length: u32) {
        let end = offset as usize + PAGE_SIZE;
        if self.image.len() < end {
            self.image.resize(end, 0);
        }

        let mut info = 0;
        if remaining_length > 0 {
            info |= FIRST_IS_CONTRECORD;
        }
        let long = (offset == 0).then_some(LongHeaderFields {
            system_id: self.system_id,
            segment_size: self.geometry.segment_size() as u32,
            page_size: PAGE_SIZE as u32,
        });
        if long.is_some() {
            info |= LONG_HEADER;
        }

        let header = PageHeader {
            magic: PAGE_MAGIC,
            info,
            timeline: self.timeline,
            page_address: self.geometry.segment_start(self.segno).advance(offset),
            remaining_length,
            long,
        };
        header.encode(&mut self.image[offset as usize..]);
    }
}
