//! Relation files
//!
//! Each relation is a file `<data_dir>/base/<relation>` of page-sized
//! blocks. Blocks beyond the end of the file read as empty blocks, so redo
//! can extend a relation simply by writing past its end.
//!
//! Writes are not fsynced individually; the end-of-recovery checkpoint
//! syncs every relation file before it records its marker.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::wal::{BlockPrefetch, BlockRef, PAGE_SIZE};

use super::block::HeapBlock;
use super::cache::BlockCache;
use super::errors::{StorageError, StorageResult};

/// Block storage for every relation under one data directory.
pub struct RelationStore {
    base_dir: PathBuf,
    cache: BlockCache,
}

impl RelationStore {
    /// Opens the store under `data_dir`, creating `base/` if missing.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        Self::with_cache(data_dir, BlockCache::default())
    }

    /// Opens the store with a specific cache.
    pub fn with_cache(data_dir: &Path, cache: BlockCache) -> StorageResult<Self> {
        let base_dir = data_dir.join("base");
        fs::create_dir_all(&base_dir).map_err(|e| StorageError::io(&base_dir, e))?;
        Ok(Self { base_dir, cache })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// Path of the file holding `relation`.
    pub fn relation_path(&self, relation: u32) -> PathBuf {
        self.base_dir.join(relation.to_string())
    }

    /// Reads a block, preferring an image loaded ahead of time.
    pub fn read_block(&self, block: BlockRef) -> StorageResult<HeapBlock> {
        match self.cache.take(block) {
            Some(image) => Ok(image),
            None => self.read_block_direct(block),
        }
    }

    /// Reads a block from its file, bypassing the cache.
    pub fn read_block_direct(&self, block: BlockRef) -> StorageResult<HeapBlock> {
        let path = self.relation_path(block.relation);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HeapBlock::new()),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let offset = block.block as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::io(&path, e))?;

        let mut buf = vec![0u8; PAGE_SIZE];
        let mut filled = 0;
        while filled < PAGE_SIZE {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StorageError::io(&path, e)),
            }
        }

        match filled {
            0 => Ok(HeapBlock::new()),
            PAGE_SIZE => HeapBlock::decode(block, &buf),
            n => Err(StorageError::MalformedBlock {
                block,
                reason: format!("only {} of {} bytes present", n, PAGE_SIZE),
            }),
        }
    }

    /// Writes a block image, extending the relation if needed.
    pub fn write_block(&self, block: BlockRef, image: &HeapBlock) -> StorageResult<()> {
        let path = self.relation_path(block.relation);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;

        let offset = block.block as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::io(&path, e))?;
        file.write_all(&image.encode())
            .map_err(|e| StorageError::io(&path, e))?;

        // Only after the bytes are in the file, so a concurrent read-ahead
        // that saw the old version cannot install what it read.
        self.cache.invalidate(block);
        Ok(())
    }

    /// Creates an empty relation file if it does not exist.
    pub fn create_relation(&self, relation: u32) -> StorageResult<()> {
        let path = self.relation_path(relation);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;
        Ok(())
    }

    /// Cuts a relation down to `nblocks` blocks.
    pub fn truncate_relation(&self, relation: u32, nblocks: u32) -> StorageResult<()> {
        let path = self.relation_path(relation);
        let file = match OpenOptions::new().write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::io(&path, e)),
        };
        let len = file.metadata().map_err(|e| StorageError::io(&path, e))?.len();
        let target = nblocks as u64 * PAGE_SIZE as u64;
        if target < len {
            file.set_len(target).map_err(|e| StorageError::io(&path, e))?;
        }
        self.cache.invalidate_relation(relation);
        Ok(())
    }

    /// Number of blocks currently in `relation`.
    pub fn block_count(&self, relation: u32) -> StorageResult<u32> {
        let path = self.relation_path(relation);
        match fs::metadata(&path) {
            Ok(meta) => Ok((meta.len() / PAGE_SIZE as u64) as u32),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Relations present under `base/`, sorted.
    pub fn relations(&self) -> StorageResult<Vec<u32>> {
        let entries = fs::read_dir(&self.base_dir).map_err(|e| StorageError::io(&self.base_dir, e))?;
        let mut relations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.base_dir, e))?;
            let name = entry.file_name();
            let relation = name
                .to_str()
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(|| StorageError::InvalidRelationName(entry.path()))?;
            relations.push(relation);
        }
        relations.sort_unstable();
        Ok(relations)
    }

    /// Fsyncs every relation file and the `base/` directory.
    ///
    /// Returns the number of files synced.
    pub fn sync_all(&self) -> StorageResult<usize> {
        let relations = self.relations()?;
        for relation in &relations {
            let path = self.relation_path(*relation);
            let file = File::open(&path).map_err(|e| StorageError::io(&path, e))?;
            file.sync_all().map_err(|e| StorageError::io(&path, e))?;
        }
        let dir = File::open(&self.base_dir).map_err(|e| StorageError::io(&self.base_dir, e))?;
        dir.sync_all().map_err(|e| StorageError::io(&self.base_dir, e))?;
        Ok(relations.len())
    }
}

impl BlockPrefetch for RelationStore {
    fn prefetch_block(&self, block: BlockRef) {
        let observed = self.cache.version(block);
        // A failed read is not reported; redo will read the block itself.
        if let Ok(image) = self.read_block_direct(block) {
            self.cache.install(block, observed, image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::Lsn;
    use tempfile::TempDir;

    #[test]
    fn test_missing_block_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = RelationStore::open(temp_dir.path()).unwrap();
        let block = store.read_block(BlockRef::new(16384, 3)).unwrap();
        assert_eq!(block, HeapBlock::new());
        assert!(temp_dir.path().join("base").is_dir());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = RelationStore::open(temp_dir.path()).unwrap();
        let at = BlockRef::new(16384, 2);

        let mut image = HeapBlock::new();
        image.put_tuple(1, b"row").unwrap();
        image.set_lsn(Lsn(0x140));
        store.write_block(at, &image).unwrap();

        assert_eq!(store.read_block(at).unwrap(), image);
        assert_eq!(store.block_count(16384).unwrap(), 3);
        // Blocks before the written one were extended with zeroes.
        assert_eq!(store.read_block(BlockRef::new(16384, 0)).unwrap(), HeapBlock::new());
    }

    #[test]
    fn test_prefetch_fills_cache_and_write_evicts() {
        let temp_dir = TempDir::new().unwrap();
        let store = RelationStore::open(temp_dir.path()).unwrap();
        let at = BlockRef::new(7, 0);
        let mut image = HeapBlock::new();
        image.put_tuple(0, b"old").unwrap();
        store.write_block(at, &image).unwrap();

        store.prefetch_block(at);
        assert_eq!(store.cache().len(), 1);

        image.put_tuple(0, b"new").unwrap();
        store.write_block(at, &image).unwrap();
        assert!(store.cache().is_empty());
        assert_eq!(store.read_block(at).unwrap().tuple(0), Some(&b"new"[..]));
    }

    #[test]
    fn test_truncate_and_relations() {
        let temp_dir = TempDir::new().unwrap();
        let store = RelationStore::open(temp_dir.path()).unwrap();
        store.create_relation(20).unwrap();
        store.write_block(BlockRef::new(10, 4), &HeapBlock::new()).unwrap();

        assert_eq!(store.relations().unwrap(), vec![10, 20]);
        store.truncate_relation(10, 1).unwrap();
        assert_eq!(store.block_count(10).unwrap(), 1);
        store.truncate_relation(99, 0).unwrap();
        assert_eq!(store.sync_all().unwrap(), 2);
    }

    #[test]
    fn test_partial_block_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let store = RelationStore::open(temp_dir.path()).unwrap();
        fs::write(store.relation_path(3), vec![0u8; 100]).unwrap();
        let err = store.read_block(BlockRef::new(3, 0)).unwrap_err();
        assert!(matches!(err, StorageError::MalformedBlock { .. }));
    }
}
