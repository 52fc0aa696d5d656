//! Shared block cache filled by read-ahead
//!
//! Entries are consumed on hit; when full, the oldest entry is evicted to
//! make room. Every block write bumps the block's
//! version and evicts its entry; a read-ahead load installs only if the
//! version it observed before reading is still current, so a stale image
//! never reaches redo.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::wal::BlockRef;

use super::block::HeapBlock;

/// Default number of blocks the cache holds.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Read-ahead images installed
    pub blocks_loaded: u64,
    /// Read-ahead images rejected because the block changed meanwhile
    pub stale_discarded: u64,
    /// Unused images pushed out to make room
    pub evicted: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct CacheState {
    versions: HashMap<BlockRef, u64>,
    entries: HashMap<BlockRef, HeapBlock>,
    /// Install order of the blocks in `entries`
    order: VecDeque<BlockRef>,
    stats: CacheStats,
}

impl CacheState {
    fn remove(&mut self, block: &BlockRef) -> Option<HeapBlock> {
        let entry = self.entries.remove(block);
        if entry.is_some() {
            self.order.retain(|b| b != block);
        }
        entry
    }
}

/// Versioned block cache.
pub struct BlockCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current version of `block`; observe before reading it from disk.
    pub fn version(&self, block: BlockRef) -> u64 {
        self.lock().versions.get(&block).copied().unwrap_or(0)
    }

    /// Installs an image read after observing `observed_version`.
    ///
    /// Returns false when the block changed since. A full cache evicts
    /// its oldest entry first.
    pub fn install(&self, block: BlockRef, observed_version: u64, image: HeapBlock) -> bool {
        let mut state = self.lock();
        let current = state.versions.get(&block).copied().unwrap_or(0);
        if current != observed_version {
            state.stats.stale_discarded += 1;
            return false;
        }
        if state.remove(&block).is_none() {
            while state.entries.len() >= self.capacity.max(1) {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                state.entries.remove(&oldest);
                state.stats.evicted += 1;
            }
        }
        state.entries.insert(block, image);
        state.order.push_back(block);
        state.stats.blocks_loaded += 1;
        true
    }

    /// Removes and returns the cached image of `block`.
    pub fn take(&self, block: BlockRef) -> Option<HeapBlock> {
        let mut state = self.lock();
        let entry = state.remove(&block);
        if entry.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        entry
    }

    /// Records a write of `block`: bumps its version and evicts it.
    pub fn invalidate(&self, block: BlockRef) {
        let mut state = self.lock();
        *state.versions.entry(block).or_insert(0) += 1;
        state.remove(&block);
    }

    /// Invalidates every block of `relation` known to the cache.
    pub fn invalidate_relation(&self, relation: u32) {
        let mut state = self.lock();
        let known: Vec<BlockRef> = state
            .versions
            .keys()
            .chain(state.entries.keys())
            .filter(|b| b.relation == relation)
            .copied()
            .collect();
        for block in known {
            *state.versions.entry(block).or_insert(0) += 1;
            state.remove(&block);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }
}
