//! Read-ahead for redo
//!
//! Wraps the decoder and keeps a bounded window of decoded outcomes queued
//! ahead of the consumer. Block references of every newly queued record
//! are handed to background workers that load those blocks into a shared
//! cache, so redo of a later record does not stall on cold reads.
//!
//! Outcomes are returned strictly in log order. Hints that do not fit in
//! the bounded channel are dropped; a dropped hint only means the redo
//! step reads the block itself.
//!
//! Disabled by default, like the other optional optimizations.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use super::decoder::{ReadOutcome, RecordDecoder};
use super::errors::WalResult;
use super::record::{BlockRef, DecodedRecord};

/// Loads a block ahead of its use.
///
/// Implementations must be safe to call from worker threads while the
/// redo step reads and writes the same storage.
pub trait BlockPrefetch: Send + Sync {
    fn prefetch_block(&self, block: BlockRef);
}

/// Configuration for read-ahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Whether read-ahead is used at all.
    pub enabled: bool,
    /// Decoded records kept queued ahead of the consumer.
    pub lookahead_records: usize,
    /// Block hints allowed in flight at once.
    pub max_in_flight: usize,
    /// Background threads draining the hints.
    pub workers: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lookahead_records: 16,
            max_in_flight: 8,
            workers: 1,
        }
    }
}

impl PrefetchConfig {
    /// Create config with read-ahead enabled and default limits.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// Counters kept by the prefetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchStats {
    pub hints_issued: u64,
    pub hints_dropped: u64,
}

/// Decoder with a bounded read-ahead window.
pub struct Prefetcher {
    decoder: RecordDecoder,
    queue: VecDeque<WalResult<ReadOutcome>>,
    lookahead: usize,
    decoding_done: bool,
    hints: Option<SyncSender<BlockRef>>,
    workers: Vec<JoinHandle<()>>,
    hint_filter: fn(&DecodedRecord) -> bool,
    stats: PrefetchStats,
}

impl Prefetcher {
    /// Starts the worker threads and wraps `decoder`.
    ///
    /// Fails only when a worker thread cannot be spawned.
    pub fn start(
        decoder: RecordDecoder,
        config: &PrefetchConfig,
        target: Arc<dyn BlockPrefetch>,
    ) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<BlockRef>(config.max_in_flight.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(config.workers.max(1));
        for i in 0..config.workers.max(1) {
            let rx = Arc::clone(&rx);
            let target = Arc::clone(&target);
            let handle = thread::Builder::new()
                .name(format!("walrecover-prefetch-{}", i))
                .spawn(move || drain_hints(&rx, target.as_ref()))?;
            workers.push(handle);
        }

        Ok(Self {
            decoder,
            queue: VecDeque::with_capacity(config.lookahead_records.max(1)),
            lookahead: config.lookahead_records.max(1),
            decoding_done: false,
            hints: Some(tx),
            workers,
            hint_filter: |_| true,
            stats: PrefetchStats::default(),
        })
    }

    /// Hints blocks only for records `filter` accepts; by default every
    /// record's blocks are hinted.
    pub fn with_hint_filter(mut self, filter: fn(&DecodedRecord) -> bool) -> Self {
        self.hint_filter = filter;
        self
    }

    /// Returns the next outcome in log order.
    pub fn read_record(&mut self) -> WalResult<ReadOutcome> {
        self.fill();
        match self.queue.pop_front() {
            Some(outcome) => outcome,
            None => self.decoder.read_record(),
        }
    }

    /// The wrapped decoder.
    pub fn decoder(&self) -> &RecordDecoder {
        &self.decoder
    }

    pub fn stats(&self) -> PrefetchStats {
        self.stats
    }

    fn fill(&mut self) {
        while !self.decoding_done && self.queue.len() < self.lookahead {
            let outcome = self.decoder.read_record();
            match &outcome {
                Ok(ReadOutcome::Record(record)) => {
                    if (self.hint_filter)(record) {
                        for block in record.blocks() {
                            self.hint(*block);
                        }
                    }
                }
                _ => self.decoding_done = true,
            }
            self.queue.push_back(outcome);
        }
    }

    fn hint(&mut self, block: BlockRef) {
        let Some(tx) = &self.hints else {
            return;
        };
        match tx.try_send(block) {
            Ok(()) => self.stats.hints_issued += 1,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.stats.hints_dropped += 1
            }
        }
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker loops.
        self.hints = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn drain_hints(rx: &Mutex<Receiver<BlockRef>>, target: &dyn BlockPrefetch) {
    loop {
        let next = {
            let guard = rx.lock().unwrap_or_else(PoisonError::into_inner);
            guard.recv()
        };
        match next {
            Ok(block) => target.prefetch_block(block),
            Err(_) => break,
        }
    }
}
