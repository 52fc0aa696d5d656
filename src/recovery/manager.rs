//! Recovery Manager
//!
//! Orchestrates one replay or listing pass against a data directory.
//!
//! # Replay sequence (strict order)
//!
//! 1. Resolve the directory (requested, else the configured default)
//! 2. Read the control file; refuse when not in recovery
//! 3. Open the segment holding the redo position
//! 4. Replay DML records until end of log or a decode error
//! 5. Advance the control file, then checkpoint
//!
//! Any failure moves the manager to `Aborted` and leaves the control file
//! as it was. The segment file is closed on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::checkpoint::CheckpointRequester;
use crate::control::{resolve_directory, ControlFile, ControlMetadata};
use crate::observability::{log_event_with_fields, Event};
use crate::storage::RelationStore;
use crate::wal::{BlockPrefetch, Lsn, PageReader, Prefetcher, RecordDecoder, SegmentFile};

use super::adapters::StorageRedo;
use super::config::ReplayConfig;
use super::errors::{RecoveryError, RecoveryResult};
use super::finalize::RecoveryFinalizer;
use super::list::{list_records, ListSummary, RecordSink};
use super::replay::{is_replayed, LogRead, ReplayProgress, WalReplayer};

/// Where the manager is in its sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    ReadingControlMetadata,
    LocatingSegment,
    Replaying,
    Finalizing,
    Done,
    Aborted,
}

impl ReplayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayState::Idle => "idle",
            ReplayState::ReadingControlMetadata => "reading_control_metadata",
            ReplayState::LocatingSegment => "locating_segment",
            ReplayState::Replaying => "replaying",
            ReplayState::Finalizing => "finalizing",
            ReplayState::Done => "done",
            ReplayState::Aborted => "aborted",
        }
    }
}

/// Result of a replay pass: the last applied record, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayResult {
    pub last_record_kind: Option<String>,
    pub last_position: Option<Lsn>,
}

impl ReplayResult {
    fn from_progress(progress: &ReplayProgress) -> Self {
        match &progress.last_applied {
            Some(last) => Self {
                last_record_kind: Some(last.record_kind.clone()),
                last_position: Some(last.position),
            },
            None => Self {
                last_record_kind: None,
                last_position: None,
            },
        }
    }
}

/// Control metadata loaded for one pass
struct LoadedControl {
    dir: PathBuf,
    control: ControlFile,
    metadata: ControlMetadata,
}

/// Recovery Manager that orchestrates replay and listing
pub struct RecoveryManager {
    config: ReplayConfig,
    checkpointer: Box<dyn CheckpointRequester>,
    state: ReplayState,
}

impl RecoveryManager {
    /// Creates a new recovery manager
    pub fn new(config: ReplayConfig, checkpointer: Box<dyn CheckpointRequester>) -> Self {
        Self {
            config,
            checkpointer,
            state: ReplayState::Idle,
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// Replay the log of `dir` and persist the progress.
    ///
    /// Returns the kind and position of the last applied record, or nulls
    /// when nothing was applied.
    pub fn replay(&mut self, dir: &Path) -> RecoveryResult<ReplayResult> {
        self.state = ReplayState::Idle;
        log_event_with_fields(Event::ReplayStart, &[("requested_dir", &dir.display().to_string())]);

        match self.run_replay(dir) {
            Ok(result) => {
                self.state = ReplayState::Done;
                Ok(result)
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Stream every record of `dir`'s log to `sink` without applying it.
    pub fn list_records(&mut self, dir: &Path, sink: &mut dyn RecordSink) -> RecoveryResult<ListSummary> {
        self.state = ReplayState::Idle;
        log_event_with_fields(Event::ListStart, &[("requested_dir", &dir.display().to_string())]);

        match self.run_list(dir, sink) {
            Ok(summary) => {
                self.state = ReplayState::Done;
                Ok(summary)
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    fn run_replay(&mut self, dir: &Path) -> RecoveryResult<ReplayResult> {
        let loaded = self.load_control(dir)?;
        let decoder = self.open_log(&loaded)?;

        let store = Arc::new(
            RelationStore::open(&loaded.dir)
                .map_err(|e| RecoveryError::storage_unavailable(format!("could not open relation storage: {}", e)))?,
        );
        let mut target = StorageRedo::new(Arc::clone(&store));

        self.state = ReplayState::Replaying;
        let mut fields: Vec<(&str, String)> = Vec::new();
        let progress = if self.config.prefetch.enabled {
            let prefetch_target: Arc<dyn BlockPrefetch> = store;
            let mut log = Prefetcher::start(decoder, &self.config.prefetch, prefetch_target)
                .map_err(RecoveryError::read_ahead_failed)?
                .with_hint_filter(is_replayed);
            let progress = WalReplayer::replay(&mut log, &mut target)?;
            let hints = log.stats();
            let cache = target.store().cache().stats();
            fields.extend([
                ("blocks_loaded", cache.blocks_loaded.to_string()),
                ("cache_hits", cache.hits.to_string()),
                ("cache_evicted", cache.evicted.to_string()),
                ("cache_misses", cache.misses.to_string()),
                ("hints_dropped", hints.hints_dropped.to_string()),
                ("hints_issued", hints.hints_issued.to_string()),
            ]);
            progress
        } else {
            let mut log = decoder;
            WalReplayer::replay(&mut log, &mut target)?
        };

        self.state = ReplayState::Finalizing;
        RecoveryFinalizer::new(&loaded.control, self.checkpointer.as_ref()).finalize(
            &loaded.dir,
            &loaded.metadata,
            &progress,
        )?;

        let result = ReplayResult::from_progress(&progress);
        fields.extend([
            ("already_applied", progress.records_already_applied.to_string()),
            (
                "last_position",
                result.last_position.map(|p| p.to_string()).unwrap_or_default(),
            ),
            ("pages_read", progress.pages_read.to_string()),
            ("records_applied", progress.records_applied.to_string()),
            ("records_skipped", progress.records_skipped.to_string()),
            ("stop", progress.stop.to_string()),
            ("xid_high_water", progress.xid_high_water.to_string()),
        ]);
        let fields: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        log_event_with_fields(Event::ReplayComplete, &fields);
        Ok(result)
    }

    fn run_list(&mut self, dir: &Path, sink: &mut dyn RecordSink) -> RecoveryResult<ListSummary> {
        let loaded = self.load_control(dir)?;
        let mut decoder = self.open_log(&loaded)?;

        self.state = ReplayState::Replaying;
        let log: &mut dyn LogRead = &mut decoder;
        let summary = list_records(log, sink)?;

        log_event_with_fields(
            Event::ListComplete,
            &[
                ("pages_read", &summary.pages_read.to_string()),
                ("records", &summary.records.to_string()),
                ("segment", &summary.segment),
                ("stop", &summary.stop.to_string()),
            ],
        );
        Ok(summary)
    }

    fn load_control(&mut self, dir: &Path) -> RecoveryResult<LoadedControl> {
        self.state = ReplayState::ReadingControlMetadata;

        let default_dir = self.config.default_data_dir();
        let resolved = resolve_directory(dir, &default_dir);
        if resolved.fell_back {
            log_event_with_fields(
                Event::ControlFallback,
                &[
                    ("data_dir", &resolved.path.display().to_string()),
                    ("requested_dir", &dir.display().to_string()),
                ],
            );
        }

        let control = ControlFile::in_directory(&resolved.path);
        let metadata = control.read().map_err(RecoveryError::control_unreadable)?;
        log_event_with_fields(
            Event::ControlLoaded,
            &[
                ("checkpoint", &metadata.checkpoint.to_string()),
                ("data_dir", &resolved.path.display().to_string()),
                ("redo", &metadata.redo.to_string()),
                ("state", metadata.state.as_str()),
                ("timeline", &metadata.timeline.to_string()),
            ],
        );

        if !metadata.in_recovery() {
            return Err(RecoveryError::not_in_recovery(metadata.redo));
        }

        Ok(LoadedControl {
            dir: resolved.path,
            control,
            metadata,
        })
    }

    fn open_log(&mut self, loaded: &LoadedControl) -> RecoveryResult<RecordDecoder> {
        self.state = ReplayState::LocatingSegment;

        let geometry = self.config.geometry()?;
        let segment = SegmentFile::open(&loaded.dir, geometry, loaded.metadata.timeline, loaded.metadata.redo)?;
        let reader = PageReader::new(segment, loaded.metadata.system_id);
        Ok(RecordDecoder::begin(
            reader,
            loaded.metadata.redo,
            self.config.max_record_size_bytes,
        ))
    }

    fn abort(&mut self, err: RecoveryError) -> RecoveryError {
        let failed_in = self.state;
        self.state = ReplayState::Aborted;
        log_event_with_fields(
            Event::ReplayAborted,
            &[
                ("code", err.code().code()),
                ("message", err.message()),
                ("state", failed_in.as_str()),
            ],
        );
        err
    }
}
