//! Replay configuration
//!
//! Loaded from an optional JSON file. Every field has a default, so an
//! empty object (or no file at all) is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::observability::Severity;
use crate::wal::{PrefetchConfig, SegmentGeometry, DEFAULT_MAX_RECORD_SIZE, DEFAULT_SEGMENT_SIZE};

use super::errors::{RecoveryError, RecoveryResult};

/// Environment variable overriding `default_data_dir`
pub const DATA_DIR_ENV: &str = "WALRECOVER_DATA_DIR";

/// Replay and listing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Directory used when the requested one has no control file
    #[serde(default = "default_data_dir")]
    pub default_data_dir: String,

    /// Segment size in bytes (default: 16 MiB)
    #[serde(default = "default_segment_size")]
    pub segment_size_bytes: u64,

    /// Largest accepted record (default: 1 GiB)
    #[serde(default = "default_max_record_size")]
    pub max_record_size_bytes: u64,

    /// Read-ahead of referenced blocks (default: disabled)
    #[serde(default)]
    pub prefetch: PrefetchConfig,

    /// Minimum log severity: "trace", "info", "warn" or "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_segment_size() -> u64 {
    DEFAULT_SEGMENT_SIZE
}

fn default_max_record_size() -> u64 {
    DEFAULT_MAX_RECORD_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            default_data_dir: default_data_dir(),
            segment_size_bytes: default_segment_size(),
            max_record_size_bytes: default_max_record_size(),
            prefetch: PrefetchConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl ReplayConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> RecoveryResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RecoveryError::invalid_config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: ReplayConfig = serde_json::from_str(&content)
            .map_err(|e| RecoveryError::invalid_config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.is_empty() {
                self.default_data_dir = dir;
            }
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> RecoveryResult<()> {
        if self.default_data_dir.is_empty() {
            return Err(RecoveryError::invalid_config("default_data_dir must not be empty"));
        }

        self.geometry()?;

        if self.max_record_size_bytes == 0 {
            return Err(RecoveryError::invalid_config("max_record_size_bytes must be > 0"));
        }

        self.severity()?;

        if self.prefetch.enabled {
            if self.prefetch.lookahead_records == 0 {
                return Err(RecoveryError::invalid_config("prefetch.lookahead_records must be > 0"));
            }
            if self.prefetch.max_in_flight == 0 {
                return Err(RecoveryError::invalid_config("prefetch.max_in_flight must be > 0"));
            }
            if self.prefetch.workers == 0 {
                return Err(RecoveryError::invalid_config("prefetch.workers must be > 0"));
            }
        }

        Ok(())
    }

    /// Segment geometry for the configured segment size
    pub fn geometry(&self) -> RecoveryResult<SegmentGeometry> {
        SegmentGeometry::new(self.segment_size_bytes).ok_or_else(|| {
            RecoveryError::invalid_config(format!(
                "Invalid segment_size_bytes: {}. Must be a power of two between 1 MiB and 1 GiB.",
                self.segment_size_bytes
            ))
        })
    }

    /// Minimum log severity
    pub fn severity(&self) -> RecoveryResult<Severity> {
        match Severity::parse(&self.log_level) {
            Some(Severity::Fatal) | None => Err(RecoveryError::invalid_config(format!(
                "Invalid log_level: '{}'. Expected trace, info, warn or error.",
                self.log_level
            ))),
            Some(severity) => Ok(severity),
        }
    }

    /// Fallback data directory
    pub fn default_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.default_data_dir)
    }
}
