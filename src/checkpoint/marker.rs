//! Checkpoint marker file handling
//!
//! The marker records:
//! - redo: position every relation file is synced through
//! - flags: names of the request flags
//! - created_at: RFC3339 timestamp
//! - format_version: always 1
//!
//! Location: `<data_dir>/checkpoint.json`
//!
//! The marker is written after every relation file is fsynced.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::wal::Lsn;

use super::errors::{CheckpointError, CheckpointResult};

/// Checkpoint marker data structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointMarker {
    /// Redo position covered by this checkpoint
    pub redo: Lsn,

    /// Flags the checkpoint was requested with
    pub flags: Vec<String>,

    /// Timestamp when checkpoint was created (RFC3339 format)
    pub created_at: String,

    /// Format version (always 1)
    pub format_version: u8,
}

impl CheckpointMarker {
    pub fn new(redo: Lsn, flags: Vec<String>, created_at: &str) -> Self {
        Self {
            redo,
            flags,
            created_at: created_at.to_string(),
            format_version: 1,
        }
    }

    /// Serializes the marker to JSON
    pub fn to_json(&self) -> CheckpointResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            CheckpointError::marker_failed(
                format!("Failed to serialize checkpoint marker: {}", e),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    /// Deserializes the marker from JSON
    pub fn from_json(json: &str) -> CheckpointResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CheckpointError::failed_with_source("Failed to parse checkpoint marker", e))
    }

    /// Writes the marker to a file with fsync of the file and its directory
    pub fn write_to_file(&self, path: &Path) -> CheckpointResult<()> {
        let json = self.to_json()?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CheckpointError::marker_failed(
                        format!("Failed to create marker directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let mut file = File::create(path).map_err(|e| {
            CheckpointError::marker_failed(
                format!("Failed to create marker file: {}", path.display()),
                e,
            )
        })?;

        file.write_all(json.as_bytes()).map_err(|e| {
            CheckpointError::marker_failed(
                format!("Failed to write marker file: {}", path.display()),
                e,
            )
        })?;

        file.sync_all().map_err(|e| {
            CheckpointError::marker_failed(
                format!("Failed to fsync marker file: {}", path.display()),
                e,
            )
        })?;

        if let Some(parent) = path.parent() {
            let dir = OpenOptions::new().read(true).open(parent).map_err(|e| {
                CheckpointError::marker_failed(
                    format!("Failed to open marker directory for fsync: {}", parent.display()),
                    e,
                )
            })?;

            dir.sync_all().map_err(|e| {
                CheckpointError::marker_failed(
                    format!("Failed to fsync marker directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        Ok(())
    }

    /// Reads a marker from a file
    pub fn read_from_file(path: &Path) -> CheckpointResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            CheckpointError::failed_with_source(
                format!("Failed to open marker file: {}", path.display()),
                e,
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            CheckpointError::failed_with_source(
                format!("Failed to read marker file: {}", path.display()),
                e,
            )
        })?;

        Self::from_json(&contents)
    }
}

/// Returns the path to the checkpoint marker file
pub fn marker_path(data_dir: &Path) -> PathBuf {
    data_dir.join("checkpoint.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> CheckpointMarker {
        CheckpointMarker::new(
            Lsn(0x180),
            vec!["END_OF_RECOVERY".into(), "IMMEDIATE".into()],
            "2026-02-04T16:30:00Z",
        )
    }

    #[test]
    fn test_marker_json_format() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["redo"], "0/180");
        assert_eq!(value["flags"][0], "END_OF_RECOVERY");
        assert_eq!(value["created_at"], "2026-02-04T16:30:00Z");
        assert_eq!(value["format_version"], 1);
    }

    #[test]
    fn test_marker_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = marker_path(temp_dir.path());

        sample().write_to_file(&path).unwrap();
        assert!(path.exists());
        assert_eq!(CheckpointMarker::read_from_file(&path).unwrap(), sample());
    }

    #[test]
    fn test_read_missing_marker_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(CheckpointMarker::read_from_file(&marker_path(temp_dir.path())).is_err());
    }

    #[test]
    fn test_garbage_marker_fails() {
        assert!(CheckpointMarker::from_json("{not json").is_err());
    }
}
