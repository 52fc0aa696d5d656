//! The control file
//!
//! Fixed 64-byte little-endian layout:
//!
//! | offset | field |
//! |---|---|
//! | 0 | magic u32 |
//! | 4 | version u32 |
//! | 8 | system_id u64 |
//! | 16 | redo u64 |
//! | 24 | checkpoint u64 |
//! | 32 | timeline u32 |
//! | 36 | state u32 |
//! | 40 | next_xid u64 |
//! | 48 | updated_at i64 (unix seconds) |
//! | 56 | padding |
//! | 60 | crc u32 over bytes 0..60 |
//!
//! Replaced atomically: temp file, fsync, rename, fsync of `global/`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;

use crate::wal::Lsn;

use super::errors::{ControlError, ControlResult};

/// Size of the control file.
pub const CONTROL_FILE_SIZE: usize = 64;
pub const CONTROL_MAGIC: u32 = 0x57A1_C0DE;
pub const CONTROL_VERSION: u32 = 1;

const CRC_OFFSET: usize = 60;

/// Cluster state recorded in the control file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbState {
    InProduction = 1,
    InCrashRecovery = 2,
    Shutdown = 3,
}

impl DbState {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(DbState::InProduction),
            2 => Some(DbState::InCrashRecovery),
            3 => Some(DbState::Shutdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DbState::InProduction => "in production",
            DbState::InCrashRecovery => "in crash recovery",
            DbState::Shutdown => "shut down",
        }
    }
}

/// Durable control metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMetadata {
    pub system_id: u64,
    /// Where replay must resume
    pub redo: Lsn,
    /// Position of the last completed checkpoint
    pub checkpoint: Lsn,
    pub timeline: u32,
    pub state: DbState,
    /// Next transaction id to assign
    pub next_xid: u64,
    /// Unix seconds of the last update
    pub updated_at: i64,
}

impl ControlMetadata {
    /// Replay has work to do only while the redo position differs from the
    /// last checkpoint.
    pub fn in_recovery(&self) -> bool {
        self.redo != self.checkpoint
    }

    pub fn encode(&self) -> [u8; CONTROL_FILE_SIZE] {
        let mut out = [0u8; CONTROL_FILE_SIZE];
        out[0..4].copy_from_slice(&CONTROL_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&CONTROL_VERSION.to_le_bytes());
        out[8..16].copy_from_slice(&self.system_id.to_le_bytes());
        out[16..24].copy_from_slice(&self.redo.as_u64().to_le_bytes());
        out[24..32].copy_from_slice(&self.checkpoint.as_u64().to_le_bytes());
        out[32..36].copy_from_slice(&self.timeline.to_le_bytes());
        out[36..40].copy_from_slice(&(self.state as u32).to_le_bytes());
        out[40..48].copy_from_slice(&self.next_xid.to_le_bytes());
        out[48..56].copy_from_slice(&self.updated_at.to_le_bytes());
        let crc = checksum(&out[..CRC_OFFSET]);
        out[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parses a control file image, returning the reason on failure.
    pub fn decode(bytes: &[u8; CONTROL_FILE_SIZE]) -> Result<Self, String> {
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let u64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(b)
        };

        let magic = u32_at(0);
        if magic != CONTROL_MAGIC {
            return Err(format!("bad magic {:#010x}", magic));
        }
        let version = u32_at(4);
        if version != CONTROL_VERSION {
            return Err(format!("unsupported version {}", version));
        }
        let stored = u32_at(CRC_OFFSET);
        let computed = checksum(&bytes[..CRC_OFFSET]);
        if stored != computed {
            return Err(format!("checksum mismatch (stored {:#010x}, computed {:#010x})", stored, computed));
        }
        let state = DbState::from_u32(u32_at(36)).ok_or_else(|| format!("unknown state {}", u32_at(36)))?;

        Ok(Self {
            system_id: u64_at(8),
            redo: Lsn(u64_at(16)),
            checkpoint: Lsn(u64_at(24)),
            timeline: u32_at(32),
            state,
            next_xid: u64_at(40),
            updated_at: u64_at(48) as i64,
        })
    }
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Handle on `<dir>/global/control`.
#[derive(Debug, Clone)]
pub struct ControlFile {
    path: PathBuf,
}

impl ControlFile {
    /// The control file of data directory `dir`.
    pub fn in_directory(dir: &Path) -> Self {
        Self {
            path: dir.join("global").join("control"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads and validates the control file.
    pub fn read(&self) -> ControlResult<ControlMetadata> {
        let mut file = File::open(&self.path).map_err(|e| ControlError::open_failed(&self.path, e))?;

        let mut bytes = Vec::with_capacity(CONTROL_FILE_SIZE);
        file.read_to_end(&mut bytes)
            .map_err(|e| ControlError::open_failed(&self.path, e))?;

        let image: &[u8; CONTROL_FILE_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ControlError::short_read(&self.path, bytes.len(), CONTROL_FILE_SIZE))?;

        ControlMetadata::decode(image).map_err(|reason| ControlError::corrupted(&self.path, reason))
    }

    /// Replaces the control file atomically.
    ///
    /// A crash at any point leaves either the old or the new contents.
    pub fn write_atomic(&self, metadata: &ControlMetadata) -> ControlResult<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| {
                ControlError::write_failed(
                    &self.path,
                    "locate directory of",
                    io::Error::new(io::ErrorKind::InvalidInput, "no parent directory"),
                )
            })?
            .to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| ControlError::write_failed(&self.path, "create directory of", e))?;

        let tmp = dir.join("control.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| ControlError::write_failed(&tmp, "create", e))?;
        file.write_all(&metadata.encode())
            .map_err(|e| ControlError::write_failed(&tmp, "write", e))?;
        file.sync_all()
            .map_err(|e| ControlError::write_failed(&tmp, "fsync", e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| ControlError::write_failed(&self.path, "rename into", e))?;

        let dir_handle = File::open(&dir).map_err(|e| ControlError::write_failed(&self.path, "open directory of", e))?;
        dir_handle
            .sync_all()
            .map_err(|e| ControlError::write_failed(&self.path, "fsync directory of", e))?;
        Ok(())
    }
}

/// Outcome of picking the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirectory {
    pub path: PathBuf,
    /// The requested directory had no control file and the default was used
    pub fell_back: bool,
}

/// Picks the directory to operate on.
///
/// The requested directory wins when it holds a control file; otherwise
/// the default directory is used if it holds one. When neither does the
/// requested directory is returned, and reading its control file reports
/// the failure.
pub fn resolve_directory(requested: &Path, default: &Path) -> ResolvedDirectory {
    if ControlFile::in_directory(requested).exists() {
        return ResolvedDirectory {
            path: requested.to_path_buf(),
            fell_back: false,
        };
    }
    if requested != default && ControlFile::in_directory(default).exists() {
        return ResolvedDirectory {
            path: default.to_path_buf(),
            fell_back: true,
        };
    }
    ResolvedDirectory {
        path: requested.to_path_buf(),
        fell_back: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::errors::ControlErrorCode;
    use tempfile::TempDir;

    fn sample() -> ControlMetadata {
        ControlMetadata {
            system_id: 7_000_001,
            redo: Lsn(0x100),
            checkpoint: Lsn(0x200),
            timeline: 1,
            state: DbState::InCrashRecovery,
            next_xid: 730,
            updated_at: 1_770_000_000,
        }
    }

    #[test]
    fn test_in_recovery() {
        let mut meta = sample();
        assert!(meta.in_recovery());
        meta.redo = meta.checkpoint;
        assert!(!meta.in_recovery());
    }

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let control = ControlFile::in_directory(temp_dir.path());
        assert!(!control.exists());

        control.write_atomic(&sample()).unwrap();
        assert!(control.exists());
        assert_eq!(control.read().unwrap(), sample());
        assert!(!temp_dir.path().join("global/control.tmp").exists());
        assert_eq!(fs::metadata(control.path()).unwrap().len(), CONTROL_FILE_SIZE as u64);
    }

    #[test]
    fn test_missing_file_is_open_failure() {
        let temp_dir = TempDir::new().unwrap();
        let err = ControlFile::in_directory(temp_dir.path()).read().unwrap_err();
        assert_eq!(err.code(), ControlErrorCode::OpenFailed);
    }

    #[test]
    fn test_wrong_size_is_short_read() {
        let temp_dir = TempDir::new().unwrap();
        let control = ControlFile::in_directory(temp_dir.path());
        fs::create_dir_all(temp_dir.path().join("global")).unwrap();
        fs::write(control.path(), &sample().encode()[..40]).unwrap();
        assert_eq!(control.read().unwrap_err().code(), ControlErrorCode::ShortRead);
    }

    #[test]
    fn test_flipped_byte_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let control = ControlFile::in_directory(temp_dir.path());
        control.write_atomic(&sample()).unwrap();

        let mut bytes = fs::read(control.path()).unwrap();
        bytes[17] ^= 0x01;
        fs::write(control.path(), &bytes).unwrap();
        let err = control.read().unwrap_err();
        assert_eq!(err.code(), ControlErrorCode::Corrupted);
        assert!(err.message().contains("checksum"));
    }

    #[test]
    fn test_resolve_directory_prefers_requested() {
        let requested = TempDir::new().unwrap();
        let default = TempDir::new().unwrap();
        ControlFile::in_directory(default.path()).write_atomic(&sample()).unwrap();

        let resolved = resolve_directory(requested.path(), default.path());
        assert_eq!(resolved.path, default.path());
        assert!(resolved.fell_back);

        ControlFile::in_directory(requested.path()).write_atomic(&sample()).unwrap();
        let resolved = resolve_directory(requested.path(), default.path());
        assert_eq!(resolved.path, requested.path());
        assert!(!resolved.fell_back);
    }

    #[test]
    fn test_resolve_directory_without_any_control_file() {
        let requested = TempDir::new().unwrap();
        let default = TempDir::new().unwrap();
        let resolved = resolve_directory(requested.path(), default.path());
        assert_eq!(resolved.path, requested.path());
        assert!(!resolved.fell_back);
    }
}
