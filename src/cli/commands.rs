//! CLI command implementations
//!
//! Commands are thin: they load configuration, wire the local
//! checkpointer, run the recovery manager and print its result.

use std::io::{self, Write};
use std::path::Path;

use crate::checkpoint::StorageCheckpointer;
use crate::observability::{Logger, Severity};
use crate::recovery::{JsonLinesSink, RecoveryManager, ReplayConfig};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response_to;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_deref())?;

    let severity = if cli.verbose {
        Severity::Trace
    } else {
        config.severity()?
    };
    Logger::set_min_severity(severity);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Replay { dir } => replay(&config, &dir, &mut out),
        Command::List { dir } => list(&config, &dir, &mut out),
    }
}

/// Load configuration, falling back to defaults when no file is given.
///
/// `WALRECOVER_DATA_DIR` overrides the default data directory.
pub fn load_config(path: Option<&Path>) -> CliResult<ReplayConfig> {
    let config = match path {
        Some(path) => ReplayConfig::load(path)?,
        None => ReplayConfig::default(),
    }
    .with_env_overrides();

    config
        .validate()
        .map_err(|e| CliError::config_error(e.message()))?;
    Ok(config)
}

/// Replay the log of `dir` and print the last applied record
pub fn replay<W: Write>(config: &ReplayConfig, dir: &Path, out: &mut W) -> CliResult<()> {
    let mut manager = RecoveryManager::new(config.clone(), Box::new(StorageCheckpointer::new()));
    let result = manager.replay(dir)?;
    write_response_to(out, serde_json::to_value(&result)?)
}

/// Print every record of `dir`'s log, one JSON line each
pub fn list<W: Write>(config: &ReplayConfig, dir: &Path, out: &mut W) -> CliResult<()> {
    let mut manager = RecoveryManager::new(config.clone(), Box::new(StorageCheckpointer::new()));
    let mut sink = JsonLinesSink::new(out);
    manager.list_records(dir, &mut sink)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use crate::control::{ControlFile, ControlMetadata, DbState};
    use crate::rmgr::heap::{HeapOp, XLOG_HEAP_DELETE, XLOG_HEAP_INSERT};
    use crate::wal::{BlockRef, Lsn, SegmentBuilder, SegmentGeometry};
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn setup(dir: &Path) -> Vec<Lsn> {
        let mut builder = SegmentBuilder::new(SegmentGeometry::default(), 1, 3, 0);
        let insert = HeapOp::Insert {
            slot: 0,
            tuple: b"a".to_vec(),
        };
        let delete = HeapOp::Delete { slot: 0 };
        let first = builder
            .append(10, XLOG_HEAP_INSERT, 10, &[BlockRef::new(5, 0)], &insert.encode())
            .unwrap();
        let second = builder
            .append(10, XLOG_HEAP_DELETE, 11, &[BlockRef::new(5, 0)], &delete.encode())
            .unwrap();
        builder.write_to(dir).unwrap();

        ControlFile::in_directory(dir)
            .write_atomic(&ControlMetadata {
                system_id: 3,
                redo: first,
                checkpoint: Lsn(0x4000),
                timeline: 1,
                state: DbState::InCrashRecovery,
                next_xid: 1,
                updated_at: 0,
            })
            .unwrap();
        vec![first, second]
    }

    fn config_for(dir: &Path) -> ReplayConfig {
        ReplayConfig {
            default_data_dir: dir.display().to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_replay_prints_last_applied() {
        let temp_dir = TempDir::new().unwrap();
        let positions = setup(temp_dir.path());

        let mut out = Vec::new();
        replay(&config_for(temp_dir.path()), temp_dir.path(), &mut out).unwrap();

        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"]["last_record_kind"], "DELETE");
        assert_eq!(value["data"]["last_position"], positions[1].to_string());
        assert!(temp_dir.path().join("checkpoint.json").exists());
    }

    #[test]
    fn test_list_prints_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let positions = setup(temp_dir.path());

        let mut out = Vec::new();
        list(&config_for(temp_dir.path()), temp_dir.path(), &mut out).unwrap();

        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["position"], positions[0].to_string());
        assert_eq!(lines[1]["record_kind"], "DELETE");
        assert!(!temp_dir.path().join("checkpoint.json").exists());
    }

    #[test]
    fn test_replay_failure_is_recovery_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        let err = replay(&config_for(temp_dir.path()), temp_dir.path(), &mut out).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::RecoveryFailed);
        assert!(err.message().contains("WALREC_CONTROL_UNREADABLE"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_load_config_rejects_bad_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("walrecover.json");
        fs::write(&path, r#"{"segment_size_bytes": 12345}"#).unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.code_str(), "WALREC_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.segment_size_bytes, 16 * 1024 * 1024);
    }
}
