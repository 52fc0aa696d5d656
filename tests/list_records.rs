//! Record Listing Tests
//!
//! Listing walks the same log as replay but must never touch relation
//! files, the control file or the checkpoint marker.

mod common;

use common::*;
use serde_json::Value;
use tempfile::TempDir;
use walrecover::checkpoint::marker_path;
use walrecover::recovery::{JsonLinesSink, ListedRecord, RecoveryErrorCode, StopReason};
use walrecover::rmgr::xact::XLOG_XACT_COMMIT;
use walrecover::rmgr::RmgrId;
use walrecover::wal::Lsn;

#[test]
fn test_list_emits_records_in_log_order() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    scenario_segment(dir);
    write_control(dir, Lsn(0x100), Lsn(0x200));

    let (mut manager, _) = manager(config(dir));
    let mut rows: Vec<ListedRecord> = Vec::new();
    let summary = manager.list_records(dir, &mut rows).unwrap();

    assert_eq!(summary.records, 3);
    assert!(matches!(summary.stop, StopReason::DecodeError(_)));
    let positions: Vec<String> = rows.iter().map(|r| r.position.to_string()).collect();
    assert_eq!(positions, vec!["0/100", "0/140", "0/180"]);
    for row in &rows {
        assert_eq!(row.segment, "000000010000000000000000");
        assert_eq!(row.record_kind, "INSERT");
    }
}

#[test]
fn test_list_has_no_side_effects() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    scenario_segment(dir);
    let before = write_control(dir, Lsn(0x100), Lsn(0x200));

    let (mut manager, checkpointer) = manager(config(dir));
    let mut rows: Vec<ListedRecord> = Vec::new();
    manager.list_records(dir, &mut rows).unwrap();

    assert_eq!(read_control(dir), before);
    assert!(relation_bytes(dir, RELATION).is_empty());
    assert!(!marker_path(dir).exists());
    assert_eq!(checkpointer.count(), 0);
}

#[test]
fn test_list_includes_non_dml_records() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    let mut b = builder();
    b.pad_to(Lsn(0x100)).unwrap();
    append_insert(&mut b, 0, 7);
    b.append(RmgrId::Transaction.as_u8(), XLOG_XACT_COMMIT, 7, &[], &[0u8; 8])
        .unwrap();
    b.write_to(dir).unwrap();
    write_control(dir, Lsn(0x100), Lsn(0x1000));

    let (mut manager, _) = manager(config(dir));
    let mut out = Vec::new();
    let mut sink = JsonLinesSink::new(&mut out);
    let summary = manager.list_records(dir, &mut sink).unwrap();
    assert_eq!(summary.stop, StopReason::EndOfLog);

    let lines: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["record_kind"], "INSERT");
    assert_eq!(lines[1]["record_kind"], "COMMIT");
    assert_eq!(lines[1]["segment"], "000000010000000000000000");
}

#[test]
fn test_list_refuses_completed_recovery() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    scenario_segment(dir);
    write_control(dir, Lsn(0x200), Lsn(0x200));

    let (mut manager, _) = manager(config(dir));
    let mut rows: Vec<ListedRecord> = Vec::new();
    let err = manager.list_records(dir, &mut rows).unwrap_err();
    assert_eq!(err.code(), RecoveryErrorCode::NotInRecovery);
    assert!(rows.is_empty());
}
