mod common;

use common::{DEMO_HEADER, RecordingExecutor, ScriptedAllocator, durable_updater, ephemeral_updater};
use std::io::Cursor;
use vld_updater::{ApplyStatus, SeqnoScope, UpdaterConfig, UpdaterErrorCode};

fn input(lines: &[&str]) -> Cursor<String> {
    Cursor::new(lines.join("\n") + "\n")
}

#[test]
fn local_update_creates_vld_table_and_inserts_under_allocated_seqno() {
    let exec = RecordingExecutor::new().missing("DEMOVLD");
    let alloc = ScriptedAllocator::new(&[42]);
    let mut updater = durable_updater(
        UpdaterConfig::durable().with_convert_unsigned(true),
        &exec,
        &alloc,
    );
    let header = format!("{DEMO_HEADER} epoch=5");

    let report = updater
        .apply_update_reader(
            input(&[&header, "2288517136,101,201", "2288517126,102,202"]),
            SeqnoScope::Local,
        )
        .expect("apply");

    assert_eq!(report.status, ApplyStatus::Applied);
    assert_eq!(report.seqnos(), vec![42]);
    assert_eq!(report.rows_inserted(), 2);
    assert_eq!(report.blocks[0].converted_unsigned, 2);
    assert!(report.blocks[0].created_vld_table);
    assert_eq!(alloc.calls(), vec![("DEMO".to_string(), SeqnoScope::Local)]);

    let writes = exec.writes();
    assert_eq!(writes.len(), 5, "{writes:#?}");
    assert!(writes[0].starts_with("CREATE TABLE DEMOVLD (SEQNO integer not null primary key,"));
    assert!(writes[0].contains("EPOCH tinyint(4),REALITY tinyint(4),"));
    assert_eq!(writes[1], "DELETE FROM DEMO WHERE SEQNO=42");
    assert_eq!(writes[2], "DELETE FROM DEMOVLD WHERE SEQNO=42");
    assert_eq!(
        writes[3],
        "INSERT INTO DEMO VALUES (42,1,-2006450160,101,201),(42,2,-2006450170,102,202);"
    );
    assert!(writes[4].starts_with(
        "INSERT INTO DEMOVLD VALUES (42, '2009-01-01 00:00:00', '2009-02-01 00:00:00', 5, 0, \
         '1', '1', 0, 0, '2009-04-07 18:00:00', '"
    ));
}

#[test]
fn simmask_option_reaches_vld_row() {
    let exec = RecordingExecutor::new();
    let alloc = ScriptedAllocator::new(&[3]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);
    let header = format!("{DEMO_HEADER} 12 SimMask=MC");

    updater
        .apply_update_reader(input(&[&header, "1,2"]), SeqnoScope::Local)
        .expect("apply");

    let vld_row = exec
        .writes()
        .into_iter()
        .find(|s| s.starts_with("INSERT INTO DEMOVLD"))
        .expect("vld row");
    assert!(vld_row.contains("'1', '4', 12, 0,"), "{vld_row}");
    assert!(
        !exec.writes().iter().any(|s| s.starts_with("CREATE")),
        "existing VLD table is reused"
    );
}

#[test]
fn bad_option_fails_block_without_any_write() {
    let exec = RecordingExecutor::new();
    let alloc = ScriptedAllocator::new(&[1]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);
    let header = format!("{DEMO_HEADER} simmask=bogus");

    let err = updater
        .apply_update_reader(input(&[&header, "1,2"]), SeqnoScope::Local)
        .expect_err("bad simmask");

    assert_eq!(err.code(), UpdaterErrorCode::BadOption);
    assert!(err.to_string().contains("bogus"));
    assert!(exec.writes().is_empty());
    assert!(alloc.calls().is_empty());
}

#[test]
fn missing_table_fails_block_without_any_write() {
    let exec = RecordingExecutor::new().missing("DEMO");
    let alloc = ScriptedAllocator::new(&[1]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect_err("missing table");

    assert_eq!(err.code_str(), "table_not_found");
    assert_eq!(exec.log(), vec!["describe DEMO"]);
    assert!(alloc.calls().is_empty());
}

#[test]
fn global_update_needs_authorising_store_before_reading() {
    let exec = RecordingExecutor::new().missing("GLOBALSEQNO");
    let alloc = ScriptedAllocator::new(&[1]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&["this is not an update file"]), SeqnoScope::Global)
        .expect_err("not authorising");

    assert_eq!(err.code(), UpdaterErrorCode::NotAuthorising);
    assert_eq!(exec.log(), vec!["describe GLOBALSEQNO"]);
    assert!(alloc.calls().is_empty());
}

#[test]
fn global_update_asks_allocator_for_global_seqno() {
    let exec = RecordingExecutor::new();
    let alloc = ScriptedAllocator::new(&[900]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let report = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Global)
        .expect("apply");

    assert_eq!(report.seqnos(), vec![900]);
    assert_eq!(alloc.calls(), vec![("DEMO".to_string(), SeqnoScope::Global)]);
    assert_eq!(exec.log()[0], "describe GLOBALSEQNO");
}

#[test]
fn failed_insert_rolls_back_both_tables() {
    let exec = RecordingExecutor::new().failing("INSERT INTO DEMO VALUES");
    let alloc = ScriptedAllocator::new(&[7]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2", "3,4"]), SeqnoScope::Local)
        .expect_err("insert rejected");

    assert_eq!(err.code(), UpdaterErrorCode::ApplyFailed);
    assert_eq!(err.root_code(), UpdaterErrorCode::Execution);
    assert!(err.to_string().contains("'2009-01-01 00:00:00' - '2009-02-01 00:00:00'"));

    let writes = exec.writes();
    assert_eq!(
        writes,
        vec![
            "DELETE FROM DEMO WHERE SEQNO=7",
            "DELETE FROM DEMOVLD WHERE SEQNO=7",
            "INSERT INTO DEMO VALUES (7,1,1,2),(7,2,3,4);",
            "DELETE FROM DEMO WHERE SEQNO=7",
            "DELETE FROM DEMOVLD WHERE SEQNO=7",
        ]
    );
}

#[test]
fn failed_vld_row_rolls_back_inserted_rows() {
    let exec = RecordingExecutor::new().failing("INSERT INTO DEMOVLD");
    let alloc = ScriptedAllocator::new(&[8]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect_err("vld row rejected");

    assert_eq!(err.root_code(), UpdaterErrorCode::Execution);
    let writes = exec.writes();
    assert_eq!(
        &writes[writes.len() - 2..],
        ["DELETE FROM DEMO WHERE SEQNO=8", "DELETE FROM DEMOVLD WHERE SEQNO=8"]
    );
}

#[test]
fn allocation_failure_writes_no_rows() {
    let exec = RecordingExecutor::new();
    let alloc = ScriptedAllocator::new(&[]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect_err("allocation");

    assert_eq!(err.root_code(), UpdaterErrorCode::Allocation);
    assert!(exec.writes().is_empty());
}

#[test]
fn dropped_connection_is_retried() {
    let exec = RecordingExecutor::new().gone_away("INSERT INTO DEMO VALUES", 2);
    let alloc = ScriptedAllocator::new(&[5]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let report = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect("third attempt succeeds");

    assert_eq!(report.seqnos(), vec![5]);
    let inserts = exec
        .writes()
        .iter()
        .filter(|s| s.starts_with("INSERT INTO DEMO VALUES"))
        .count();
    assert_eq!(inserts, 3);
}

#[test]
fn dropped_connection_gives_up_after_attempt_cap() {
    let exec = RecordingExecutor::new().gone_away("INSERT INTO DEMO VALUES", 10);
    let alloc = ScriptedAllocator::new(&[5]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect_err("exhausted");

    assert_eq!(err.root_code(), UpdaterErrorCode::TransientExhausted);
    let writes = exec.writes();
    assert_eq!(
        writes
            .iter()
            .filter(|s| s.starts_with("INSERT INTO DEMO VALUES"))
            .count(),
        3
    );
    assert_eq!(writes.last().map(String::as_str), Some("DELETE FROM DEMOVLD WHERE SEQNO=5"));
}

#[test]
fn ephemeral_run_counts_seqnos_per_table_and_creates_once() {
    let exec = RecordingExecutor::new();
    let mut updater = ephemeral_updater(UpdaterConfig::ephemeral(), &exec);
    let other = DEMO_HEADER.replace("DEMO", "OTHER");

    let report = updater
        .apply_update_reader(
            input(&[DEMO_HEADER, "1,2", DEMO_HEADER, "3,4", &other, "5,6", DEMO_HEADER, "7,8"]),
            SeqnoScope::Local,
        )
        .expect("apply");

    assert_eq!(report.seqnos(), vec![1, 2, 1, 3]);
    let writes = exec.writes();
    let creates: Vec<&String> = writes.iter().filter(|s| s.starts_with("CREATE")).collect();
    assert_eq!(creates.len(), 2);
    assert!(creates[0].starts_with("CREATE TEMPORARY TABLE DEMOVLD ("));
    assert!(creates[1].starts_with("CREATE TEMPORARY TABLE OTHERVLD ("));
    assert!(!writes.iter().any(|s| s.starts_with("DELETE")));
    assert!(writes.contains(&"INSERT INTO DEMO VALUES (3,1,7,8);".to_string()));
}

#[test]
fn raw_sql_runs_in_file_order_and_reports_no_table_data() {
    let exec = RecordingExecutor::new();
    let alloc = ScriptedAllocator::new(&[]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let report = updater
        .apply_update_reader(
            input(&["# housekeeping", "", "SQL update DEMO", "   set X=1;", "SQL select 2;"]),
            SeqnoScope::Local,
        )
        .expect("apply");

    assert_eq!(report.status, ApplyStatus::NoTableData);
    assert_eq!(report.sql_statements, 2);
    assert_eq!(exec.writes(), vec!["update DEMOset X=1;", "select 2;"]);
}

#[test]
fn blocks_before_a_bad_header_stay_applied() {
    let exec = RecordingExecutor::new().missing("GONE");
    let alloc = ScriptedAllocator::new(&[11, 12]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);
    let gone = DEMO_HEADER.replace("DEMO", "GONE");

    let err = updater
        .apply_update_reader(
            input(&[DEMO_HEADER, "1,2", &gone, "3,4", "SQL select 99;"]),
            SeqnoScope::Local,
        )
        .expect_err("second block");

    assert_eq!(err.code_str(), "table_not_found");
    let writes = exec.writes();
    assert!(writes.iter().any(|s| s.starts_with("INSERT INTO DEMOVLD VALUES (11,")));
    assert!(!writes.contains(&"select 99;".to_string()));
    assert_eq!(alloc.calls().len(), 1);
}

#[test]
fn header_without_rows_aborts_the_file() {
    let exec = RecordingExecutor::new();
    let alloc = ScriptedAllocator::new(&[1]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER]), SeqnoScope::Local)
        .expect_err("empty block");

    assert_eq!(err.code_str(), "empty_block");
    assert!(exec.writes().is_empty());
}

#[test]
fn large_blocks_are_split_into_several_inserts() {
    let exec = RecordingExecutor::new();
    let alloc = ScriptedAllocator::new(&[2]);
    let mut updater = durable_updater(
        UpdaterConfig::durable().with_max_values_bytes(100),
        &exec,
        &alloc,
    );
    let rows: Vec<String> = (0..40).map(|i| format!("{i},{}", i * 1000)).collect();
    let mut lines = vec![DEMO_HEADER];
    lines.extend(rows.iter().map(String::as_str));

    let report = updater
        .apply_update_reader(input(&lines), SeqnoScope::Local)
        .expect("apply");

    assert_eq!(report.rows_inserted(), 40);
    assert!(report.blocks[0].insert_statements > 1);
    let inserts: Vec<String> = exec
        .writes()
        .into_iter()
        .filter(|s| s.starts_with("INSERT INTO DEMO VALUES"))
        .collect();
    assert_eq!(inserts.len(), report.blocks[0].insert_statements);
    assert!(inserts[0].starts_with("INSERT INTO DEMO VALUES (2,1,0,0),(2,2,1,1000)"));
    assert!(inserts.last().expect("last").ends_with("(2,40,39,39000);"));
}

#[test]
fn failed_vld_ddl_stops_before_allocation() {
    let exec = RecordingExecutor::new().missing("DEMOVLD").failing("CREATE");
    let alloc = ScriptedAllocator::new(&[4]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect_err("ddl rejected");

    assert_eq!(err.code(), UpdaterErrorCode::ApplyFailed);
    assert_eq!(err.root_code(), UpdaterErrorCode::Execution);
    assert!(alloc.calls().is_empty());
    let writes = exec.writes();
    assert_eq!(writes.len(), 1, "{writes:#?}");
    assert!(writes[0].starts_with("CREATE TABLE DEMOVLD ("));
}

#[test]
fn ephemeral_run_does_not_repeat_failed_vld_ddl() {
    let exec = RecordingExecutor::new().failing("CREATE");
    let mut updater = ephemeral_updater(UpdaterConfig::ephemeral(), &exec);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect_err("ddl rejected");
    assert_eq!(err.root_code(), UpdaterErrorCode::Execution);

    let report = updater
        .apply_update_reader(input(&[DEMO_HEADER, "3,4"]), SeqnoScope::Local)
        .expect("second block");
    assert_eq!(report.seqnos(), vec![1]);
    assert!(!report.blocks[0].created_vld_table);

    let creates = exec
        .writes()
        .iter()
        .filter(|s| s.starts_with("CREATE"))
        .count();
    assert_eq!(creates, 1);
}

#[test]
fn failed_cleanup_delete_does_not_fail_the_block() {
    let exec = RecordingExecutor::new().failing("DELETE FROM DEMO ");
    let alloc = ScriptedAllocator::new(&[6]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let report = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect("cleanup is best effort");

    assert_eq!(report.seqnos(), vec![6]);
    let writes = exec.writes();
    assert_eq!(writes[0], "DELETE FROM DEMO WHERE SEQNO=6");
    assert_eq!(writes[1], "DELETE FROM DEMOVLD WHERE SEQNO=6");
    assert!(writes.iter().any(|s| s.starts_with("INSERT INTO DEMOVLD VALUES (6,")));
}

#[test]
fn failed_rollback_delete_keeps_the_original_error() {
    let exec = RecordingExecutor::new()
        .failing("INSERT INTO DEMO VALUES")
        .failing("DELETE FROM DEMO ");
    let alloc = ScriptedAllocator::new(&[9]);
    let mut updater = durable_updater(UpdaterConfig::durable(), &exec, &alloc);

    let err = updater
        .apply_update_reader(input(&[DEMO_HEADER, "1,2"]), SeqnoScope::Local)
        .expect_err("insert rejected");

    assert_eq!(err.root_code(), UpdaterErrorCode::Execution);
    assert!(err.to_string().contains("INSERT INTO DEMO VALUES"));
    let writes = exec.writes();
    assert_eq!(writes.last().map(String::as_str), Some("DELETE FROM DEMOVLD WHERE SEQNO=9"));
}
