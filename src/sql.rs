use crate::block::{BlockHeader, DETECTOR_MASK, vld_table_name};

/// DDL for the validity table of `header.table_name`. EPOCH and REALITY are
/// only present when the header sets an epoch.
pub fn create_vld_table(create_keyword: &str, header: &BlockHeader) -> String {
    let mut sql = format!("{create_keyword} {} (", header.vld_table());
    sql.push_str("SEQNO integer not null primary key,");
    sql.push_str("TIMESTART datetime not null,");
    sql.push_str("TIMEEND datetime not null,");
    if header.epoch.is_some() {
        sql.push_str("EPOCH tinyint(4),");
        sql.push_str("REALITY tinyint(4),");
    }
    sql.push_str("DETECTORMASK tinyint(4),");
    sql.push_str("SIMMASK tinyint(4),");
    sql.push_str("TASK integer,");
    sql.push_str("AGGREGATENO integer,");
    sql.push_str("CREATIONDATE datetime not null,");
    sql.push_str("INSERTDATE datetime not null,");
    sql.push_str("key TIMESTART (TIMESTART), ");
    sql.push_str("key TIMEEND (TIMEEND));");
    sql
}

/// Builds `INSERT INTO <table> VALUES (seqno,row_counter,<row>),...;`
/// statements, starting a new statement whenever the value list would grow
/// past `max_values_bytes`.
///
/// A single tuple longer than the limit is emitted on its own rather than
/// dropped.
pub fn insert_rows(table: &str, seqno: u32, rows: &[String], max_values_bytes: usize) -> Vec<String> {
    let mut statements = Vec::new();
    let mut values = String::new();
    for (idx, row) in rows.iter().enumerate() {
        let tuple = format!("({seqno},{},{row})", idx + 1);
        if !values.is_empty() && values.len() + 1 + tuple.len() > max_values_bytes {
            statements.push(format!("INSERT INTO {table} VALUES {values};"));
            values.clear();
        }
        if !values.is_empty() {
            values.push(',');
        }
        values.push_str(&tuple);
    }
    if !values.is_empty() {
        statements.push(format!("INSERT INTO {table} VALUES {values};"));
    }
    statements
}

/// The single validity row describing a block. `insert_date` is the wall-clock
/// insertion time in `YYYY-MM-DD HH:MM:SS` form.
pub fn insert_vld_row(header: &BlockHeader, seqno: u32, insert_date: &str) -> String {
    let mut sql = format!(
        "INSERT INTO {} VALUES ({seqno}, '{}', '{}', ",
        header.vld_table(),
        header.start_date,
        header.end_date
    );
    if let Some(epoch) = header.epoch {
        sql.push_str(&format!("{epoch}, 0, "));
    }
    sql.push_str(&format!(
        "'{DETECTOR_MASK}', '{}', {}, {}, '{}', '{insert_date}');",
        header.sim_mask.value(),
        header.task,
        header.aggregate_number,
        header.creation_date
    ));
    sql
}

/// Deletes for every row stored under `seqno`, base table first.
pub fn delete_seqno(table: &str, seqno: u32) -> [String; 2] {
    [
        format!("DELETE FROM {table} WHERE SEQNO={seqno}"),
        format!("DELETE FROM {} WHERE SEQNO={seqno}", vld_table_name(table)),
    ]
}
