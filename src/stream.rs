//! Update-file driver.
//!
//! An update file holds, in any order:
//! - blank lines and `#` comments, which are skipped;
//! - `SQL <statement>;` raw statements, possibly continued over several lines;
//! - `BEGIN_TABLE ...` headers, each followed by comma-separated data rows.

use crate::backend::UpdateBackend;
use crate::error::UpdaterError;
use crate::table_update::{BlockReport, BlockSettings, TableUpdate};
use flate2::read::GzDecoder;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error};

static SQL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*SQL(?:\s+(.*))?$").expect("valid sql regex"));
static HEADER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*BEGIN_TABLE").expect("valid header marker"));
static SQL_END_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*$").expect("valid terminator regex"));

/// Opens an update file, decompressing `.gz` and `.zst` files on the fly.
pub fn open_update_file(path: &Path) -> Result<Box<dyn BufRead>, UpdaterError> {
    let file = File::open(path)?;
    let name = path.to_string_lossy();
    if name.ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else if name.ends_with(".zst") {
        Ok(Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?)))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyStatus {
    /// At least one table block was applied.
    Applied,
    /// The file held no table blocks; any raw SQL in it was still executed.
    NoTableData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub status: ApplyStatus,
    pub sql_statements: usize,
    pub blocks: Vec<BlockReport>,
}

impl ApplyReport {
    pub fn blocks_applied(&self) -> usize {
        self.blocks.len()
    }

    pub fn rows_inserted(&self) -> usize {
        self.blocks.iter().map(|b| b.rows).sum()
    }

    pub fn seqnos(&self) -> Vec<u32> {
        self.blocks.iter().map(|b| b.seqno).collect()
    }
}

/// Applies one update file, top to bottom, one block at a time.
pub struct UpdateStream<'a> {
    backend: &'a mut dyn UpdateBackend,
    settings: BlockSettings,
}

impl<'a> UpdateStream<'a> {
    pub fn new(backend: &'a mut dyn UpdateBackend, settings: BlockSettings) -> Self {
        Self { backend, settings }
    }

    /// Stops at the first bad header, rejected statement or failed block.
    /// Blocks applied before the failure stay applied.
    pub fn apply<R: BufRead>(&mut self, reader: R) -> Result<ApplyReport, UpdaterError> {
        let mut report = ApplyReport {
            status: ApplyStatus::NoTableData,
            sql_statements: 0,
            blocks: Vec::new(),
        };
        let mut current: Option<TableUpdate> = None;
        let mut lines = reader.lines().enumerate();

        while let Some((idx, line)) = lines.next() {
            let line = line?;
            let line_no = idx + 1;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if let Some(caps) = SQL_REGEX.captures(line.trim_end()) {
                let mut sql = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
                while !SQL_END_REGEX.is_match(&sql) {
                    let Some((_, next)) = lines.next() else {
                        return Err(UpdaterError::UnterminatedSql {
                            line_no,
                            statement: sql,
                        });
                    };
                    sql.push_str(next?.trim());
                }
                debug!(line_no, "executing raw SQL");
                self.backend.channel().query(&sql)?;
                report.sql_statements += 1;
                continue;
            }

            if HEADER_MARKER.is_match(&line) {
                if let Some(mut block) = current.take() {
                    report.blocks.push(self.finish(&mut block)?);
                }
                let block = TableUpdate::begin(&line, self.settings, self.backend)?;
                if let Some(failure) = block.failure() {
                    error!(line_no, "aborting; update file contains a bad update");
                    return Err(failure.clone().into());
                }
                current = Some(block);
                continue;
            }

            match current.as_mut() {
                Some(block) => block.add_row(&line)?,
                None => return Err(UpdaterError::RowOutsideBlock { line_no }),
            }
        }

        if let Some(mut block) = current.take() {
            report.blocks.push(self.finish(&mut block)?);
        }
        if !report.blocks.is_empty() {
            report.status = ApplyStatus::Applied;
        }
        Ok(report)
    }

    fn finish(&mut self, block: &mut TableUpdate) -> Result<BlockReport, UpdaterError> {
        block.apply(self.backend).inspect_err(|err| {
            error!(error = %err, "aborting; update file contains a bad update");
        })
    }
}
