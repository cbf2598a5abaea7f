use super::{SeqnoScope, SequenceAllocator};
use crate::error::UpdaterError;
use regex::Regex;
use std::process::Command;
use std::sync::LazyLock;
use tracing::debug;

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("valid integer regex"));

/// Delegates allocation to an external program invoked as
/// `<program> <table> <1|-1>`, where `1` demands a global and `-1` a local
/// SEQNO. The program prints the SEQNO (or `0` on failure) on its last line.
pub struct ExternalAllocator {
    program: String,
}

impl ExternalAllocator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SequenceAllocator for ExternalAllocator {
    fn allocate(&mut self, table: &str, scope: SeqnoScope) -> Result<u32, UpdaterError> {
        let require_global = if scope.is_global() { "1" } else { "-1" };
        debug!(program = %self.program, table, require_global, "requesting sequence number");
        let output = Command::new(&self.program)
            .arg(table)
            .arg(require_global)
            .output()
            .map_err(|source| UpdaterError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let last_line = stdout.lines().last().unwrap_or_default();
        parse_seqno(last_line).ok_or_else(|| UpdaterError::Allocation {
            table: table.to_string(),
            message: format!("no sequence number in allocator output '{}'", last_line.trim()),
        })
    }
}

/// First integer in `line`, unless it is zero (the allocator's failure value).
pub fn parse_seqno(line: &str) -> Option<u32> {
    FIRST_INTEGER
        .captures(line)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|seqno| *seqno != 0)
}
