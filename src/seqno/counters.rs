use super::{SeqnoScope, SequenceAllocator};
use crate::error::UpdaterError;
use std::collections::{HashMap, HashSet};

/// In-process SEQNO state for simulation runs.
///
/// Lives for one update-file pass; keyed by VLD table name so repeated blocks
/// for the same table keep counting from where the previous block stopped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SequenceCounters {
    next: HashMap<String, u32>,
    created: HashSet<String>,
}

impl SequenceCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a VLD table of this name has been created during this run.
    pub fn is_created(&self, vld_table: &str) -> bool {
        self.created.contains(vld_table)
    }

    pub fn mark_created(&mut self, vld_table: &str) {
        self.created.insert(vld_table.to_string());
    }

    /// SEQNO the next allocation for `vld_table` would return.
    pub fn peek(&self, vld_table: &str) -> u32 {
        self.next.get(vld_table).copied().unwrap_or(1)
    }

    pub fn next_seqno(&mut self, vld_table: &str) -> u32 {
        let slot = self.next.entry(vld_table.to_string()).or_insert(1);
        let seqno = *slot;
        *slot += 1;
        seqno
    }
}

impl SequenceAllocator for SequenceCounters {
    fn allocate(&mut self, table: &str, _scope: SeqnoScope) -> Result<u32, UpdaterError> {
        Ok(self.next_seqno(&format!("{table}VLD")))
    }
}
