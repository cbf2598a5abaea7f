//! The two apply strategies. A run picks one at start and every block of the
//! run goes through it.

use crate::error::UpdaterError;
use crate::executor::QueryChannel;
use crate::seqno::{SeqnoScope, SequenceAllocator, SequenceCounters};
use crate::sql;
use tracing::{info, warn};

pub trait UpdateBackend {
    fn channel(&mut self) -> &mut QueryChannel;

    /// Leading keywords of the VLD table DDL.
    fn create_keyword(&self) -> &'static str;

    /// Whether the VLD table still has to be created. Has no side effects.
    fn vld_table_missing(&mut self, vld_table: &str) -> Result<bool, UpdaterError>;

    /// Records that creation of `vld_table` has been attempted in this run.
    fn note_vld_table(&mut self, vld_table: &str);

    fn acquire_seqno(&mut self, table: &str, scope: SeqnoScope) -> Result<u32, UpdaterError>;

    /// Best-effort removal of everything stored under `seqno`.
    fn remove_seqno(&mut self, table: &str, seqno: u32);

    /// Simulation backends never persist anything.
    fn is_ephemeral(&self) -> bool;
}

/// Writes to a real store and takes SEQNOs from an external allocator.
pub struct DurableBackend {
    channel: QueryChannel,
    allocator: Box<dyn SequenceAllocator>,
}

impl DurableBackend {
    pub fn new(channel: QueryChannel, allocator: Box<dyn SequenceAllocator>) -> Self {
        Self { channel, allocator }
    }
}

impl UpdateBackend for DurableBackend {
    fn channel(&mut self) -> &mut QueryChannel {
        &mut self.channel
    }

    fn create_keyword(&self) -> &'static str {
        "CREATE TABLE"
    }

    fn vld_table_missing(&mut self, vld_table: &str) -> Result<bool, UpdaterError> {
        Ok(!self.channel.table_exists(vld_table)?)
    }

    fn note_vld_table(&mut self, _vld_table: &str) {}

    fn acquire_seqno(&mut self, table: &str, scope: SeqnoScope) -> Result<u32, UpdaterError> {
        info!(table, %scope, "requesting sequence number");
        let seqno = self.allocator.allocate(table, scope)?;
        info!(table, seqno, "allocated sequence number");
        // The allocator's freshness is not relied upon; clear anything left
        // under this number before writing.
        self.remove_seqno(table, seqno);
        Ok(seqno)
    }

    fn remove_seqno(&mut self, table: &str, seqno: u32) {
        for statement in sql::delete_seqno(table, seqno) {
            if let Err(err) = self.channel.query(&statement) {
                warn!(table, seqno, error = %err, "cleanup delete failed");
            }
        }
    }

    fn is_ephemeral(&self) -> bool {
        false
    }
}

/// Simulation strategy: statements go to an echoing executor, VLD tables are
/// temporary, SEQNOs come from per-run counters.
pub struct EphemeralBackend {
    channel: QueryChannel,
    counters: SequenceCounters,
}

impl EphemeralBackend {
    pub fn new(channel: QueryChannel) -> Self {
        Self {
            channel,
            counters: SequenceCounters::new(),
        }
    }

    pub fn counters(&self) -> &SequenceCounters {
        &self.counters
    }
}

impl UpdateBackend for EphemeralBackend {
    fn channel(&mut self) -> &mut QueryChannel {
        &mut self.channel
    }

    fn create_keyword(&self) -> &'static str {
        "CREATE TEMPORARY TABLE"
    }

    fn vld_table_missing(&mut self, vld_table: &str) -> Result<bool, UpdaterError> {
        Ok(!self.counters.is_created(vld_table))
    }

    fn note_vld_table(&mut self, vld_table: &str) {
        self.counters.mark_created(vld_table);
    }

    fn acquire_seqno(&mut self, table: &str, scope: SeqnoScope) -> Result<u32, UpdaterError> {
        self.counters.allocate(table, scope)
    }

    fn remove_seqno(&mut self, _table: &str, _seqno: u32) {}

    fn is_ephemeral(&self) -> bool {
        true
    }
}
