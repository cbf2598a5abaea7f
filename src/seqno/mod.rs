pub mod counters;
pub mod external;

use crate::error::UpdaterError;
use serde::{Deserialize, Serialize};

pub use counters::SequenceCounters;
pub use external::ExternalAllocator;

/// Whether a sequence number must be unique across the deployment or only
/// within the connected store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeqnoScope {
    Local,
    Global,
}

impl SeqnoScope {
    pub fn is_global(self) -> bool {
        matches!(self, SeqnoScope::Global)
    }
}

impl std::fmt::Display for SeqnoScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeqnoScope::Local => write!(f, "local"),
            SeqnoScope::Global => write!(f, "global"),
        }
    }
}

/// Capability to mint a fresh SEQNO for a table.
pub trait SequenceAllocator {
    fn allocate(&mut self, table: &str, scope: SeqnoScope) -> Result<u32, UpdaterError>;
}

impl<A: SequenceAllocator + ?Sized> SequenceAllocator for Box<A> {
    fn allocate(&mut self, table: &str, scope: SeqnoScope) -> Result<u32, UpdaterError> {
        (**self).allocate(table, scope)
    }
}
