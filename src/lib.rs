pub mod access;
pub mod backend;
pub mod block;
pub mod config;
pub mod error;
pub mod executor;
pub mod rows;
pub mod seqno;
pub mod sql;
pub mod stream;
pub mod table_update;

pub use access::AccessConfig;
pub use backend::{DurableBackend, EphemeralBackend, UpdateBackend};
pub use block::{BlockHeader, SimMask};
pub use config::UpdaterConfig;
pub use error::{BlockError, UpdaterError, UpdaterErrorCode};
pub use executor::{EchoExecutor, ExecOutput, MysqlClientExecutor, QueryChannel, SqlExecutor};
pub use seqno::{ExternalAllocator, SeqnoScope, SequenceAllocator, SequenceCounters};
pub use stream::{ApplyReport, ApplyStatus, UpdateStream, open_update_file};
pub use table_update::{BlockReport, BlockSettings, BlockState, TableUpdate};

use std::io::BufRead;
use std::path::Path;
use tracing::{info, warn};

/// Table whose presence marks the connected store as authorising, i.e. able
/// to hand out globally unique sequence numbers.
pub const GLOBAL_SEQNO_TABLE: &str = "GLOBALSEQNO";
pub const LOCAL_SEQNO_TABLE: &str = "LOCALSEQNO";

const CONNECTION_PROBE: &str = "select 1";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropReport {
    /// Tables actually dropped, base table first.
    pub dropped: Vec<String>,
    /// Sequence tables whose entries for the dropped table were removed.
    pub cleared_seqno_tables: Vec<String>,
}

/// One updater run: a validated config and the backend every block of the
/// run is applied through.
pub struct Updater {
    config: UpdaterConfig,
    backend: Box<dyn UpdateBackend>,
}

impl Updater {
    /// Builds the backend the config asks for.
    ///
    /// Durable runs read the account from the environment and fail with
    /// `Unavailable` unless the store answers a trivial query.
    pub fn open(config: UpdaterConfig) -> Result<Self, UpdaterError> {
        config.validate()?;
        if config.temporary_tables {
            info!("temporary tables mode; statements are printed, not executed");
            let channel = QueryChannel::with_max_attempts(
                Box::new(EchoExecutor::stdout()),
                config.max_attempts,
            );
            return Self::with_backend(config, Box::new(EphemeralBackend::new(channel)));
        }

        let access = AccessConfig::from_env()?;
        let executor = MysqlClientExecutor::new(config.client_program.clone(), &access);
        let mut channel = QueryChannel::with_max_attempts(Box::new(executor), config.max_attempts);
        if let Err(err) = channel.query_quiet(CONNECTION_PROBE) {
            warn!(error = %err, "connection probe failed");
            return Err(UpdaterError::Unavailable {
                account: access.redacted(),
            });
        }
        info!(host = %access.host, database = %access.database, "connected");
        let allocator = ExternalAllocator::new(config.allocator_program.clone());
        let backend = DurableBackend::new(channel, Box::new(allocator));
        Self::with_backend(config, Box::new(backend))
    }

    pub fn with_backend(
        config: UpdaterConfig,
        backend: Box<dyn UpdateBackend>,
    ) -> Result<Self, UpdaterError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn backend(&mut self) -> &mut dyn UpdateBackend {
        self.backend.as_mut()
    }

    pub fn is_authorising(&mut self) -> Result<bool, UpdaterError> {
        self.backend.channel().table_exists(GLOBAL_SEQNO_TABLE)
    }

    pub fn apply_update_file(
        &mut self,
        path: &Path,
        scope: SeqnoScope,
    ) -> Result<ApplyReport, UpdaterError> {
        self.check_scope(scope)?;
        info!(path = %path.display(), %scope, "applying update file");
        let reader = open_update_file(path)?;
        self.stream(reader, scope)
    }

    /// Applies an update read from `reader`. A global update is refused
    /// before anything is read unless the store is authorising.
    pub fn apply_update_reader<R: BufRead>(
        &mut self,
        reader: R,
        scope: SeqnoScope,
    ) -> Result<ApplyReport, UpdaterError> {
        self.check_scope(scope)?;
        self.stream(reader, scope)
    }

    fn check_scope(&mut self, scope: SeqnoScope) -> Result<(), UpdaterError> {
        if !scope.is_global() {
            return Ok(());
        }
        if self.backend.is_ephemeral() {
            return Err(UpdaterError::InvalidConfig {
                message: "temporary tables mode only supports local updates".into(),
            });
        }
        if !self.is_authorising()? {
            return Err(UpdaterError::NotAuthorising);
        }
        Ok(())
    }

    fn stream<R: BufRead>(
        &mut self,
        reader: R,
        scope: SeqnoScope,
    ) -> Result<ApplyReport, UpdaterError> {
        let settings = BlockSettings::from_config(&self.config, scope);
        let report = UpdateStream::new(self.backend.as_mut(), settings).apply(reader)?;
        match report.status {
            ApplyStatus::Applied => info!(
                blocks = report.blocks_applied(),
                rows = report.rows_inserted(),
                "update applied"
            ),
            ApplyStatus::NoTableData => info!("update file holds no table data"),
        }
        Ok(report)
    }

    /// Drops `name` and its VLD table, then forgets its sequence entries.
    /// Missing tables are skipped.
    pub fn drop_table(&mut self, name: &str) -> Result<DropReport, UpdaterError> {
        if self.backend.is_ephemeral() {
            return Err(UpdaterError::InvalidConfig {
                message: "drop_table is not available in temporary tables mode".into(),
            });
        }
        let channel = self.backend.channel();
        let mut report = DropReport::default();
        for table in [name.to_string(), block::vld_table_name(name)] {
            if channel.table_exists(&table)? {
                info!(table = %table, "dropping table");
                channel.query(&format!("DROP TABLE {table};"))?;
                report.dropped.push(table);
            }
        }
        for seqno_table in [LOCAL_SEQNO_TABLE, GLOBAL_SEQNO_TABLE] {
            if channel.table_exists(seqno_table)? {
                channel.query(&format!(
                    "DELETE FROM {seqno_table} WHERE TABLENAME='{name}';"
                ))?;
                report.cleared_seqno_tables.push(seqno_table.to_string());
            }
        }
        Ok(report)
    }
}
