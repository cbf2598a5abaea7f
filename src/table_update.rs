use crate::backend::UpdateBackend;
use crate::block::BlockHeader;
use crate::config::{DEFAULT_MAX_VALUES_BYTES, UpdaterConfig};
use crate::error::{BlockError, UpdaterError};
use crate::rows::RowCollector;
use crate::seqno::SeqnoScope;
use crate::sql;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub const INSERT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lifecycle of one block.
///
/// `Building -> {Failed | Ready} -> Applying -> {Applied | Failed}`. Both
/// `Failed` and `Applied` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    Building,
    Ready,
    Applying,
    Applied,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSettings {
    pub scope: SeqnoScope,
    pub convert_unsigned: bool,
    pub max_values_bytes: usize,
}

impl BlockSettings {
    pub fn new(scope: SeqnoScope) -> Self {
        Self {
            scope,
            convert_unsigned: false,
            max_values_bytes: DEFAULT_MAX_VALUES_BYTES,
        }
    }

    pub fn from_config(config: &UpdaterConfig, scope: SeqnoScope) -> Self {
        Self {
            scope,
            convert_unsigned: config.convert_unsigned,
            max_values_bytes: config.max_values_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub table: String,
    pub seqno: u32,
    pub rows: usize,
    pub insert_statements: usize,
    pub converted_unsigned: usize,
    pub created_vld_table: bool,
}

/// One `BEGIN_TABLE` block: header, collected rows and its apply state.
#[derive(Debug)]
pub struct TableUpdate {
    header: Option<BlockHeader>,
    rows: RowCollector,
    settings: BlockSettings,
    state: BlockState,
    failure: Option<BlockError>,
    seqno: Option<u32>,
}

impl TableUpdate {
    /// Parses and validates a header line. Validation problems leave the
    /// block in `Failed` state with the reason in [`TableUpdate::failure`];
    /// `Err` is only returned when the store could not be asked at all.
    pub fn begin(
        line: &str,
        settings: BlockSettings,
        backend: &mut dyn UpdateBackend,
    ) -> Result<Self, UpdaterError> {
        let mut block = Self {
            header: None,
            rows: RowCollector::new(settings.convert_unsigned),
            settings,
            state: BlockState::Building,
            failure: None,
            seqno: None,
        };
        let header = match BlockHeader::parse(line) {
            Ok(header) => header,
            Err(err) => {
                block.fail(err);
                return Ok(block);
            }
        };
        if !backend.channel().table_exists(&header.table_name)? {
            block.fail(BlockError::TableNotFound {
                table: header.table_name.clone(),
            });
            return Ok(block);
        }
        if let Err(err) = header.check_dates(line) {
            block.fail(err);
            return Ok(block);
        }
        block.header = Some(header);
        block.state = BlockState::Ready;
        Ok(block)
    }

    fn fail(&mut self, err: BlockError) {
        error!("failing update; {err}");
        self.failure = Some(err);
        self.state = BlockState::Failed;
    }

    pub fn header(&self) -> Option<&BlockHeader> {
        self.header.as_ref()
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn failure(&self) -> Option<&BlockError> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.state == BlockState::Failed
    }

    pub fn is_applied(&self) -> bool {
        self.state == BlockState::Applied
    }

    pub fn seqno(&self) -> Option<u32> {
        self.seqno
    }

    pub fn rows(&self) -> &[String] {
        self.rows.rows()
    }

    pub fn converted_unsigned(&self) -> usize {
        self.rows.converted()
    }

    /// Adds a data row. Rows for a failed block are dropped silently; rows
    /// arriving once apply has started are refused.
    pub fn add_row(&mut self, line: &str) -> Result<(), UpdaterError> {
        match self.state {
            BlockState::Building | BlockState::Ready => {
                self.rows.push(line);
                Ok(())
            }
            BlockState::Failed => Ok(()),
            BlockState::Applying | BlockState::Applied => Err(self.closed_error().into()),
        }
    }

    pub fn can_apply(&self) -> bool {
        self.state == BlockState::Ready && !self.rows.is_empty()
    }

    pub fn apply(&mut self, backend: &mut dyn UpdateBackend) -> Result<BlockReport, UpdaterError> {
        let now = chrono::Local::now().format(INSERT_DATE_FORMAT).to_string();
        self.apply_at(backend, &now)
    }

    /// Applies the block with a fixed insertion timestamp.
    ///
    /// Fails without side effects unless [`TableUpdate::can_apply`] holds. Any
    /// failure after that point leaves the block `Failed`; once a SEQNO has
    /// been acquired the backend is asked to remove what was written under it
    /// before the error is returned.
    pub fn apply_at(
        &mut self,
        backend: &mut dyn UpdateBackend,
        insert_date: &str,
    ) -> Result<BlockReport, UpdaterError> {
        if !self.can_apply() {
            return Err(self.refusal().into());
        }
        self.state = BlockState::Applying;
        match self.run_apply(backend, insert_date) {
            Ok(report) => {
                self.state = BlockState::Applied;
                Ok(report)
            }
            Err(err) => {
                self.state = BlockState::Failed;
                let (table, start_date, end_date) = self
                    .header
                    .as_ref()
                    .map(|h| (h.table_name.clone(), h.start_date.clone(), h.end_date.clone()))
                    .unwrap_or_default();
                Err(UpdaterError::ApplyFailed {
                    table,
                    start_date,
                    end_date,
                    source: Box::new(err),
                })
            }
        }
    }

    fn run_apply(
        &mut self,
        backend: &mut dyn UpdateBackend,
        insert_date: &str,
    ) -> Result<BlockReport, UpdaterError> {
        let Some(header) = self.header.as_ref() else {
            return Err(self.closed_error().into());
        };
        let table = header.table_name.as_str();
        let vld_table = header.vld_table();
        let announce = !backend.is_ephemeral();

        let created_vld_table = backend.vld_table_missing(&vld_table)?;
        if created_vld_table {
            // Never retried within a run, even if the DDL below fails.
            backend.note_vld_table(&vld_table);
            if announce {
                info!(table = %vld_table, "creating table");
            }
            let ddl = sql::create_vld_table(backend.create_keyword(), header);
            backend.channel().query(&ddl)?;
        }

        if announce {
            info!(
                table,
                start = %header.start_date,
                end = %header.end_date,
                aggregate = header.aggregate_number,
                task = header.task,
                "applying update"
            );
            if self.rows.converted() > 0 {
                info!(
                    converted = self.rows.converted(),
                    "unsigned integers converted before applying update"
                );
            }
        }

        let seqno = backend.acquire_seqno(table, self.settings.scope)?;
        self.seqno = Some(seqno);

        let inserts = sql::insert_rows(
            table,
            seqno,
            self.rows.rows(),
            self.settings.max_values_bytes,
        );
        let insert_statements = inserts.len();
        for statement in inserts {
            if let Err(err) = backend.channel().query(&statement) {
                rollback(backend, table, seqno);
                return Err(err);
            }
        }

        let vld_row = sql::insert_vld_row(header, seqno, insert_date);
        if let Err(err) = backend.channel().query(&vld_row) {
            rollback(backend, table, seqno);
            return Err(err);
        }

        Ok(BlockReport {
            table: table.to_string(),
            seqno,
            rows: self.rows.len(),
            insert_statements,
            converted_unsigned: self.rows.converted(),
            created_vld_table,
        })
    }

    fn table_name(&self) -> String {
        self.header
            .as_ref()
            .map(|h| h.table_name.clone())
            .unwrap_or_default()
    }

    fn closed_error(&self) -> BlockError {
        BlockError::Closed {
            table: self.table_name(),
        }
    }

    fn refusal(&self) -> BlockError {
        match (&self.failure, self.state) {
            (Some(failure), _) => failure.clone(),
            (None, BlockState::Ready | BlockState::Building) => BlockError::Empty {
                table: self.table_name(),
            },
            (None, _) => self.closed_error(),
        }
    }
}

fn rollback(backend: &mut dyn UpdateBackend, table: &str, seqno: u32) {
    error!(table, seqno, "update has failed, attempting to remove any data");
    backend.remove_seqno(table, seqno);
}
