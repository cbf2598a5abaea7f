pub mod channel;
pub mod echo;
pub mod mysql;

use crate::error::UpdaterError;

pub use channel::QueryChannel;
pub use echo::EchoExecutor;
pub use mysql::MysqlClientExecutor;

/// Result of running one statement through an executor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    /// Client exit code; `0` is success.
    pub exit_code: i32,
    /// Captured output, one trimmed line per entry.
    pub lines: Vec<String>,
}

impl ExecOutput {
    pub fn ok(lines: Vec<String>) -> Self {
        Self { exit_code: 0, lines }
    }

    pub fn failed(exit_code: i32, lines: Vec<String>) -> Self {
        Self { exit_code, lines }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability to run SQL text against a backing store.
///
/// `Err` is reserved for failures to reach the client at all; a statement the
/// store rejects comes back as an `ExecOutput` with a non-zero exit code.
pub trait SqlExecutor {
    fn execute(&mut self, sql: &str) -> Result<ExecOutput, UpdaterError>;

    /// Statement whose success proves `table` exists. `None` means the
    /// executor cannot look and every table is assumed present.
    fn table_probe(&self, table: &str) -> Option<String> {
        Some(format!("describe {table}"))
    }
}

impl<E: SqlExecutor + ?Sized> SqlExecutor for Box<E> {
    fn execute(&mut self, sql: &str) -> Result<ExecOutput, UpdaterError> {
        (**self).execute(sql)
    }

    fn table_probe(&self, table: &str) -> Option<String> {
        (**self).table_probe(table)
    }
}
