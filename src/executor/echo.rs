use super::{ExecOutput, SqlExecutor};
use crate::error::UpdaterError;
use std::io::{self, Write};

/// Simulation executor: writes every statement to `out` instead of running it.
pub struct EchoExecutor<W: Write = io::Stdout> {
    out: W,
}

impl EchoExecutor<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> EchoExecutor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SqlExecutor for EchoExecutor<W> {
    fn execute(&mut self, sql: &str) -> Result<ExecOutput, UpdaterError> {
        writeln!(self.out, "{sql}")?;
        self.out.flush()?;
        Ok(ExecOutput::ok(vec![sql.to_string()]))
    }

    // No store behind it, so referenced tables are taken on trust.
    fn table_probe(&self, _table: &str) -> Option<String> {
        None
    }
}
