use super::{ExecOutput, SqlExecutor};
use crate::config::DEFAULT_MAX_ATTEMPTS;
use crate::error::UpdaterError;
use tracing::{debug, error, warn};

/// Client exit code reported when the server connection could not be used.
const CONNECTION_FAILURE_EXIT_CODE: i32 = 1;

const CONNECTION_LOST_MARKERS: [&str; 2] = [
    "connection to MySQL server during",
    "server has gone away",
];

/// Whether a failed invocation looks like a dropped connection worth retrying.
pub fn is_connection_lost(output: &ExecOutput) -> bool {
    output.exit_code == CONNECTION_FAILURE_EXIT_CODE
        && output
            .lines
            .iter()
            .any(|line| CONNECTION_LOST_MARKERS.iter().any(|m| line.contains(m)))
}

/// Executor wrapper that retries statements lost to a dropped connection.
pub struct QueryChannel {
    executor: Box<dyn SqlExecutor>,
    max_attempts: u32,
    results: Vec<String>,
    statements: usize,
}

impl QueryChannel {
    pub fn new(executor: Box<dyn SqlExecutor>) -> Self {
        Self::with_max_attempts(executor, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(executor: Box<dyn SqlExecutor>, max_attempts: u32) -> Self {
        Self {
            executor,
            max_attempts: max_attempts.max(1),
            results: Vec::new(),
            statements: 0,
        }
    }

    /// Output lines of the most recent attempt.
    pub fn results(&self) -> &[String] {
        &self.results
    }

    /// Statements that completed successfully through this channel.
    pub fn statements_executed(&self) -> usize {
        self.statements
    }

    pub fn query(&mut self, sql: &str) -> Result<Vec<String>, UpdaterError> {
        self.run(sql, true)
    }

    /// Like `query`, but a rejected statement is not logged as an error.
    pub fn query_quiet(&mut self, sql: &str) -> Result<Vec<String>, UpdaterError> {
        self.run(sql, false)
    }

    pub fn table_exists(&mut self, table: &str) -> Result<bool, UpdaterError> {
        let Some(probe) = self.executor.table_probe(table) else {
            return Ok(true);
        };
        match self.run(&probe, false) {
            Ok(_) => Ok(true),
            Err(UpdaterError::Execution { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn run(&mut self, sql: &str, log_errors: bool) -> Result<Vec<String>, UpdaterError> {
        let mut attempts = 0u32;
        loop {
            if attempts >= self.max_attempts {
                error!(
                    attempts,
                    "client has failed to execute the statement on all attempts, aborting"
                );
                return Err(UpdaterError::TransientExhausted {
                    attempts,
                    statement: sql.to_string(),
                });
            }
            if attempts > 0 {
                warn!(attempt = attempts + 1, "previous client invocation failed; retrying");
            }
            self.results.clear();
            debug!(statement = sql, "executing");
            let output = self.executor.execute(sql)?;
            attempts += 1;
            if log_errors && !output.success() {
                error!(exit_code = output.exit_code, "query failed");
                for line in &output.lines {
                    error!("sql error log: {line}");
                }
            }
            self.results = output.lines.clone();
            if is_connection_lost(&output) {
                continue;
            }
            if !output.success() {
                return Err(UpdaterError::Execution {
                    statement: sql.to_string(),
                    exit_code: output.exit_code,
                    output: output.lines,
                });
            }
            self.statements += 1;
            return Ok(output.lines);
        }
    }
}
