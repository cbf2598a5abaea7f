use super::{ExecOutput, SqlExecutor};
use crate::access::AccessConfig;
use crate::error::UpdaterError;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Runs each statement through a command-line SQL client, piping the text to
/// its stdin.
pub struct MysqlClientExecutor {
    program: String,
    args: Vec<String>,
}

impl MysqlClientExecutor {
    pub fn new(program: impl Into<String>, access: &AccessConfig) -> Self {
        Self {
            program: program.into(),
            args: access.client_args(),
        }
    }

    pub fn with_args(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl SqlExecutor for MysqlClientExecutor {
    fn execute(&mut self, sql: &str) -> Result<ExecOutput, UpdaterError> {
        let spawn_err = |source| UpdaterError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            // A client that quits early (bad login, lost server) closes its
            // stdin; its exit code and output still say why.
            match stdin.write_all(sql.as_bytes()) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    debug!(
                        program = %self.program,
                        "client closed stdin before reading the statement"
                    );
                }
                Err(err) => {
                    drop(stdin);
                    let _ = child.wait();
                    return Err(err.into());
                }
            }
        }
        let output = child.wait_with_output()?;
        let lines = String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .map(|line| line.trim().to_string())
            .collect();
        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            lines,
        })
    }
}
