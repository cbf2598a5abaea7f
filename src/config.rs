use crate::error::UpdaterError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_VALUES_BYTES: usize = 2000;

/// Runtime configuration for one updater run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Rewrite integer fields above `i32::MAX` as their signed 32-bit value.
    /// Must not be used for tables holding BIGINT columns.
    pub convert_unsigned: bool,
    /// Never touch a store: print statements, use `CREATE TEMPORARY TABLE`
    /// and hand out sequence numbers from in-process counters.
    pub temporary_tables: bool,
    /// Client invocations per statement when the connection drops.
    pub max_attempts: u32,
    /// Upper bound on the value-list text of a single INSERT statement.
    pub max_values_bytes: usize,
    pub client_program: String,
    pub allocator_program: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            convert_unsigned: false,
            temporary_tables: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_values_bytes: DEFAULT_MAX_VALUES_BYTES,
            client_program: "mysql".into(),
            allocator_program: "allocate_seq_no.exe".into(),
        }
    }
}

impl UpdaterConfig {
    pub fn durable() -> Self {
        Self::default()
    }

    pub fn ephemeral() -> Self {
        Self {
            temporary_tables: true,
            ..Self::default()
        }
    }

    pub fn with_convert_unsigned(mut self, convert_unsigned: bool) -> Self {
        self.convert_unsigned = convert_unsigned;
        self
    }

    pub fn with_max_values_bytes(mut self, max_values_bytes: usize) -> Self {
        self.max_values_bytes = max_values_bytes;
        self
    }

    pub fn from_json_file(path: &Path) -> Result<Self, UpdaterError> {
        let bytes = std::fs::read(path)?;
        let config: Self =
            serde_json::from_slice(&bytes).map_err(|e| UpdaterError::InvalidConfig {
                message: format!("{}: {e}", path.display()),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), UpdaterError> {
        if self.max_attempts == 0 {
            return Err(UpdaterError::InvalidConfig {
                message: "max_attempts must be at least 1".into(),
            });
        }
        if self.max_values_bytes == 0 {
            return Err(UpdaterError::InvalidConfig {
                message: "max_values_bytes must be positive".into(),
            });
        }
        Ok(())
    }
}
