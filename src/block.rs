//! The `BEGIN_TABLE` header grammar:
//!
//! ```text
//! BEGIN_TABLE <name> '<start>' '<end>' <aggregate> '<creation>' [<task>] [<key>=<value>]*
//! ```
//!
//! Recognised keys (case-insensitive) are `task`, `simmask` and `epoch`.

use crate::error::BlockError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const DETECTOR_MASK: i32 = 1;
pub const MAX_EPOCH: u8 = 100;

static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^BEGIN_TABLE\s+(\w+)\s+'(.*?)'\s+'(.*?)'\s+(\d+)\s+'(.*?)'(?:\s+(.*))?$")
        .expect("valid header regex")
});
static LEADING_TASK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)(?:\s+(.*))?$").expect("valid task regex"));
static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d\d\d\d-\d\d-\d\d \d\d:\d\d:\d\d").expect("valid date regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimMask {
    #[default]
    Data,
    Mc,
    All,
}

impl SimMask {
    pub fn value(self) -> i32 {
        match self {
            SimMask::Data => 1,
            SimMask::Mc => 4,
            SimMask::All => -1,
        }
    }

    fn from_option(value: &str) -> Option<Self> {
        match value {
            "data" => Some(SimMask::Data),
            "mc" => Some(SimMask::Mc),
            "all" => Some(SimMask::All),
            _ => None,
        }
    }
}

/// Parsed `BEGIN_TABLE` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub table_name: String,
    pub start_date: String,
    pub end_date: String,
    pub aggregate_number: u64,
    pub creation_date: String,
    pub task: i64,
    pub sim_mask: SimMask,
    /// When set, a VLD table created for this block carries EPOCH and REALITY.
    pub epoch: Option<u8>,
}

impl BlockHeader {
    /// Parses the header grammar. Does not consult the store; see
    /// [`BlockHeader::check_dates`] and the table existence check in
    /// `TableUpdate::begin`.
    pub fn parse(line: &str) -> Result<Self, BlockError> {
        let line = line.trim();
        let caps = HEADER_REGEX.captures(line).ok_or_else(|| BlockError::Parse {
            line: line.to_string(),
        })?;
        let aggregate_number = caps[4].parse::<u64>().map_err(|_| BlockError::Parse {
            line: line.to_string(),
        })?;
        let mut header = Self {
            table_name: caps[1].to_string(),
            start_date: caps[2].to_string(),
            end_date: caps[3].to_string(),
            aggregate_number,
            creation_date: caps[5].to_string(),
            task: 0,
            sim_mask: SimMask::Data,
            epoch: None,
        };
        if let Some(options) = caps.get(6) {
            header.apply_options(&options.as_str().to_lowercase())?;
        }
        Ok(header)
    }

    fn apply_options(&mut self, options: &str) -> Result<(), BlockError> {
        let mut rest = options;
        // A bare leading integer is the task; a later `task=` still overrides it.
        if let Some(caps) = LEADING_TASK_REGEX.captures(options) {
            let task = caps.get(1).map_or("", |m| m.as_str());
            self.task = task.parse().map_err(|_| BlockError::BadValue {
                key: "task".into(),
                value: task.to_string(),
            })?;
            rest = caps.get(2).map_or("", |m| m.as_str());
        }
        let mut tokens = rest.split_whitespace();
        while let Some(token) = tokens.next() {
            let Some((key, value)) = token
                .rsplit_once('=')
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            else {
                let remaining: Vec<&str> = std::iter::once(token).chain(tokens).collect();
                return Err(BlockError::Options {
                    options: remaining.join(" "),
                });
            };
            match key {
                "task" => {
                    self.task = value.parse().map_err(|_| bad_value(key, value))?;
                }
                "simmask" => {
                    self.sim_mask =
                        SimMask::from_option(value).ok_or_else(|| bad_value(key, value))?;
                }
                "epoch" => {
                    let epoch = value
                        .parse::<i64>()
                        .ok()
                        .and_then(|e| u8::try_from(e).ok())
                        .filter(|e| *e <= MAX_EPOCH)
                        .ok_or_else(|| bad_value(key, value))?;
                    self.epoch = Some(epoch);
                }
                _ => {
                    return Err(BlockError::UnknownKey {
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks the three timestamps against `YYYY-MM-DD HH:MM:SS`. The check is
    /// by pattern only; calendar validity is left to the store.
    pub fn check_dates(&self, line: &str) -> Result<(), BlockError> {
        for date in [&self.start_date, &self.end_date, &self.creation_date] {
            if !DATE_REGEX.is_match(date) {
                return Err(BlockError::BadDate {
                    date: date.clone(),
                    line: line.trim().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn vld_table(&self) -> String {
        vld_table_name(&self.table_name)
    }
}

pub fn vld_table_name(table: &str) -> String {
    format!("{table}VLD")
}

fn bad_value(key: &str, value: &str) -> BlockError {
    BlockError::BadValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
