#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use vld_updater::{
    DurableBackend, EphemeralBackend, ExecOutput, QueryChannel, SeqnoScope, SequenceAllocator,
    SqlExecutor, Updater, UpdaterConfig, UpdaterError,
};

pub const DEMO_HEADER: &str =
    "BEGIN_TABLE DEMO '2009-01-01 00:00:00' '2009-02-01 00:00:00' 0 '2009-04-07 18:00:00'";

/// Executor that records every statement and answers from a script: listed
/// tables fail their probe, statements with a failing prefix are rejected and
/// gone-away prefixes drop the connection a set number of times first.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    log: Rc<RefCell<Vec<String>>>,
    missing: HashSet<String>,
    failing: Vec<String>,
    gone_away: Vec<(String, usize)>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(mut self, table: &str) -> Self {
        self.missing.insert(table.to_string());
        self
    }

    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_string());
        self
    }

    pub fn gone_away(mut self, prefix: &str, times: usize) -> Self {
        self.gone_away.push((prefix.to_string(), times));
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Logged statements other than table probes.
    pub fn writes(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|s| !s.starts_with("describe "))
            .cloned()
            .collect()
    }
}

impl SqlExecutor for RecordingExecutor {
    fn execute(&mut self, sql: &str) -> Result<ExecOutput, UpdaterError> {
        self.log.borrow_mut().push(sql.to_string());
        if let Some(table) = sql.strip_prefix("describe ") {
            if self.missing.contains(table) {
                return Ok(ExecOutput::failed(
                    1,
                    vec![format!("ERROR 1146 (42S02): Table '{table}' doesn't exist")],
                ));
            }
            return Ok(ExecOutput::ok(Vec::new()));
        }
        if let Some((_, left)) = self
            .gone_away
            .iter_mut()
            .find(|(prefix, left)| *left > 0 && sql.starts_with(prefix.as_str()))
        {
            *left -= 1;
            return Ok(ExecOutput::failed(
                1,
                vec!["ERROR 2006 (HY000): MySQL server has gone away".into()],
            ));
        }
        if self.failing.iter().any(|prefix| sql.starts_with(prefix.as_str())) {
            return Ok(ExecOutput::failed(
                1,
                vec!["ERROR 1136 (21S01): Column count doesn't match value count".into()],
            ));
        }
        Ok(ExecOutput::ok(Vec::new()))
    }
}

/// Allocator handing out a fixed list of SEQNOs, then failing.
#[derive(Clone, Default)]
pub struct ScriptedAllocator {
    seqnos: VecDeque<u32>,
    calls: Rc<RefCell<Vec<(String, SeqnoScope)>>>,
}

impl ScriptedAllocator {
    pub fn new(seqnos: &[u32]) -> Self {
        Self {
            seqnos: seqnos.iter().copied().collect(),
            calls: Rc::default(),
        }
    }

    pub fn calls(&self) -> Vec<(String, SeqnoScope)> {
        self.calls.borrow().clone()
    }
}

impl SequenceAllocator for ScriptedAllocator {
    fn allocate(&mut self, table: &str, scope: SeqnoScope) -> Result<u32, UpdaterError> {
        self.calls.borrow_mut().push((table.to_string(), scope));
        self.seqnos
            .pop_front()
            .ok_or_else(|| UpdaterError::Allocation {
                table: table.to_string(),
                message: "no sequence number in allocator output".into(),
            })
    }
}

pub fn durable_updater(
    config: UpdaterConfig,
    executor: &RecordingExecutor,
    allocator: &ScriptedAllocator,
) -> Updater {
    let channel = QueryChannel::with_max_attempts(Box::new(executor.clone()), config.max_attempts);
    let backend = DurableBackend::new(channel, Box::new(allocator.clone()));
    Updater::with_backend(config, Box::new(backend)).expect("durable updater")
}

pub fn ephemeral_updater(config: UpdaterConfig, executor: &RecordingExecutor) -> Updater {
    let channel = QueryChannel::with_max_attempts(Box::new(executor.clone()), config.max_attempts);
    Updater::with_backend(config, Box::new(EphemeralBackend::new(channel)))
        .expect("ephemeral updater")
}
