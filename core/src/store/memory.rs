// stepper/src/store/memory.rs

use super::{RunHandle, RunRecord, RunState, RunStore};
use crate::core::vars::Vars;
use crate::error::{StepperError, StepperResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

type RunKey = (String, String);
type RunTable = Arc<Mutex<HashMap<RunKey, RunRecord>>>;

/// In-process run store.
///
/// Records live in a single mutex-guarded table, so every transition is atomic for
/// all handles in this process. Handles are live views: `state()` and `output()`
/// always reflect the current record, not the one seen at lookup time.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunStore {
  runs: RunTable,
}

impl MemoryRunStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Detached copy of a run. Writes to the returned `vars` do not reach the store.
  pub fn record(&self, name: &str, hash: &str) -> Option<RunRecord> {
    self.runs.lock().get(&(name.to_string(), hash.to_string())).map(detached)
  }

  /// Detached copies of all runs tagged with `root_hash`, ordered by name.
  pub fn records_for_root(&self, root_hash: &str) -> Vec<RunRecord> {
    let mut records: Vec<RunRecord> = self
      .runs
      .lock()
      .values()
      .filter(|r| r.root_hash.as_deref() == Some(root_hash))
      .map(detached)
      .collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
  }

  pub fn len(&self) -> usize {
    self.runs.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.runs.lock().is_empty()
  }

  pub fn clear(&self) {
    self.runs.lock().clear();
  }

  fn handle(&self, name: &str, hash: &str, root_hash: Option<&str>) -> MemoryRunHandle {
    MemoryRunHandle {
      runs: self.runs.clone(),
      key: (name.to_string(), hash.to_string()),
      root_hash: root_hash.map(str::to_string),
    }
  }
}

fn detached(record: &RunRecord) -> RunRecord {
  RunRecord {
    vars: Vars::from_map(record.vars.snapshot()),
    ..record.clone()
  }
}

struct MemoryRunHandle {
  runs: RunTable,
  key: RunKey,
  root_hash: Option<String>,
}

impl MemoryRunHandle {
  /// Applies `f` to the record if this handle may write. Returns whether the
  /// transition was accepted.
  fn transition(&self, f: impl FnOnce(&mut RunRecord) -> bool) -> bool {
    let Some(root_hash) = &self.root_hash else {
      return false;
    };
    let mut runs = self.runs.lock();
    let record = runs
      .entry(self.key.clone())
      .or_insert_with(|| RunRecord::new(self.key.0.clone(), self.key.1.clone(), Some(root_hash.clone())));
    f(record)
  }
}

#[async_trait]
impl RunHandle for MemoryRunHandle {
  fn name(&self) -> &str {
    &self.key.0
  }

  fn hash(&self) -> &str {
    &self.key.1
  }

  fn root_hash(&self) -> Option<&str> {
    self.root_hash.as_deref()
  }

  fn state(&self) -> RunState {
    self.runs.lock().get(&self.key).map_or(RunState::New, |r| r.state)
  }

  fn output(&self) -> Option<Value> {
    self.runs.lock().get(&self.key).and_then(|r| r.output.clone())
  }

  async fn mark_running(&self) -> StepperResult<bool> {
    let root_hash = self.root_hash.clone();
    Ok(self.transition(|record| match record.state {
      RunState::New | RunState::Failed => {
        record.state = RunState::Running;
        record.root_hash = root_hash;
        record.error = None;
        true
      }
      RunState::Running | RunState::Done => false,
    }))
  }

  async fn mark_done(&self, output: &Value) -> StepperResult<bool> {
    Ok(self.transition(|record| {
      if record.state != RunState::Running {
        return false;
      }
      record.state = RunState::Done;
      record.output = Some(output.clone());
      true
    }))
  }

  async fn mark_failed(&self, error: &StepperError) -> StepperResult<bool> {
    let accepted = self.transition(|record| match record.state {
      RunState::New | RunState::Running => {
        record.state = RunState::Failed;
        record.error = Some(format!("{}: {}", error.kind(), error));
        true
      }
      RunState::Done | RunState::Failed => false,
    });
    if accepted {
      event!(Level::DEBUG, step_name = %self.key.0, hash = %self.key.1, error = %error, "Run recorded as failed.");
    }
    Ok(accepted)
  }

  async fn vars(&self) -> StepperResult<Vars> {
    let runs = self.runs.lock();
    Ok(runs.get(&self.key).map(|r| r.vars.clone()).unwrap_or_default())
  }
}

#[async_trait]
impl RunStore for MemoryRunStore {
  async fn peek(&self, name: &str, hash: &str) -> StepperResult<Box<dyn RunHandle>> {
    Ok(Box::new(self.handle(name, hash, None)))
  }

  async fn acquire(&self, name: &str, hash: &str, root_hash: &str) -> StepperResult<Box<dyn RunHandle>> {
    self
      .runs
      .lock()
      .entry((name.to_string(), hash.to_string()))
      .or_insert_with(|| RunRecord::new(name, hash, Some(root_hash.to_string())));
    Ok(Box::new(self.handle(name, hash, Some(root_hash))))
  }
}
