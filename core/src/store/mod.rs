// stepper/src/store/mod.rs

//! The run-store contract consumed by the engine.
//!
//! A store keeps one [`RunRecord`] per `(full name, hash)`. The engine only ever
//! moves a record through the guarded transitions below, and every `mark_*` call
//! reports rejection as `Ok(false)` rather than an error:
//!
//! ```text
//! New     --mark_running--> Running --mark_done--> Done
//! New     --mark_running--> Running --mark_failed--> Failed
//! Failed  --mark_running--> Running                 (retry)
//! ```
//!
//! Backends must make the `mark_*` transitions atomic with respect to concurrent
//! callers on the same key. Handles obtained through [`RunStore::peek`] are
//! read-only: every `mark_*` on them returns `Ok(false)`.

pub mod memory;
pub mod noop;

use crate::core::vars::Vars;
use crate::error::{StepperError, StepperResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use memory::MemoryRunStore;
pub use noop::NoopRunStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
  New,
  Running,
  Done,
  Failed,
}

/// Snapshot of one step run as a store keeps it.
#[derive(Debug, Clone)]
pub struct RunRecord {
  pub name: String,
  pub hash: String,
  /// Hash of the top-level step whose invocation created this run.
  pub root_hash: Option<String>,
  pub state: RunState,
  pub output: Option<Value>,
  /// Rendered error of the last failed attempt.
  pub error: Option<String>,
  pub vars: Vars,
}

impl RunRecord {
  pub fn new(name: impl Into<String>, hash: impl Into<String>, root_hash: Option<String>) -> Self {
    Self {
      name: name.into(),
      hash: hash.into(),
      root_hash,
      state: RunState::New,
      output: None,
      error: None,
      vars: Vars::new(),
    }
  }
}

/// A view of one run record.
#[async_trait]
pub trait RunHandle: Send + Sync {
  fn name(&self) -> &str;

  fn hash(&self) -> &str;

  /// `None` for read-only handles.
  fn root_hash(&self) -> Option<&str>;

  fn state(&self) -> RunState;

  fn is_read_only(&self) -> bool {
    self.root_hash().is_none()
  }

  fn is_done(&self) -> bool {
    self.state() == RunState::Done
  }

  fn is_running(&self) -> bool {
    self.state() == RunState::Running
  }

  fn is_failed(&self) -> bool {
    self.state() == RunState::Failed
  }

  /// Cached output of a `Done` run.
  fn output(&self) -> Option<Value>;

  async fn mark_running(&self) -> StepperResult<bool>;

  async fn mark_done(&self, output: &Value) -> StepperResult<bool>;

  async fn mark_failed(&self, error: &StepperError) -> StepperResult<bool>;

  /// The persisted variable bag of this run.
  async fn vars(&self) -> StepperResult<Vars>;
}

/// Source of run handles.
///
/// The two lookups are deliberately separate operations: `peek` can never hand out
/// a handle that writes, and `acquire` always tags the record with the invocation's
/// root hash.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Read-only view of a run. Must not create or modify anything.
  async fn peek(&self, name: &str, hash: &str) -> StepperResult<Box<dyn RunHandle>>;

  /// Mutation-capable handle, creating the record in `New` state if it does not exist.
  async fn acquire(&self, name: &str, hash: &str, root_hash: &str) -> StepperResult<Box<dyn RunHandle>>;
}
