// stepper/src/store/noop.rs

use super::{RunHandle, RunState, RunStore};
use crate::core::vars::Vars;
use crate::error::{StepperError, StepperResult};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{event, Level};

/// Store that remembers nothing. Every run looks new, so every invocation executes.
///
/// Transitions are accepted on mutation-capable handles and rejected on read-only
/// ones, which is enough to drive the engine without any infrastructure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunStore;

impl NoopRunStore {
  pub fn new() -> Self {
    NoopRunStore
  }
}

struct NoopRunHandle {
  name: String,
  hash: String,
  root_hash: Option<String>,
}

#[async_trait]
impl RunHandle for NoopRunHandle {
  fn name(&self) -> &str {
    &self.name
  }

  fn hash(&self) -> &str {
    &self.hash
  }

  fn root_hash(&self) -> Option<&str> {
    self.root_hash.as_deref()
  }

  fn state(&self) -> RunState {
    RunState::New
  }

  fn output(&self) -> Option<Value> {
    None
  }

  async fn mark_running(&self) -> StepperResult<bool> {
    Ok(!self.is_read_only())
  }

  async fn mark_done(&self, _output: &Value) -> StepperResult<bool> {
    Ok(!self.is_read_only())
  }

  async fn mark_failed(&self, error: &StepperError) -> StepperResult<bool> {
    event!(Level::DEBUG, step_name = %self.name, hash = %self.hash, error = %error, "Discarding step failure.");
    Ok(!self.is_read_only())
  }

  async fn vars(&self) -> StepperResult<Vars> {
    Ok(Vars::new())
  }
}

#[async_trait]
impl RunStore for NoopRunStore {
  async fn peek(&self, name: &str, hash: &str) -> StepperResult<Box<dyn RunHandle>> {
    Ok(Box::new(NoopRunHandle {
      name: name.to_string(),
      hash: hash.to_string(),
      root_hash: None,
    }))
  }

  async fn acquire(&self, name: &str, hash: &str, root_hash: &str) -> StepperResult<Box<dyn RunHandle>> {
    Ok(Box::new(NoopRunHandle {
      name: name.to_string(),
      hash: hash.to_string(),
      root_hash: Some(root_hash.to_string()),
    }))
  }
}
