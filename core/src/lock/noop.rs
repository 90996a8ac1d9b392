// stepper/src/lock/noop.rs

use super::{LockBody, LockCoordinator};
use crate::error::StepperResult;
use async_trait::async_trait;
use serde_json::Value;

/// Grants every section immediately. Provides no exclusion at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLock;

impl NoopLock {
  pub fn new() -> Self {
    NoopLock
  }
}

#[async_trait]
impl LockCoordinator for NoopLock {
  async fn with_lock<'a>(&'a self, _key: &'a str, body: LockBody<'a>) -> StepperResult<Value> {
    body.await
  }
}
