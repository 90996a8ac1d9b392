// stepper/src/lock/mod.rs

//! The lock-coordinator contract consumed by the engine.
//!
//! A coordinator runs a body while holding a named mutual-exclusion section and
//! releases it on every exit path of the body, failures included. The engine uses
//! keys of the form `lock_prefix + delimiter + full_name + delimiter + hash`.

pub mod memory;
pub mod noop;

use crate::error::StepperResult;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

pub use memory::MemoryLock;
pub use noop::NoopLock;

/// The critical section handed to a coordinator.
pub type LockBody<'a> = BoxFuture<'a, StepperResult<Value>>;

#[async_trait]
pub trait LockCoordinator: Send + Sync {
  /// Runs `body` only while the section named `key` is held.
  async fn with_lock<'a>(&'a self, key: &'a str, body: LockBody<'a>) -> StepperResult<Value>;
}
