// stepper/src/lock/memory.rs

use super::{LockBody, LockCoordinator};
use crate::error::StepperResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as SectionMutex;
use tracing::{event, Level};

/// Process-wide exclusion keyed by name.
///
/// Each key maps to an async mutex, so waiters suspend instead of blocking a thread.
/// A key's entry is dropped once nobody holds or waits for it.
#[derive(Debug, Default)]
pub struct MemoryLock {
  sections: Mutex<HashMap<String, Arc<SectionMutex<()>>>>,
}

impl MemoryLock {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keys currently held or waited on.
  pub fn active_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.sections.lock().keys().cloned().collect();
    keys.sort();
    keys
  }

  fn section(&self, key: &str) -> Arc<SectionMutex<()>> {
    self.sections.lock().entry(key.to_string()).or_default().clone()
  }

  fn reclaim(&self, key: &str, section: &Arc<SectionMutex<()>>) {
    let mut sections = self.sections.lock();
    // One reference in the table, one held by the caller: nobody else is queued.
    if Arc::strong_count(section) == 2 {
      sections.remove(key);
    }
  }
}

/// Reclaims the key's entry on every exit, including a caller that stops waiting.
struct SectionLease<'a> {
  lock: &'a MemoryLock,
  key: &'a str,
  section: Arc<SectionMutex<()>>,
}

impl Drop for SectionLease<'_> {
  fn drop(&mut self) {
    self.lock.reclaim(self.key, &self.section);
  }
}

#[async_trait]
impl LockCoordinator for MemoryLock {
  async fn with_lock<'a>(&'a self, key: &'a str, body: LockBody<'a>) -> StepperResult<Value> {
    let lease = SectionLease {
      lock: self,
      key,
      section: self.section(key),
    };
    let result = {
      let _held = lease.section.lock().await;
      event!(Level::TRACE, lock_key = %key, "Lock acquired.");
      body.await
    };
    event!(Level::TRACE, lock_key = %key, "Lock released.");
    drop(lease);
    result
  }
}
