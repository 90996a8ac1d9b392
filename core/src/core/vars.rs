// stepper/src/core/vars.rs
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StepperResult;

/// The persisted variable bag of a run record.
///
/// Clones share the same map, so a body that writes to its `Vars` writes through to
/// whatever record the store handed out. Whether those writes outlive the process is
/// up to the store backend.
///
/// IMPORTANT: guards from `read()`/`write()` are blocking and MUST NOT be held
/// across `.await` points.
#[derive(Debug, Clone, Default)]
pub struct Vars(Arc<RwLock<Map<String, Value>>>);

impl Vars {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_map(map: Map<String, Value>) -> Self {
    Vars(Arc::new(RwLock::new(map)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, Map<String, Value>> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, Map<String, Value>> {
    self.0.write()
  }

  pub fn get(&self, key: &str) -> Option<Value> {
    self.0.read().get(key).cloned()
  }

  /// Reads a variable and deserializes it. `Ok(None)` when the key is absent.
  pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> StepperResult<Option<T>> {
    match self.get(key) {
      Some(value) => Ok(Some(serde_json::from_value(value)?)),
      None => Ok(None),
    }
  }

  pub fn set<T: Serialize>(&self, key: impl Into<String>, value: T) -> StepperResult<()> {
    let value = serde_json::to_value(value)?;
    self.0.write().insert(key.into(), value);
    Ok(())
  }

  pub fn remove(&self, key: &str) -> Option<Value> {
    self.0.write().remove(key)
  }

  pub fn is_empty(&self) -> bool {
    self.0.read().is_empty()
  }

  /// Point-in-time copy of the bag, detached from later writes.
  pub fn snapshot(&self) -> Map<String, Value> {
    self.0.read().clone()
  }

  pub fn shares_storage_with(&self, other: &Vars) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn clones_write_through() {
    let vars = Vars::new();
    let handed_to_body = vars.clone();
    handed_to_body.set("attempts", 2).unwrap();
    assert_eq!(vars.get("attempts"), Some(json!(2)));
    assert!(vars.shares_storage_with(&handed_to_body));
  }

  #[test]
  fn snapshot_is_detached() {
    let vars = Vars::new();
    vars.set("a", "x").unwrap();
    let snap = vars.snapshot();
    vars.set("a", "y").unwrap();
    assert_eq!(snap.get("a"), Some(&json!("x")));
    assert_eq!(vars.get_as::<String>("a").unwrap().as_deref(), Some("y"));
    assert_eq!(vars.get_as::<String>("missing").unwrap(), None);
  }
}
