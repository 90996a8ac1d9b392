// stepper/src/hashing/mod.rs

//! Content addressing for idempotency keys.
//!
//! A key is the digest of a step's full name followed by the canonical JSON form
//! of its input. Object keys are sorted before hashing, so two structurally equal
//! inputs always produce the same key regardless of how they were built.

pub mod canonical_json;

use crate::error::StepperResult;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub use canonical_json::to_canonical_json;

/// Pluggable key function: `(full_name, input) -> key`. Must be pure.
pub type HashFn = Arc<dyn Fn(&str, &Value) -> String + Send + Sync>;

/// Serialized form used in place of an absent (`null`) input.
pub const ABSENT_INPUT: &str = "\"\"";

/// Default key function: hex SHA-256 over `name + canonical(input)`.
pub fn step_hash(name: &str, data: &Value) -> String {
  let serialized = match data {
    Value::Null => ABSENT_INPUT.to_string(),
    other => to_canonical_json(other),
  };
  let mut hasher = Sha256::new();
  hasher.update(name.as_bytes());
  hasher.update(serialized.as_bytes());
  format!("{:x}", hasher.finalize())
}

pub fn default_hash_fn() -> HashFn {
  Arc::new(step_hash)
}

/// Converts arbitrary input into the JSON value the engine hashes and stores.
/// Non-serializable input is an error, never a partial value.
pub fn to_step_value<T: Serialize + ?Sized>(data: &T) -> StepperResult<Value> {
  Ok(serde_json::to_value(data)?)
}
