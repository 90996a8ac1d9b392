// stepper/src/stepper.rs

//! Defines the `Stepper` struct, the entry point that owns a configuration and hands
//! out root scopes bound to it.

use crate::config::StepperConfig;
use crate::error::StepperResult;
use crate::pipeline::definition::Scope;
use std::sync::Arc;
use tracing::{event, Level};

/// Shared engine handle. Cheap to clone; every clone uses the same store, lock and hooks.
#[derive(Debug, Clone)]
pub struct Stepper {
  config: Arc<StepperConfig>,
}

impl Stepper {
  pub fn new(config: StepperConfig) -> Self {
    event!(
      Level::DEBUG,
      lock_prefix = %config.lock_prefix,
      name_delimiter = %config.name_delimiter,
      debug = config.debug,
      "Stepper created."
    );
    Self {
      config: Arc::new(config),
    }
  }

  /// No-op backends and default key layout.
  pub fn with_defaults() -> Self {
    Self::new(StepperConfig::default())
  }

  /// No-op backends, key layout and verbosity from `STEPPER_*` environment variables.
  pub fn from_env() -> StepperResult<Self> {
    Ok(Self::new(StepperConfig::from_env()?))
  }

  pub fn config(&self) -> &StepperConfig {
    &self.config
  }

  /// A root scope with the given name prefix; pass `""` for unprefixed names.
  ///
  /// The scope has no root hash: each top-level `chain`, `batch` or `run` on it
  /// starts a new invocation tree.
  pub fn scope(&self, name_prefix: &str) -> Scope {
    Scope::new(self.config.clone(), name_prefix, None)
  }
}

impl Default for Stepper {
  fn default() -> Self {
    Self::with_defaults()
  }
}
