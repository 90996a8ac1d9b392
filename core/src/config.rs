// stepper/src/config.rs

//! Engine configuration: backends, key layout, hooks and verbosity.
//!
//! Every field has a default, so `StepperConfig::default()` gives a runnable engine
//! backed by [`NoopRunStore`] and [`NoopLock`]. Those provide neither memoization
//! nor exclusion; inject real backends for either guarantee.

use crate::error::{StepperError, StepperResult};
use crate::hashing::{default_hash_fn, HashFn};
use crate::lock::{LockCoordinator, NoopLock};
use crate::pipeline::hooks::Hooks;
use crate::store::{NoopRunStore, RunStore};
use std::env;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_LOCK_PREFIX: &str = "STEP";
pub const DEFAULT_LOCK_DELIMITER: &str = "/";
pub const DEFAULT_NAME_DELIMITER: &str = "/";

pub const ENV_LOCK_PREFIX: &str = "STEPPER_LOCK_PREFIX";
pub const ENV_LOCK_DELIMITER: &str = "STEPPER_LOCK_DELIMITER";
pub const ENV_NAME_DELIMITER: &str = "STEPPER_NAME_DELIMITER";
pub const ENV_DEBUG: &str = "STEPPER_DEBUG";

#[derive(Clone)]
pub struct StepperConfig {
  pub(crate) store: Arc<dyn RunStore>,
  pub(crate) lock: Arc<dyn LockCoordinator>,
  pub(crate) hash: HashFn,
  pub(crate) lock_prefix: String,
  pub(crate) lock_delimiter: String,
  pub(crate) name_delimiter: String,
  pub(crate) hooks: Hooks,
  pub(crate) debug: bool,
}

impl Default for StepperConfig {
  fn default() -> Self {
    Self {
      store: Arc::new(NoopRunStore::new()),
      lock: Arc::new(NoopLock::new()),
      hash: default_hash_fn(),
      lock_prefix: DEFAULT_LOCK_PREFIX.to_string(),
      lock_delimiter: DEFAULT_LOCK_DELIMITER.to_string(),
      name_delimiter: DEFAULT_NAME_DELIMITER.to_string(),
      hooks: Hooks::default(),
      debug: false,
    }
  }
}

impl fmt::Debug for StepperConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StepperConfig")
      .field("lock_prefix", &self.lock_prefix)
      .field("lock_delimiter", &self.lock_delimiter)
      .field("name_delimiter", &self.name_delimiter)
      .field("hooks", &self.hooks)
      .field("debug", &self.debug)
      .finish_non_exhaustive()
  }
}

impl StepperConfig {
  pub fn builder() -> StepperConfigBuilder {
    StepperConfigBuilder::default()
  }

  /// Default backends with key layout and verbosity taken from the environment.
  pub fn from_env() -> StepperResult<Self> {
    StepperConfigBuilder::from_env()?.build()
  }

  pub fn store(&self) -> &Arc<dyn RunStore> {
    &self.store
  }

  pub fn lock(&self) -> &Arc<dyn LockCoordinator> {
    &self.lock
  }

  pub fn hooks(&self) -> &Hooks {
    &self.hooks
  }

  pub fn lock_prefix(&self) -> &str {
    &self.lock_prefix
  }

  pub fn lock_delimiter(&self) -> &str {
    &self.lock_delimiter
  }

  pub fn name_delimiter(&self) -> &str {
    &self.name_delimiter
  }

  pub fn debug(&self) -> bool {
    self.debug
  }

  pub fn hash(&self, name: &str, data: &serde_json::Value) -> String {
    (self.hash)(name, data)
  }

  /// `lock_prefix + delimiter + full_name + delimiter + hash`
  pub fn lock_key(&self, name: &str, hash: &str) -> String {
    format!(
      "{}{}{}{}{}",
      self.lock_prefix, self.lock_delimiter, name, self.lock_delimiter, hash
    )
  }

  /// Qualifies `local_name` with `prefix`; an empty prefix leaves it unchanged.
  pub fn compose_name(&self, prefix: &str, local_name: &str) -> String {
    if prefix.is_empty() {
      local_name.to_string()
    } else {
      format!("{}{}{}", prefix, self.name_delimiter, local_name)
    }
  }
}

#[derive(Default)]
pub struct StepperConfigBuilder {
  config: StepperConfig,
}

impl StepperConfigBuilder {
  /// Starts from defaults, overriding key layout and verbosity from `STEPPER_*`
  /// environment variables when they are set.
  pub fn from_env() -> StepperResult<Self> {
    let get_env = |var_name: &str| env::var(var_name).ok();

    let mut builder = Self::default();
    if let Some(prefix) = get_env(ENV_LOCK_PREFIX) {
      builder = builder.lock_prefix(prefix);
    }
    if let Some(delimiter) = get_env(ENV_LOCK_DELIMITER) {
      builder = builder.lock_delimiter(delimiter);
    }
    if let Some(delimiter) = get_env(ENV_NAME_DELIMITER) {
      builder = builder.name_delimiter(delimiter);
    }
    if let Some(raw) = get_env(ENV_DEBUG) {
      let debug = raw.trim().parse::<bool>().map_err(|e| StepperError::Configuration {
        message: format!("Invalid {} value '{}': {}", ENV_DEBUG, raw, e),
      })?;
      builder = builder.debug(debug);
    }
    Ok(builder)
  }

  pub fn store(mut self, store: Arc<dyn RunStore>) -> Self {
    self.config.store = store;
    self
  }

  pub fn lock(mut self, lock: Arc<dyn LockCoordinator>) -> Self {
    self.config.lock = lock;
    self
  }

  pub fn hash_fn(mut self, hash: HashFn) -> Self {
    self.config.hash = hash;
    self
  }

  pub fn lock_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.config.lock_prefix = prefix.into();
    self
  }

  pub fn lock_delimiter(mut self, delimiter: impl Into<String>) -> Self {
    self.config.lock_delimiter = delimiter.into();
    self
  }

  pub fn name_delimiter(mut self, delimiter: impl Into<String>) -> Self {
    self.config.name_delimiter = delimiter.into();
    self
  }

  pub fn hooks(mut self, hooks: Hooks) -> Self {
    self.config.hooks = hooks;
    self
  }

  pub fn debug(mut self, debug: bool) -> Self {
    self.config.debug = debug;
    self
  }

  pub fn build(self) -> StepperResult<StepperConfig> {
    let config = self.config;
    for (field, value) in [
      ("lock_prefix", &config.lock_prefix),
      ("lock_delimiter", &config.lock_delimiter),
      ("name_delimiter", &config.name_delimiter),
    ] {
      if value.is_empty() {
        return Err(StepperError::Configuration {
          message: format!("{} must not be empty", field),
        });
      }
    }
    Ok(config)
  }
}
