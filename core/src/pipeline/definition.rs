// stepper/src/pipeline/definition.rs

//! Contains the `Scope` struct and the methods that build it: step registration,
//! name composition and loader-backed registration.

use crate::config::StepperConfig;
use crate::core::step::{step_handler, StepDef, StepHandler};
use crate::core::vars::Vars;
use crate::error::{StepperError, StepperResult};
use crate::loader::StepLoader;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, Level};

/// A namespace of registered steps sharing a name prefix and a root identity.
///
/// A root scope comes from [`Stepper::scope`](crate::Stepper::scope). Every time a
/// step body is entered it receives a fresh child scope whose prefix is the step's
/// full name and whose root hash is the one of the invocation that reached it.
pub struct Scope {
  pub(crate) config: Arc<StepperConfig>,
  pub(crate) name_prefix: String,
  /// `None` until a step of the current invocation tree has been reached.
  pub(crate) root_hash: Option<String>,
  /// Registration order; drives `chain`.
  pub(crate) steps: Vec<Arc<StepDef>>,
  pub(crate) by_name: HashMap<String, Arc<StepDef>>,
}

impl Scope {
  pub(crate) fn new(config: Arc<StepperConfig>, name_prefix: impl Into<String>, root_hash: Option<String>) -> Self {
    Self {
      config,
      name_prefix: name_prefix.into(),
      root_hash,
      steps: Vec::new(),
      by_name: HashMap::new(),
    }
  }

  pub fn name_prefix(&self) -> &str {
    &self.name_prefix
  }

  pub fn root_hash(&self) -> Option<&str> {
    self.root_hash.as_deref()
  }

  pub fn config(&self) -> &StepperConfig {
    &self.config
  }

  /// Full names of the registered steps, in registration order.
  pub fn step_names(&self) -> Vec<String> {
    self.steps.iter().map(|s| s.name.clone()).collect()
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn contains(&self, local_name: &str) -> bool {
    self.by_name.contains_key(&self.compose_name(local_name))
  }

  pub(crate) fn compose_name(&self, local_name: &str) -> String {
    self.config.compose_name(&self.name_prefix, local_name)
  }

  /// Fails with `DuplicateStep` if `local_name` is already registered here.
  fn ensure_step_not_exists(&self, name: &str) -> StepperResult<()> {
    if self.by_name.contains_key(name) {
      event!(Level::ERROR, step_name = %name, "Step is already defined.");
      return Err(StepperError::DuplicateStep { name: name.to_string() });
    }
    Ok(())
  }

  /// Registers a step body.
  ///
  /// `handler_fn` receives the deserialized input, a child scope for nested steps
  /// and the run's persisted variables. Registering a name twice on the same scope
  /// fails here, before anything executes.
  pub fn add<F, Fut, I, O, E>(&mut self, local_name: &str, handler_fn: F) -> StepperResult<()>
  where
    F: Fn(I, Scope, Vars) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.add_handler(local_name, step_handler(handler_fn))
  }

  /// Registers an already type-erased step body.
  pub fn add_handler(&mut self, local_name: &str, handler: StepHandler) -> StepperResult<()> {
    let name = self.compose_name(local_name);
    self.ensure_step_not_exists(&name)?;

    let step = Arc::new(StepDef {
      local_name: local_name.to_string(),
      name: name.clone(),
      handler,
    });
    self.steps.push(step.clone());
    self.by_name.insert(name.clone(), step);
    event!(Level::TRACE, step_name = %name, "Step registered.");
    Ok(())
  }

  /// Resolves a step body through `loader` and registers it under `local_name`.
  pub fn add_from(&mut self, local_name: &str, path: &str, loader: &dyn StepLoader) -> StepperResult<()> {
    self.ensure_step_not_exists(&self.compose_name(local_name))?;
    let handler = loader.load(path)?;
    event!(Level::DEBUG, step_name = %local_name, %path, "Step body loaded.");
    self.add_handler(local_name, handler)
  }
}

impl std::fmt::Debug for Scope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Scope")
      .field("name_prefix", &self.name_prefix)
      .field("root_hash", &self.root_hash)
      .field("steps", &self.step_names())
      .finish()
  }
}
