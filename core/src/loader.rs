// stepper/src/loader.rs

//! Defines the `StepLoader` trait and its implementations for resolving a step body
//! from a path, used by [`Scope::add_from`](crate::Scope::add_from).

use crate::core::step::{step_handler, StepHandler};
use crate::core::vars::Vars;
use crate::error::{StepperError, StepperResult};
use crate::pipeline::definition::Scope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

/// Resolves a step body by path.
///
/// Any failure must surface as [`StepperError::LoaderFailure`] carrying the path, so
/// a bad path is reported at registration time rather than when the step runs.
pub trait StepLoader: Send + Sync {
  fn load(&self, path: &str) -> StepperResult<StepHandler>;
}

// --- Static Step Loader ---

/// Serves step bodies from a fixed table of paths.
#[derive(Clone, Default)]
pub struct StaticStepLoader {
  handlers: HashMap<String, StepHandler>,
}

impl StaticStepLoader {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes `handler_fn` available under `path`. A later registration for the same
  /// path replaces the earlier one.
  pub fn register<F, Fut, I, O, E>(&mut self, path: impl Into<String>, handler_fn: F) -> &mut Self
  where
    F: Fn(I, Scope, Vars) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.handlers.insert(path.into(), step_handler(handler_fn));
    self
  }

  pub fn paths(&self) -> Vec<&str> {
    let mut paths: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
    paths.sort_unstable();
    paths
  }
}

impl StepLoader for StaticStepLoader {
  fn load(&self, path: &str) -> StepperResult<StepHandler> {
    self.handlers.get(path).cloned().ok_or_else(|| StepperError::LoaderFailure {
      path: path.to_string(),
      source: anyhow::anyhow!("No step body registered under this path"),
    })
  }
}

impl fmt::Debug for StaticStepLoader {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StaticStepLoader").field("paths", &self.paths()).finish()
  }
}

// --- Functional Step Loader ---

/// Resolves step bodies by calling a user-supplied factory with the path.
pub struct FunctionalStepLoader<F>
where
  F: Fn(&str) -> anyhow::Result<StepHandler> + Send + Sync,
{
  factory: F,
}

impl<F> FunctionalStepLoader<F>
where
  F: Fn(&str) -> anyhow::Result<StepHandler> + Send + Sync,
{
  pub fn new(factory: F) -> Self {
    Self { factory }
  }
}

impl<F> StepLoader for FunctionalStepLoader<F>
where
  F: Fn(&str) -> anyhow::Result<StepHandler> + Send + Sync,
{
  fn load(&self, path: &str) -> StepperResult<StepHandler> {
    (self.factory)(path).map_err(|source| match source.downcast::<StepperError>() {
      // Already reported against a path; keep it as is.
      Ok(err @ StepperError::LoaderFailure { .. }) => err,
      Ok(other) => StepperError::LoaderFailure {
        path: path.to_string(),
        source: anyhow::Error::new(other),
      },
      Err(source) => StepperError::LoaderFailure {
        path: path.to_string(),
        source,
      },
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn static_loader_reports_unknown_path() {
    let mut loader = StaticStepLoader::new();
    loader.register("steps/double", |x: i64, _s: Scope, _v: Vars| async move {
      Ok::<_, anyhow::Error>(x * 2)
    });
    assert!(loader.load("steps/double").is_ok());
    match loader.load("steps/triple") {
      Err(StepperError::LoaderFailure { path, .. }) => assert_eq!(path, "steps/triple"),
      Err(other) => panic!("Expected LoaderFailure, got {:?}", other),
      Ok(_) => panic!("Expected LoaderFailure, got a handler"),
    }
  }

  #[test]
  fn functional_loader_wraps_factory_errors() {
    let loader = FunctionalStepLoader::new(|path: &str| -> anyhow::Result<StepHandler> {
      if path.ends_with(".step") {
        Ok(step_handler(|x: i64, _s: Scope, _v: Vars| async move { Ok::<_, anyhow::Error>(x) }))
      } else {
        Err(anyhow::anyhow!("unsupported extension"))
      }
    });
    assert!(loader.load("inc.step").is_ok());
    let err = loader.load("inc.txt").err().unwrap();
    assert_eq!(err.kind(), "loader");
    assert!(err.to_string().contains("inc.txt"));
  }
}
