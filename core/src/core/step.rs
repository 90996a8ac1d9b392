// stepper/src/core/step.rs

//! Defines a registered step: its names and the boxed handler that runs its body.

use crate::core::vars::Vars;
use crate::error::{StepperError, StepperResult};
use crate::pipeline::definition::Scope;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Type-erased step body.
///
/// Receives the step input, a fresh child [`Scope`] whose prefix is the step's full
/// name, and the run's persisted [`Vars`]. Resolves to the step output.
pub type StepHandler = Arc<dyn Fn(Value, Scope, Vars) -> BoxFuture<'static, StepperResult<Value>> + Send + Sync>;

/// Wraps a typed async closure into a [`StepHandler`].
///
/// The input is deserialized from JSON before the closure runs and the output is
/// serialized after it returns; either conversion failing is a
/// [`StepperError::Serialization`]. The closure's own error converts through
/// `anyhow::Error`, so a `StepperError` raised by a nested step keeps its kind.
pub fn step_handler<F, Fut, I, O, E>(handler_fn: F) -> StepHandler
where
  F: Fn(I, Scope, Vars) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<O, E>> + Send + 'static,
  I: DeserializeOwned + Send + 'static,
  O: Serialize + Send + 'static,
  E: Into<anyhow::Error> + Send + 'static,
{
  Arc::new(move |input: Value, scope: Scope, vars: Vars| {
    let typed_input = match serde_json::from_value::<I>(input) {
      Ok(typed) => typed,
      Err(e) => return async move { Err(StepperError::from(e)) }.boxed(),
    };
    let user_fut = handler_fn(typed_input, scope, vars);
    async move {
      let output = user_fut.await.map_err(StepperError::from_handler)?;
      Ok(serde_json::to_value(output)?)
    }
    .boxed()
  })
}

/// A step as held by the scope that registered it.
#[derive(Clone)]
pub struct StepDef {
  /// Name given at registration.
  pub local_name: String,
  /// Prefix-qualified name; the unit of identity for hashing and locking.
  pub name: String,
  pub handler: StepHandler,
}

impl std::fmt::Debug for StepDef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("local_name", &self.local_name)
      .field("name", &self.name)
      .finish()
  }
}
