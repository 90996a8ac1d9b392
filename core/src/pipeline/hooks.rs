// stepper/src/pipeline/hooks.rs

//! Interceptor chains wrapped around step bodies and around whole invocations.
//!
//! There are two independent levels, each an ordered [`Interceptors`] chain:
//!  - step level, around every single step body, with a [`StepContext`];
//!  - exec level, around every `chain`/`batch`/`run` call, with an [`ExecContext`].
//!
//! For one pass through a chain the order is: every `before` hook in registration
//! order, then the `around` hooks nested with the first registered outermost, then
//! every `after` hook in registration order. `after` hooks only run on success.
//!
//! An `around` hook replaces direct invocation of what it wraps: it receives a
//! [`Next`] continuation and must call it to get the real result. Not calling it
//! means the wrapped body never runs.

use crate::core::vars::Vars;
use crate::error::{StepperError, StepperResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Continuation handed to `around` hooks. Yields the wrapped output or error unchanged.
pub type Next = Box<dyn FnOnce() -> BoxFuture<'static, StepperResult<Value>> + Send>;

pub type BeforeHook<C> = Arc<dyn Fn(C) -> BoxFuture<'static, StepperResult<()>> + Send + Sync>;
pub type AfterHook<C> = Arc<dyn Fn(C, Value) -> BoxFuture<'static, StepperResult<()>> + Send + Sync>;
pub type AroundHook<C> = Arc<dyn Fn(Next, C) -> BoxFuture<'static, StepperResult<Value>> + Send + Sync>;

/// What a step-level hook sees.
#[derive(Debug, Clone)]
pub struct StepContext {
  /// Full step name, prefix included.
  pub name: String,
  pub input: Value,
  pub hash: String,
  pub root_hash: String,
  pub vars: Vars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecKind {
  Chain,
  Batch,
  Run,
}

/// What an exec-level hook sees.
#[derive(Debug, Clone)]
pub struct ExecContext {
  pub kind: ExecKind,
  /// Name prefix of the scope the call was made on. Empty for a root scope.
  pub scope: String,
  /// Full name of the targeted step, for `run` only.
  pub step: Option<String>,
  pub input: Value,
}

/// One ordered chain of before/around/after interceptors.
pub struct Interceptors<C> {
  before: Vec<BeforeHook<C>>,
  after: Vec<AfterHook<C>>,
  around: Vec<AroundHook<C>>,
}

impl<C> Default for Interceptors<C> {
  fn default() -> Self {
    Self {
      before: Vec::new(),
      after: Vec::new(),
      around: Vec::new(),
    }
  }
}

impl<C> Clone for Interceptors<C> {
  fn clone(&self) -> Self {
    Self {
      before: self.before.clone(),
      after: self.after.clone(),
      around: self.around.clone(),
    }
  }
}

impl<C> fmt::Debug for Interceptors<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Interceptors")
      .field("before", &self.before.len())
      .field("around", &self.around.len())
      .field("after", &self.after.len())
      .finish()
  }
}

impl<C> Interceptors<C>
where
  C: Clone + Send + Sync + 'static,
{
  pub fn is_empty(&self) -> bool {
    self.before.is_empty() && self.after.is_empty() && self.around.is_empty()
  }

  pub fn push_before<F, Fut, E>(&mut self, hook_fn: F)
  where
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.before.push(Arc::new(move |ctx| {
      let fut = hook_fn(ctx);
      async move { fut.await.map_err(StepperError::from_handler) }.boxed()
    }));
  }

  pub fn push_after<F, Fut, E>(&mut self, hook_fn: F)
  where
    F: Fn(C, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.after.push(Arc::new(move |ctx, output| {
      let fut = hook_fn(ctx, output);
      async move { fut.await.map_err(StepperError::from_handler) }.boxed()
    }));
  }

  pub fn push_around<F, Fut, E>(&mut self, hook_fn: F)
  where
    F: Fn(Next, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.around.push(Arc::new(move |next, ctx| {
      let fut = hook_fn(next, ctx);
      async move { fut.await.map_err(StepperError::from_handler) }.boxed()
    }));
  }

  /// Runs `body` through this chain.
  pub(crate) async fn run(&self, ctx: C, body: Next) -> StepperResult<Value> {
    for hook in &self.before {
      hook(ctx.clone()).await?;
    }

    // Innermost first, so the first registered around hook ends up outermost.
    let mut next = body;
    for hook in self.around.iter().rev() {
      let hook = hook.clone();
      let hook_ctx = ctx.clone();
      let inner = next;
      let wrapped: Next = Box::new(move || hook(inner, hook_ctx));
      next = wrapped;
    }
    let output = next().await?;

    for hook in &self.after {
      hook(ctx.clone(), output.clone()).await?;
    }
    Ok(output)
  }
}

/// The two hook levels recognized by the engine.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
  pub(crate) step: Interceptors<StepContext>,
  pub(crate) exec: Interceptors<ExecContext>,
}

impl Hooks {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.step.is_empty() && self.exec.is_empty()
  }

  /// Runs before every step body, after the run record has been marked running.
  pub fn before_step<F, Fut, E>(mut self, hook_fn: F) -> Self
  where
    F: Fn(StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.step.push_before(hook_fn);
    self
  }

  /// Runs after every successful step body, before the run record is marked done.
  pub fn after_step<F, Fut, E>(mut self, hook_fn: F) -> Self
  where
    F: Fn(StepContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.step.push_after(hook_fn);
    self
  }

  pub fn around_step<F, Fut, E>(mut self, hook_fn: F) -> Self
  where
    F: Fn(Next, StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.step.push_around(hook_fn);
    self
  }

  pub fn before_exec<F, Fut, E>(mut self, hook_fn: F) -> Self
  where
    F: Fn(ExecContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.exec.push_before(hook_fn);
    self
  }

  pub fn after_exec<F, Fut, E>(mut self, hook_fn: F) -> Self
  where
    F: Fn(ExecContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.exec.push_after(hook_fn);
    self
  }

  pub fn around_exec<F, Fut, E>(mut self, hook_fn: F) -> Self
  where
    F: Fn(Next, ExecContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
  {
    self.exec.push_around(hook_fn);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use parking_lot::Mutex;
  use serde_json::json;

  fn body(value: Value, trail: Arc<Mutex<Vec<String>>>) -> Next {
    Box::new(move || {
      async move {
        trail.lock().push("body".to_string());
        Ok(value)
      }
      .boxed()
    })
  }

  #[tokio::test]
  async fn order_is_before_around_after() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let mut chain = Interceptors::<String>::default();

    let t = trail.clone();
    chain.push_before(move |ctx: String| {
      let t = t.clone();
      async move {
        t.lock().push(format!("before:{}", ctx));
        Ok::<(), StepperError>(())
      }
    });
    for label in ["outer", "inner"] {
      let t = trail.clone();
      chain.push_around(move |next: Next, _ctx: String| {
        let t = t.clone();
        async move {
          t.lock().push(format!("{}:in", label));
          let out = next().await;
          t.lock().push(format!("{}:out", label));
          out
        }
      });
    }
    let t = trail.clone();
    chain.push_after(move |_ctx: String, output: Value| {
      let t = t.clone();
      async move {
        t.lock().push(format!("after:{}", output));
        Ok::<(), StepperError>(())
      }
    });

    let out = chain.run("ctx".to_string(), body(json!(5), trail.clone())).await.unwrap();
    assert_eq!(out, json!(5));
    assert_eq!(
      *trail.lock(),
      vec!["before:ctx", "outer:in", "inner:in", "body", "inner:out", "outer:out", "after:5"]
    );
  }

  #[tokio::test]
  async fn failure_skips_after_hooks() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let mut chain = Interceptors::<()>::default();
    let t = trail.clone();
    chain.push_after(move |_ctx: (), _output: Value| {
      let t = t.clone();
      async move {
        t.lock().push("after".to_string());
        Ok::<(), StepperError>(())
      }
    });
    let failing: Next = Box::new(|| async { Err(StepperError::from(anyhow::anyhow!("bad body"))) }.boxed());
    let err = chain.run((), failing).await.unwrap_err();
    assert!(err.to_string().contains("bad body"));
    assert!(trail.lock().is_empty());
  }

  #[tokio::test]
  async fn around_that_skips_next_replaces_body() {
    let trail = Arc::new(Mutex::new(Vec::new()));
    let mut chain = Interceptors::<()>::default();
    chain.push_around(|_next: Next, _ctx: ()| async { Ok::<Value, StepperError>(json!("stubbed")) });
    let out = chain.run((), body(json!(1), trail.clone())).await.unwrap();
    assert_eq!(out, json!("stubbed"));
    assert!(trail.lock().is_empty());
  }
}
