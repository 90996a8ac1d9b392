// stepper/src/pipeline/execution.rs

//! Contains the execution side of `Scope`: the per-step critical section and the
//! `chain`, `batch`, `run` and `get` entry points.
//!
//! Invoking one step with input `x`:
//!  1. `hash = hash(full_name, x)`; the first step reached in a top-level invocation
//!     fixes the root hash for everything below it.
//!  2. Take the lock `lock_prefix/full_name/hash`. Steps 3 to 6 run inside it.
//!  3. Acquire the mutation-capable run handle.
//!  4. `Done`: return the cached output; the body does not run.
//!  5. `Running`: fail with `StepperError::Running`; nothing is queued or retried.
//!  6. Otherwise mark running (rejection is a hard `Mark` error), run the hooks and
//!     the body against a fresh child scope, then mark done. A rejected `mark_done`
//!     or `mark_failed` is only logged; body errors are re-raised unchanged.
//!
//! The lock is released before the output is handed back, so nested steps take
//! their own locks. A body that re-enters its own `(name, hash)` will deadlock on a
//! real lock backend or collide with itself on the run record; this is not detected.

use crate::config::StepperConfig;
use crate::core::step::StepDef;
use crate::error::{MarkKind, StepperError, StepperResult};
use crate::hashing::to_step_value;
use crate::pipeline::definition::Scope;
use crate::pipeline::hooks::{ExecContext, ExecKind, Next, StepContext};
use crate::store::RunHandle;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Root hash of one top-level invocation, set from its first registered step.
type RootCell = Arc<OnceCell<String>>;

fn lifecycle(debug: bool, phase: &str, name: &str, hash: &str, root_hash: &str) {
  if debug {
    event!(Level::INFO, step_name = %name, %hash, %root_hash, "{}", phase);
  } else {
    event!(Level::DEBUG, step_name = %name, %hash, %root_hash, "{}", phase);
  }
}

/// Runs one step through lock, store and hooks.
#[instrument(
  name = "Scope::invoke_step",
  skip_all,
  fields(step_name = %step.name),
  err(Display)
)]
async fn invoke_step(
  config: Arc<StepperConfig>,
  step: Arc<StepDef>,
  root: RootCell,
  input: Value,
) -> StepperResult<Value> {
  let hash = config.hash(&step.name, &input);
  let root_hash = root.get_or_init(|| hash.clone()).clone();
  let lock_key = config.lock_key(&step.name, &hash);

  let critical = critical_section(&config, &step, &hash, &root_hash, input);
  config.lock.with_lock(&lock_key, critical.boxed()).await
}

/// Everything that happens while the step's lock is held.
async fn critical_section(
  config: &Arc<StepperConfig>,
  step: &Arc<StepDef>,
  hash: &str,
  root_hash: &str,
  input: Value,
) -> StepperResult<Value> {
  let run = config.store.acquire(&step.name, hash, root_hash).await?;

  if run.is_done() {
    lifecycle(config.debug, "CACHED", &step.name, hash, root_hash);
    return Ok(run.output().unwrap_or(Value::Null));
  }
  if run.is_running() {
    event!(Level::WARN, step_name = %step.name, %hash, "Step is already running.");
    return Err(StepperError::Running {
      name: step.name.clone(),
      hash: hash.to_string(),
    });
  }

  // New or Failed.
  if !run.mark_running().await? {
    event!(Level::ERROR, step_name = %step.name, %hash, "Unable to mark step running.");
    return Err(StepperError::Mark {
      name: step.name.clone(),
      hash: hash.to_string(),
      root_hash: root_hash.to_string(),
      mark: MarkKind::Running,
    });
  }

  lifecycle(config.debug, "START", &step.name, hash, root_hash);
  match execute_body(config, step, &*run, hash, root_hash, input).await {
    Ok(output) => {
      lifecycle(config.debug, "DONE", &step.name, hash, root_hash);
      match run.mark_done(&output).await {
        Ok(true) => {}
        Ok(false) => event!(Level::ERROR, step_name = %step.name, %hash, "Unable to mark step done."),
        Err(e) => event!(Level::ERROR, step_name = %step.name, %hash, error = %e, "Unable to mark step done."),
      }
      Ok(output)
    }
    Err(err) => {
      lifecycle(config.debug, "FAILED", &step.name, hash, root_hash);
      match run.mark_failed(&err).await {
        Ok(true) => {}
        Ok(false) => event!(Level::ERROR, step_name = %step.name, %hash, error = %err, "Unable to mark step failed."),
        Err(e) => event!(Level::ERROR, step_name = %step.name, %hash, error = %e, "Unable to mark step failed."),
      }
      Err(err)
    }
  }
}

/// Vars, child scope, step hooks and the body itself. Any error here marks the run failed.
async fn execute_body(
  config: &Arc<StepperConfig>,
  step: &Arc<StepDef>,
  run: &dyn RunHandle,
  hash: &str,
  root_hash: &str,
  input: Value,
) -> StepperResult<Value> {
  let vars = run.vars().await?;
  let child = Scope::new(config.clone(), step.name.clone(), Some(root_hash.to_string()));
  let ctx = StepContext {
    name: step.name.clone(),
    input: input.clone(),
    hash: hash.to_string(),
    root_hash: root_hash.to_string(),
    vars: vars.clone(),
  };
  let handler = step.handler.clone();
  let body: Next = Box::new(move || handler(input, child, vars));
  // A panicking body must still leave the run Failed, or the key stays Running.
  match AssertUnwindSafe(config.hooks.step.run(ctx, body)).catch_unwind().await {
    Ok(result) => result,
    Err(payload) => {
      let message = panic_message(payload.as_ref());
      event!(Level::ERROR, step_name = %step.name, %hash, panic = %message, "Step body panicked.");
      Err(StepperError::HandlerError {
        source: anyhow::anyhow!("step body panicked: {}", message),
      })
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

impl Scope {
  /// Fresh root cell for one invocation; pre-filled when this scope already
  /// belongs to an invocation tree.
  fn root_cell(&self) -> RootCell {
    Arc::new(match &self.root_hash {
      Some(root_hash) => OnceCell::with_value(root_hash.clone()),
      None => OnceCell::new(),
    })
  }

  fn exec_context(&self, kind: ExecKind, step: Option<String>, input: &Value) -> ExecContext {
    ExecContext {
      kind,
      scope: self.name_prefix.clone(),
      step,
      input: input.clone(),
    }
  }

  /// Runs every registered step in registration order, feeding each output into
  /// the next step. Returns the last output, or `input` itself when no step is
  /// registered. Steps never overlap in time.
  #[instrument(
    name = "Scope::chain",
    skip_all,
    fields(scope = %self.name_prefix, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn chain<T: Serialize>(&self, input: T) -> StepperResult<Value> {
    let input = to_step_value(&input)?;
    let ctx = self.exec_context(ExecKind::Chain, None, &input);
    let config = self.config.clone();
    let steps = self.steps.clone();
    let root = self.root_cell();

    let body: Next = Box::new(move || {
      async move {
        let mut data = input;
        for step in steps {
          data = invoke_step(config.clone(), step, root.clone(), data).await?;
        }
        Ok::<Value, StepperError>(data)
      }
      .boxed()
    });
    self.config.hooks.exec.run(ctx, body).await
  }

  /// `chain`, with the final output deserialized into `R`.
  pub async fn chain_as<T: Serialize, R: DeserializeOwned>(&self, input: T) -> StepperResult<R> {
    let output = self.chain(input).await?;
    Ok(serde_json::from_value(output)?)
  }

  /// Runs every registered step concurrently with the same input.
  ///
  /// Outputs come back as a JSON array in registration order, whatever the
  /// completion order. The first failure to complete rejects the whole call; the
  /// other steps are independent tasks and keep running to completion, their
  /// results discarded. Must be called from within a Tokio runtime.
  #[instrument(
    name = "Scope::batch",
    skip_all,
    fields(scope = %self.name_prefix, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn batch<T: Serialize>(&self, input: T) -> StepperResult<Value> {
    let input = to_step_value(&input)?;
    let ctx = self.exec_context(ExecKind::Batch, None, &input);
    let config = self.config.clone();
    let steps = self.steps.clone();
    let root = self.root_cell();

    let body: Next = Box::new(move || {
      async move {
        // Fixed before fan-out so the root does not depend on task scheduling.
        if let Some(first) = steps.first() {
          root.get_or_init(|| config.hash(&first.name, &input));
        }
        let mut pending: FuturesUnordered<_> = steps
          .into_iter()
          .enumerate()
          .map(|(idx, step)| {
            let task = tokio::spawn(invoke_step(config.clone(), step, root.clone(), input.clone()));
            async move { (idx, task.await) }
          })
          .collect();

        let mut outputs = vec![Value::Null; pending.len()];
        while let Some((idx, joined)) = pending.next().await {
          match joined {
            Ok(Ok(output)) => outputs[idx] = output,
            Ok(Err(err)) => return Err(err),
            Err(join_err) => {
              return Err(StepperError::HandlerError {
                source: anyhow::Error::new(join_err),
              })
            }
          }
        }
        Ok(Value::Array(outputs))
      }
      .boxed()
    });
    self.config.hooks.exec.run(ctx, body).await
  }

  /// `batch`, with the outputs deserialized into `Vec<R>`.
  pub async fn batch_as<T: Serialize, R: DeserializeOwned>(&self, input: T) -> StepperResult<Vec<R>> {
    let output = self.batch(input).await?;
    Ok(serde_json::from_value(output)?)
  }

  /// Invokes exactly one registered step.
  #[instrument(name = "Scope::run", skip(self, input), fields(scope = %self.name_prefix), err(Display))]
  pub async fn run<T: Serialize>(&self, local_name: &str, input: T) -> StepperResult<Value> {
    let name = self.compose_name(local_name);
    let step = match self.by_name.get(&name) {
      Some(step) => step.clone(),
      None => {
        event!(Level::ERROR, step_name = %name, "Step is not defined.");
        return Err(StepperError::MissingStep { name });
      }
    };
    let input = to_step_value(&input)?;
    let ctx = self.exec_context(ExecKind::Run, Some(name), &input);
    let config = self.config.clone();
    let root = self.root_cell();

    let body: Next = Box::new(move || invoke_step(config, step, root, input).boxed());
    self.config.hooks.exec.run(ctx, body).await
  }

  /// `run`, with the output deserialized into `R`.
  pub async fn run_as<T: Serialize, R: DeserializeOwned>(&self, local_name: &str, input: T) -> StepperResult<R> {
    let output = self.run(local_name, input).await?;
    Ok(serde_json::from_value(output)?)
  }

  /// Read-only lookup of a run record. Takes no lock and executes nothing.
  ///
  /// `names` are joined with the name delimiter into an absolute full name; this
  /// scope's own prefix is not applied.
  pub async fn get<T: Serialize>(&self, names: &[&str], input: T) -> StepperResult<Box<dyn RunHandle>> {
    let name = names.join(self.config.name_delimiter.as_str());
    let input = to_step_value(&input)?;
    let hash = self.config.hash(&name, &input);
    self.config.store.peek(&name, &hash).await
  }
}
