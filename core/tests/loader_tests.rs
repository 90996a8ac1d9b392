// tests/loader_tests.rs
mod common;

use common::*;
use serde_json::json;
use serial_test::serial;
use stepper::{step_handler, FunctionalStepLoader, Scope, StaticStepLoader, StepHandler, StepperError, Vars};

fn loader() -> StaticStepLoader {
  let mut loader = StaticStepLoader::new();
  loader
    .register("steps/double", |x: i64, _s: Scope, _v: Vars| async move {
      Ok::<_, TestError>(x * 2)
    })
    .register("steps/negate", |x: i64, _s: Scope, _v: Vars| async move {
      Ok::<_, TestError>(-x)
    });
  loader
}

#[tokio::test]
#[serial]
async fn test_loaded_steps_run_like_inline_ones() {
  setup_tracing();
  let h = memory_harness();
  let loader = loader();
  let mut scope = h.stepper.scope("LOADED");
  scope.add_from("Double", "steps/double", &loader).unwrap();
  scope.add_from("Negate", "steps/negate", &loader).unwrap();

  assert_eq!(scope.step_names(), vec!["LOADED/Double", "LOADED/Negate"]);
  assert_eq!(scope.chain(21).await.unwrap(), json!(-42));
}

#[tokio::test]
#[serial]
async fn test_unknown_path_fails_at_registration() {
  setup_tracing();
  let h = memory_harness();
  let mut scope = h.stepper.scope("");

  match scope.add_from("Triple", "steps/triple", &loader()) {
    Err(StepperError::LoaderFailure { path, .. }) => assert_eq!(path, "steps/triple"),
    other => panic!("Expected LoaderFailure, got {:?}", other),
  }
  assert!(scope.is_empty());
}

#[tokio::test]
#[serial]
async fn test_duplicate_is_reported_before_loading() {
  setup_tracing();
  let h = memory_harness();
  let mut scope = h.stepper.scope("");
  scope.add_from("Double", "steps/double", &loader()).unwrap();

  // Would be a loader failure too; the duplicate wins.
  match scope.add_from("Double", "steps/missing", &loader()) {
    Err(StepperError::DuplicateStep { name }) => assert_eq!(name, "Double"),
    other => panic!("Expected DuplicateStep, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_functional_loader_builds_bodies_from_the_path() {
  setup_tracing();
  let h = memory_harness();
  let loader = FunctionalStepLoader::new(|path: &str| -> anyhow::Result<StepHandler> {
    let amount: i64 = path
      .strip_prefix("add/")
      .ok_or_else(|| anyhow::anyhow!("expected add/<n>"))?
      .parse()?;
    Ok(step_handler(move |x: i64, _s: Scope, _v: Vars| async move {
      Ok::<_, TestError>(x + amount)
    }))
  });
  let mut scope = h.stepper.scope("");
  scope.add_from("AddFive", "add/5", &loader).unwrap();
  assert_eq!(scope.run("AddFive", 1).await.unwrap(), json!(6));

  let err = scope.add_from("Bad", "mul/5", &loader).unwrap_err();
  assert_eq!(err.kind(), "loader");
}
