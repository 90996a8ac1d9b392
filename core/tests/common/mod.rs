// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::{Duration, Instant};
use stepper::{Hooks, LockCoordinator, MemoryLock, MemoryRunStore, NoopLock, Scope, Stepper, StepperConfig, Vars};
use tracing::Level;

// --- Common Error Type for Tests ---
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Test handler failed: {0}")]
  Handler(String),

  #[error("Test hook failed: {0}")]
  Hook(String),
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Engines with inspectable backends ---

pub struct Harness {
  pub stepper: Stepper,
  pub store: MemoryRunStore,
}

fn harness_with(lock: Arc<dyn LockCoordinator>, hooks: Hooks) -> Harness {
  let store = MemoryRunStore::new();
  let config = StepperConfig::builder()
    .store(Arc::new(store.clone()))
    .lock(lock)
    .hooks(hooks)
    .build()
    .expect("test config is valid");
  Harness {
    stepper: Stepper::new(config),
    store,
  }
}

/// Memory store and memory lock: full memoization and exclusion.
pub fn memory_harness() -> Harness {
  harness_with(Arc::new(MemoryLock::new()), Hooks::new())
}

pub fn memory_harness_with_hooks(hooks: Hooks) -> Harness {
  harness_with(Arc::new(MemoryLock::new()), hooks)
}

/// Memory store without exclusion, to observe running collisions.
pub fn unlocked_harness() -> Harness {
  harness_with(Arc::new(NoopLock::new()), Hooks::new())
}

// --- Step bodies ---

/// Body that counts its executions and returns `input + amount`.
pub fn add_counting(
  scope: &mut Scope,
  local_name: &str,
  amount: i64,
  counter: Arc<AtomicUsize>,
) -> stepper::StepperResult<()> {
  scope.add(local_name, move |x: i64, _scope: Scope, _vars: Vars| {
    let counter = counter.clone();
    async move {
      counter.fetch_add(1, Ordering::SeqCst);
      tracing::debug!(target: "test_steps", amount, "adding");
      Ok::<_, TestError>(x + amount)
    }
  })
}

/// Body that sleeps, records when it ran, then returns `input + amount`.
pub fn add_timed(
  scope: &mut Scope,
  local_name: &str,
  amount: i64,
  delay: Duration,
  spans: Arc<Mutex<Vec<(String, Instant, Instant)>>>,
) -> stepper::StepperResult<()> {
  let label = local_name.to_string();
  scope.add(local_name, move |x: i64, _scope: Scope, _vars: Vars| {
    let spans = spans.clone();
    let label = label.clone();
    async move {
      let start = Instant::now();
      tokio::time::sleep(delay).await;
      spans.lock().push((label, start, Instant::now()));
      Ok::<_, TestError>(x + amount)
    }
  })
}

pub fn new_counter() -> Arc<AtomicUsize> {
  Arc::new(AtomicUsize::new(0))
}

pub fn count(counter: &Arc<AtomicUsize>) -> usize {
  counter.load(Ordering::SeqCst)
}
