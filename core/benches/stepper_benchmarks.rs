use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use stepper::{step_hash, MemoryLock, MemoryRunStore, Scope, Stepper, StepperConfig, StepperError, Vars};
use tokio::runtime::Runtime; // To run async code within Criterion

fn scope_with_steps(stepper: &Stepper, num_steps: usize) -> Scope {
  let mut scope = stepper.scope("BENCH");
  for i in 0..num_steps {
    scope
      .add(&format!("step_{}", i), |x: u64, _s: Scope, _v: Vars| async move {
        Ok::<_, StepperError>(x.wrapping_add(1))
      })
      .unwrap();
  }
  scope
}

fn memory_stepper() -> Stepper {
  let config = StepperConfig::builder()
    .store(Arc::new(MemoryRunStore::new()))
    .lock(Arc::new(MemoryLock::new()))
    .build()
    .unwrap();
  Stepper::new(config)
}

// --- Benchmark Functions ---

/// Engine overhead per step with no-op backends: every call executes.
fn bench_chain_noop_backends(c: &mut Criterion) {
  let mut group = c.benchmark_group("ChainNoopBackends");
  let rt = Runtime::new().unwrap();
  let stepper = Stepper::with_defaults();

  for num_steps in [1usize, 5, 10].iter() {
    let scope = Arc::new(scope_with_steps(&stepper, *num_steps));
    group.throughput(Throughput::Elements(*num_steps as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_steps), num_steps, |b, _| {
      b.to_async(&rt).iter(|| {
        let scope = scope.clone();
        async move { scope.chain(0u64).await.unwrap() }
      });
    });
  }
  group.finish();
}

fn bench_batch_noop_backends(c: &mut Criterion) {
  let mut group = c.benchmark_group("BatchNoopBackends");
  let rt = Runtime::new().unwrap();
  let stepper = Stepper::with_defaults();

  for num_steps in [1usize, 5, 10].iter() {
    let scope = Arc::new(scope_with_steps(&stepper, *num_steps));
    group.throughput(Throughput::Elements(*num_steps as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_steps), num_steps, |b, _| {
      b.to_async(&rt).iter(|| {
        let scope = scope.clone();
        async move { scope.batch(0u64).await.unwrap() }
      });
    });
  }
  group.finish();
}

/// Memoized path: lock, store lookup and cached output, no body.
fn bench_cached_run(c: &mut Criterion) {
  let mut group = c.benchmark_group("CachedRun");
  let rt = Runtime::new().unwrap();
  let scope = Arc::new(scope_with_steps(&memory_stepper(), 1));
  rt.block_on(scope.run("step_0", 7u64)).unwrap();

  group.throughput(Throughput::Elements(1));
  group.bench_function("memory_backends", |b| {
    b.to_async(&rt).iter(|| {
      let scope = scope.clone();
      async move { scope.run("step_0", 7u64).await.unwrap() }
    });
  });
  group.finish();
}

fn bench_step_hash(c: &mut Criterion) {
  let mut group = c.benchmark_group("StepHash");
  let small = json!({"id": 1});
  let large = json!({
    "items": (0..100).map(|i| json!({"id": i, "name": format!("item_{}", i)})).collect::<Vec<_>>(),
  });
  group.bench_function("small_input", |b| b.iter(|| step_hash("Root/Step", &small)));
  group.bench_function("large_input", |b| b.iter(|| step_hash("Root/Step", &large)));
  group.finish();
}

criterion_group!(
  benches,
  bench_chain_noop_backends,
  bench_batch_noop_backends,
  bench_cached_run,
  bench_step_hash
);
criterion_main!(benches);
