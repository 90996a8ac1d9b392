// stepper_core/examples/nested_steps.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use stepper::{Hooks, MemoryLock, MemoryRunStore, Next, Scope, StepContext, Stepper, StepperConfig, StepperError, Vars};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
  id: u32,
  items: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Invoice {
  order_id: u32,
  total: u32,
}

#[tokio::main]
async fn main() -> Result<(), StepperError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Nested Steps Example ---");

  // 1. An around hook that times every step body.
  let hooks = Hooks::new().around_step(|next: Next, ctx: StepContext| async move {
    let started = Instant::now();
    let output = next().await?;
    info!(step = %ctx.name, elapsed_us = started.elapsed().as_micros() as u64, "step body finished");
    Ok::<Value, StepperError>(output)
  });

  // 2. Memory backends: each (step, input) pair executes once per process.
  let store = MemoryRunStore::new();
  let config = StepperConfig::builder()
    .store(Arc::new(store.clone()))
    .lock(Arc::new(MemoryLock::new()))
    .hooks(hooks)
    .debug(true)
    .build()?;
  let stepper = Stepper::new(config);

  // 3. A top-level step that chains two children. The first child prices every
  //    item through a step nested one level deeper.
  let mut billing = stepper.scope("BILLING");
  billing.add("Invoice", |order: Order, mut scope: Scope, vars: Vars| async move {
    scope.add("Subtotal", |items: Vec<u32>, mut scope: Scope, _vars: Vars| async move {
      scope.add("Price", |item: u32, _scope: Scope, _vars: Vars| async move {
        info!(item, "pricing item");
        Ok::<_, StepperError>(item * 100)
      })?;
      let mut subtotal = 0;
      for item in &items {
        subtotal += scope.run_as::<_, u32>("Price", item).await?;
      }
      Ok::<_, StepperError>(subtotal)
    })?;
    scope.add("Tax", |subtotal: u32, _scope: Scope, _vars: Vars| async move {
      Ok::<_, StepperError>(subtotal + subtotal / 10)
    })?;

    let total: u32 = scope.chain_as(&order.items).await?;
    vars.set("priced_items", order.items.len())?;
    Ok::<_, StepperError>(Invoice {
      order_id: order.id,
      total,
    })
  })?;

  // 4. Run it twice; the second call is served from the store.
  let order = Order {
    id: 7,
    items: vec![1, 2, 2, 3],
  };
  let first: Invoice = billing.run_as("Invoice", &order).await?;
  let second: Invoice = billing.run_as("Invoice", &order).await?;
  info!(?first, ?second, "Invoices computed");

  // 5. Every run from that invocation is grouped under the top-level hash.
  let root_hash = stepper.config().hash("BILLING/Invoice", &serde_json::to_value(&order)?);
  for record in store.records_for_root(&root_hash) {
    info!(name = %record.name, state = ?record.state, output = ?record.output, "run record");
  }

  let price_of_two = billing.get(&["BILLING", "Invoice", "Subtotal", "Price"], 2).await?;
  info!(state = ?price_of_two.state(), output = ?price_of_two.output(), "looked up nested run");

  Ok(())
}
