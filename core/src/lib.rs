// src/lib.rs

//! Stepper: an ASYNC, idempotent step-execution coordinator for Rust.
//!
//! Stepper runs named units of work (steps) so that each `(name, input)` pair
//! executes at most once, with features like:
//!  - Content-addressed run records: a step's key is the hash of its full name and input.
//!  - A `New -> Running -> Done | Failed` state machine behind a pluggable run store.
//!  - Mutual exclusion per key through a pluggable lock coordinator.
//!  - Hierarchical scopes: steps nest inside step bodies and share a root hash.
//!  - Sequential (`chain`) and concurrent (`batch`) execution of a scope's steps.
//!  - Before/around/after hooks at the step level and at the invocation level.
//!  - Step bodies resolved at registration time through a `StepLoader`.

/*
    Core Workflow:
    1. Build a `StepperConfig`, injecting a `RunStore` and a `LockCoordinator`.
       The defaults are no-ops: every call executes and nothing is excluded.
    2. Create a `Stepper` from it and take a root scope with `stepper.scope("PREFIX")`.
    3. Register async step bodies with `scope.add("Name", |input, scope, vars| ...)`.
       A body can register and run nested steps on the child scope it receives.
    4. Execute with `scope.run("Name", input)`, `scope.chain(input)` or `scope.batch(input)`.
    5. Inspect past runs with `scope.get(&["PREFIX", "Name"], input)`.
*/

pub mod config;
pub mod core;
pub mod error;
pub mod hashing;
pub mod loader;
pub mod lock;
pub mod pipeline;
pub mod stepper;
pub mod store;

// --- Re-exports for the Public API ---

pub use crate::core::step::{step_handler, StepDef, StepHandler};
pub use crate::core::vars::Vars;

pub use crate::pipeline::definition::Scope;
pub use crate::pipeline::hooks::{ExecContext, ExecKind, Hooks, Next, StepContext};

pub use crate::config::{StepperConfig, StepperConfigBuilder};
pub use crate::stepper::Stepper;

pub use crate::store::{MemoryRunStore, NoopRunStore, RunHandle, RunRecord, RunState, RunStore};
pub use crate::lock::{LockCoordinator, MemoryLock, NoopLock};

pub use crate::loader::{FunctionalStepLoader, StaticStepLoader, StepLoader};

pub use crate::hashing::{step_hash, HashFn};

pub use crate::error::{MarkKind, StepperError, StepperResult};
