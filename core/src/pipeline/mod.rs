// stepper/src/pipeline/mod.rs

//! Defines the `Scope` struct, its construction, execution and hook chains.

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::Scope;
