// stepper/src/error.rs
use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

/// Which run-record transition was rejected by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
  Running,
  Done,
  Failed,
}

impl fmt::Display for MarkKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MarkKind::Running => f.write_str("running"),
      MarkKind::Done => f.write_str("done"),
      MarkKind::Failed => f.write_str("failed"),
    }
  }
}

#[derive(Debug, Error)]
pub enum StepperError {
  #[error("Step is already defined: {name}")]
  DuplicateStep { name: String },

  #[error("Step is not defined: {name}")]
  MissingStep { name: String },

  #[error("Step is already running: {name} ({hash})")]
  Running { name: String, hash: String },

  #[error("Unable to mark step '{name}' ({hash}) as {mark}")]
  Mark {
    name: String,
    hash: String,
    root_hash: String,
    mark: MarkKind,
  },

  #[error("Unable to serialize step data. Source: {source}")]
  Serialization {
    #[source]
    source: serde_json::Error,
  },

  #[error("Run store failure. Source: {source}")]
  Storage {
    #[source]
    source: AnyhowError,
  },

  #[error("Lock failure for '{key}'. Source: {source}")]
  Lock {
    key: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Step loader failed for '{path}'. Source: {source}")]
  LoaderFailure {
    path: String,
    #[source]
    source: AnyhowError,
  },

  #[error("Configuration error: {message}")]
  Configuration { message: String },

  #[error("Error in step body or hook. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },
}

impl StepperError {
  /// Converts an error returned by a step body or hook.
  pub fn from_handler<E: Into<AnyhowError>>(err: E) -> Self {
    let err: AnyhowError = err.into();
    StepperError::from(err)
  }

  /// Short, stable label of the error kind. Stores persist this next to the message.
  pub fn kind(&self) -> &'static str {
    match self {
      StepperError::DuplicateStep { .. } => "duplicate",
      StepperError::MissingStep { .. } => "missing",
      StepperError::Running { .. } => "running",
      StepperError::Mark { .. } => "mark",
      StepperError::Serialization { .. } => "serialization",
      StepperError::Storage { .. } => "storage",
      StepperError::Lock { .. } => "lock",
      StepperError::LoaderFailure { .. } => "loader",
      StepperError::Configuration { .. } => "configuration",
      StepperError::HandlerError { .. } => "handler",
    }
  }
}

// Body errors travel as anyhow::Error. A nested step failure that was propagated
// with `?` comes back out as the StepperError it started as, not wrapped twice.
impl From<AnyhowError> for StepperError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<StepperError>() {
      Ok(stepper_err) => stepper_err,
      Err(source) => StepperError::HandlerError { source },
    }
  }
}

impl From<serde_json::Error> for StepperError {
  fn from(source: serde_json::Error) -> Self {
    StepperError::Serialization { source }
  }
}

pub type StepperResult<T, E = StepperError> = std::result::Result<T, E>;
