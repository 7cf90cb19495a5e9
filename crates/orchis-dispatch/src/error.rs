use thiserror::Error;
use uuid::Uuid;

/// Failure reported by a job handler.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
  pub fn new(message: impl std::fmt::Display) -> Self {
    Self(message.to_string())
  }
}

impl From<serde_json::Error> for HandlerError {
  fn from(e: serde_json::Error) -> Self {
    Self(format!("invalid handler payload: {}", e))
  }
}

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("no handler registered for task \"{task}\"")]
  UnknownTask { task: String },

  #[error("queue for task \"{task}\" is closed")]
  Closed { task: String },

  #[error(transparent)]
  Handler(#[from] HandlerError),

  #[error("job {id} is not pending")]
  UnknownJob { id: Uuid },

  #[error("job {id} was dropped before it completed")]
  Lost { id: Uuid },

  #[error("{message}")]
  Internal { message: String },
}
