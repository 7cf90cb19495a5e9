use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use orchis_events::EventBus;

use crate::error::BackendError;

/// Handle of an enqueued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
  pub id: Uuid,
  pub job: String,
}

impl JobHandle {
  pub fn new(job: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4(),
      job: job.into(),
    }
  }
}

/// A job queue system.
#[async_trait]
pub trait QueueBackend: Send + Sync {
  /// Open a connection to the queue serving `task`.
  ///
  /// `events` is the bus of the run the connection belongs to; handlers
  /// publish on it.
  async fn connect(
    &self,
    task: &str,
    events: EventBus,
  ) -> Result<Arc<dyn QueueConnection>, BackendError>;
}

/// A connection to one task queue.
#[async_trait]
pub trait QueueConnection: Send + Sync {
  fn task(&self) -> &str;

  async fn enqueue(&self, job: &str, payload: Value) -> Result<JobHandle, BackendError>;

  /// Wait for an enqueued job to finish and return its output.
  async fn await_completion(&self, handle: &JobHandle) -> Result<Value, BackendError>;

  /// Stop accepting jobs. Jobs already running are not interrupted.
  async fn close(&self) -> Result<(), BackendError>;
}
