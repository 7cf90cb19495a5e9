//! In-process queue backend.
//!
//! Every enqueued job runs on its own tokio task. A semaphore shared by all
//! connections of the backend bounds how many handlers run at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Semaphore, oneshot};
use tracing::debug;
use uuid::Uuid;

use orchis_events::EventBus;

use crate::backend::{JobHandle, QueueBackend, QueueConnection};
use crate::error::{BackendError, HandlerError};
use crate::handler::{HandlerRegistry, JobHandler};

/// Handlers allowed to run at once when not configured.
pub const DEFAULT_CONCURRENCY: usize = 8;

type Completion = oneshot::Receiver<Result<Value, HandlerError>>;

/// Queue backend running registered handlers in this process.
pub struct LocalQueueBackend {
  registry: Arc<HandlerRegistry>,
  permits: Arc<Semaphore>,
  concurrency: usize,
}

impl LocalQueueBackend {
  pub fn new(registry: HandlerRegistry) -> Self {
    Self {
      registry: Arc::new(registry),
      permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
      concurrency: DEFAULT_CONCURRENCY,
    }
  }

  /// Set the number of handlers allowed to run at once (at least one).
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    let concurrency = concurrency.max(1);
    self.permits = Arc::new(Semaphore::new(concurrency));
    self.concurrency = concurrency;
    self
  }

  pub fn concurrency(&self) -> usize {
    self.concurrency
  }
}

#[async_trait]
impl QueueBackend for LocalQueueBackend {
  async fn connect(
    &self,
    task: &str,
    events: EventBus,
  ) -> Result<Arc<dyn QueueConnection>, BackendError> {
    let handler = self
      .registry
      .get(task)
      .ok_or_else(|| BackendError::UnknownTask {
        task: task.to_string(),
      })?;

    debug!(task = %task, "queue_connected");

    Ok(Arc::new(LocalConnection {
      task: task.to_string(),
      handler,
      events,
      permits: self.permits.clone(),
      pending: Mutex::new(HashMap::new()),
      closed: AtomicBool::new(false),
    }))
  }
}

struct LocalConnection {
  task: String,
  handler: Arc<dyn JobHandler>,
  events: EventBus,
  permits: Arc<Semaphore>,
  pending: Mutex<HashMap<Uuid, Completion>>,
  closed: AtomicBool,
}

impl LocalConnection {
  fn poisoned(e: impl std::fmt::Display) -> BackendError {
    BackendError::Internal {
      message: format!("pending job table lock poisoned: {}", e),
    }
  }
}

#[async_trait]
impl QueueConnection for LocalConnection {
  fn task(&self) -> &str {
    &self.task
  }

  async fn enqueue(&self, job: &str, payload: Value) -> Result<JobHandle, BackendError> {
    if self.closed.load(Ordering::Acquire) {
      return Err(BackendError::Closed {
        task: self.task.clone(),
      });
    }

    let handle = JobHandle::new(job);
    let (sender, receiver) = oneshot::channel();
    self
      .pending
      .lock()
      .map_err(Self::poisoned)?
      .insert(handle.id, receiver);

    let handler = self.handler.clone();
    let events = self.events.clone();
    let permits = self.permits.clone();
    tokio::spawn(async move {
      let result = match permits.acquire_owned().await {
        Ok(_permit) => handler.invoke(payload, events).await,
        Err(_) => Err(HandlerError::new("worker pool is shut down")),
      };
      // The receiver is gone when the dispatcher stopped waiting.
      let _ = sender.send(result);
    });

    debug!(task = %self.task, job = %job, id = %handle.id, "job_enqueued");
    Ok(handle)
  }

  async fn await_completion(&self, handle: &JobHandle) -> Result<Value, BackendError> {
    let receiver = self
      .pending
      .lock()
      .map_err(Self::poisoned)?
      .remove(&handle.id)
      .ok_or(BackendError::UnknownJob { id: handle.id })?;

    match receiver.await {
      Ok(result) => Ok(result?),
      Err(_) => Err(BackendError::Lost { id: handle.id }),
    }
  }

  async fn close(&self) -> Result<(), BackendError> {
    self.closed.store(true, Ordering::Release);
    debug!(task = %self.task, "queue_closed");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;
  use std::time::Duration;

  use serde_json::json;

  use super::*;
  use crate::handler::handler_fn;

  fn echo_registry() -> HandlerRegistry {
    HandlerRegistry::new().with(
      "echo",
      handler_fn(|inputs: Value, _events| async move { Ok::<_, HandlerError>(inputs) }),
    )
  }

  #[tokio::test]
  async fn test_enqueue_and_complete() {
    let backend = LocalQueueBackend::new(echo_registry());
    let connection = backend.connect("echo", EventBus::default()).await.unwrap();
    assert_eq!(connection.task(), "echo");

    let handle = connection.enqueue("a", json!({ "x": 1 })).await.unwrap();
    assert_eq!(handle.job, "a");
    let out = connection.await_completion(&handle).await.unwrap();
    assert_eq!(out, json!({ "x": 1 }));

    assert!(matches!(
      connection.await_completion(&handle).await,
      Err(BackendError::UnknownJob { .. })
    ));
  }

  #[tokio::test]
  async fn test_unknown_task() {
    let backend = LocalQueueBackend::new(echo_registry());
    assert!(matches!(
      backend.connect("nope", EventBus::default()).await,
      Err(BackendError::UnknownTask { task }) if task == "nope"
    ));
  }

  #[tokio::test]
  async fn test_handler_failure() {
    let registry = HandlerRegistry::new().with(
      "fail",
      handler_fn(|_inputs: Value, _events| async move {
        Err::<Value, _>(HandlerError::new("boom"))
      }),
    );
    let backend = LocalQueueBackend::new(registry);
    let connection = backend.connect("fail", EventBus::default()).await.unwrap();
    let handle = connection.enqueue("a", json!({})).await.unwrap();

    let err = connection.await_completion(&handle).await.unwrap_err();
    assert!(matches!(err, BackendError::Handler(_)));
    assert_eq!(err.to_string(), "boom");
  }

  #[tokio::test]
  async fn test_closed_rejects_enqueue() {
    let backend = LocalQueueBackend::new(echo_registry());
    let connection = backend.connect("echo", EventBus::default()).await.unwrap();
    connection.close().await.unwrap();
    assert!(matches!(
      connection.enqueue("a", json!({})).await,
      Err(BackendError::Closed { .. })
    ));
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrency_is_bounded() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (r, p) = (running.clone(), peak.clone());

    let registry = HandlerRegistry::new().with(
      "slow",
      handler_fn(move |inputs: Value, _events| {
        let running = r.clone();
        let peak = p.clone();
        async move {
          let now = running.fetch_add(1, Ordering::SeqCst) + 1;
          peak.fetch_max(now, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(10)).await;
          running.fetch_sub(1, Ordering::SeqCst);
          Ok::<_, HandlerError>(inputs)
        }
      }),
    );
    let backend = LocalQueueBackend::new(registry).with_concurrency(2);
    assert_eq!(backend.concurrency(), 2);
    let connection = backend.connect("slow", EventBus::default()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..5 {
      handles.push(connection.enqueue("job", json!(i)).await.unwrap());
    }
    for (i, handle) in handles.iter().enumerate() {
      assert_eq!(connection.await_completion(handle).await.unwrap(), json!(i));
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
  }
}
