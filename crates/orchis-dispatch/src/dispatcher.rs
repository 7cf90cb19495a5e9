use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use orchis_error::{JobExecutionError, WorkflowError};
use orchis_events::EventBus;

use crate::backend::{QueueBackend, QueueConnection};

/// Dispatches a run's task jobs to their queues.
///
/// One connection is opened per task job, all of them before any job starts.
pub struct Dispatcher {
  connections: HashMap<String, Arc<dyn QueueConnection>>,
}

impl Dispatcher {
  /// Open a connection for every `(job, task)` pair, concurrently.
  ///
  /// Each connection must be ready within `init_timeout`. If any connection
  /// fails, the ones already opened are closed and the first failure (in
  /// input order) is returned.
  pub async fn connect<'a>(
    backend: &dyn QueueBackend,
    jobs: impl IntoIterator<Item = (&'a str, &'a str)>,
    events: &EventBus,
    init_timeout: Duration,
  ) -> Result<Self, WorkflowError> {
    let attempts = jobs.into_iter().map(|(job, task)| {
      let events = events.clone();
      async move {
        let result = tokio::time::timeout(init_timeout, backend.connect(task, events)).await;
        (job, task, result)
      }
    });

    let mut connections = HashMap::new();
    let mut failure = None;
    for (job, task, result) in join_all(attempts).await {
      match result {
        Ok(Ok(connection)) => {
          connections.insert(job.to_string(), connection);
        }
        Ok(Err(e)) => {
          failure.get_or_insert_with(|| WorkflowError::queue_initialization(job, task, e));
        }
        Err(_) => {
          failure.get_or_insert_with(|| {
            WorkflowError::queue_initialization(
              job,
              task,
              format!("not ready within {}ms", init_timeout.as_millis()),
            )
          });
        }
      }
    }

    let dispatcher = Self { connections };
    match failure {
      Some(err) => {
        dispatcher.close().await;
        Err(err)
      }
      None => Ok(dispatcher),
    }
  }

  /// Number of open connections.
  pub fn len(&self) -> usize {
    self.connections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.connections.is_empty()
  }

  /// Enqueue `inputs` for `job` and wait at most `timeout_ms` for the output.
  ///
  /// On timeout only the local wait is abandoned; the queued job keeps
  /// running.
  pub async fn dispatch(
    &self,
    job: &str,
    inputs: Value,
    timeout_ms: u64,
  ) -> Result<Value, JobExecutionError> {
    let connection = self
      .connections
      .get(job)
      .ok_or_else(|| JobExecutionError::backend(job, "no queue connection for job"))?;

    let payload = job_payload(job, connection.task(), inputs);
    let handle = connection
      .enqueue(job, payload)
      .await
      .map_err(|e| JobExecutionError::backend(job, e.to_string()))?;
    debug!(job = %job, id = %handle.id, timeout_ms, "job_dispatched");

    match tokio::time::timeout(
      Duration::from_millis(timeout_ms),
      connection.await_completion(&handle),
    )
    .await
    {
      Ok(Ok(output)) => Ok(output),
      Ok(Err(e)) => Err(JobExecutionError::backend(job, e.to_string())),
      Err(_) => Err(JobExecutionError::timeout(job, timeout_ms)),
    }
  }

  /// Close every connection. Failures are logged and otherwise ignored.
  pub async fn close(self) {
    let closing = self.connections.iter().map(|(job, connection)| async move {
      if let Err(e) = connection.close().await {
        warn!(job = %job, task = %connection.task(), error = %e, "queue_close_failed");
      }
    });
    join_all(closing).await;
  }
}

/// Payload handed to a handler: the resolved inputs with `name` (the job
/// name), `task` and `job` (the task identifier) merged in.
///
/// Job inputs are a mapping or absent; absent inputs give a payload with only
/// the metadata keys.
pub fn job_payload(job: &str, task: &str, inputs: Value) -> Value {
  let mut payload = match inputs {
    Value::Object(map) => map,
    _ => Map::new(),
  };
  payload.insert("name".to_string(), Value::String(job.to_string()));
  payload.insert("task".to_string(), Value::String(task.to_string()));
  payload.insert("job".to_string(), Value::String(task.to_string()));
  Value::Object(payload)
}
