//! Job handlers.
//!
//! A handler implements one task identifier. Handlers are registered in a
//! [`HandlerRegistry`] at startup and looked up by the queue backend when a
//! workflow connects to a task.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use orchis_events::{EventBus, WorkflowEvent};

use crate::error::HandlerError;

/// Task identifier of the built-in [`DebugHandler`].
pub const DEBUG_TASK: &str = "debug";

/// Executes dispatched jobs for one task identifier.
///
/// `inputs` is the job's resolved input mapping with `name` (the job name),
/// `task` and `job` (the task identifier) merged in. `events` is the bus of
/// the workflow run that dispatched the job.
#[async_trait]
pub trait JobHandler: Send + Sync {
  async fn invoke(&self, inputs: Value, events: EventBus) -> Result<Value, HandlerError>;
}

/// Adapter turning an async closure into a [`JobHandler`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
  F: Fn(Value, EventBus) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
  FnHandler(f)
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
  F: Fn(Value, EventBus) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
  async fn invoke(&self, inputs: Value, events: EventBus) -> Result<Value, HandlerError> {
    (self.0)(inputs, events).await
  }
}

/// Publishes its inputs as a `debug` event and returns an empty object.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugHandler;

#[async_trait]
impl JobHandler for DebugHandler {
  async fn invoke(&self, inputs: Value, events: EventBus) -> Result<Value, HandlerError> {
    let name = inputs
      .get("name")
      .and_then(Value::as_str)
      .unwrap_or(DEBUG_TASK)
      .to_string();
    events.publish(WorkflowEvent::debug(name, inputs));
    Ok(Value::Object(Map::new()))
  }
}

/// Task identifier -> handler table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
  handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry with the built-in handlers registered.
  pub fn with_builtins() -> Self {
    Self::new().with(DEBUG_TASK, DebugHandler)
  }

  /// Register a handler, replacing any previous handler for `task`.
  pub fn register(&mut self, task: impl Into<String>, handler: impl JobHandler + 'static) {
    self.handlers.insert(task.into(), Arc::new(handler));
  }

  pub fn with(mut self, task: impl Into<String>, handler: impl JobHandler + 'static) -> Self {
    self.register(task, handler);
    self
  }

  pub fn get(&self, task: &str) -> Option<Arc<dyn JobHandler>> {
    self.handlers.get(task).cloned()
  }

  /// Registered task identifiers, sorted.
  pub fn tasks(&self) -> Vec<&str> {
    let mut tasks: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
    tasks.sort_unstable();
    tasks
  }
}

impl std::fmt::Debug for HandlerRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HandlerRegistry")
      .field("tasks", &self.tasks())
      .finish()
  }
}
