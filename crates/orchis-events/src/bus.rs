use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};

use crate::WorkflowEvent;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Multi-consumer bus for the events of one workflow run.
///
/// Cloning the bus clones the sender. Publishing with no subscribers is a
/// no-op.
///
/// Broadcast subscribers lag when they fall more than `capacity` events
/// behind; [`EventBus::listen`] gives a receiver that never drops events. A
/// bus created with [`EventBus::nested`] additionally hands every event,
/// wrapped in [`WorkflowEvent::NestedWorkflow`], straight to its parent bus.
#[derive(Clone)]
pub struct EventBus {
  inner: Arc<Inner>,
}

struct Inner {
  sender: broadcast::Sender<WorkflowEvent>,
  capacity: usize,
  listeners: Mutex<Vec<mpsc::UnboundedSender<WorkflowEvent>>>,
  parent: Option<Parent>,
}

struct Parent {
  bus: EventBus,
  job: String,
  iteration: Option<usize>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    Self::build(capacity, None)
  }

  fn build(capacity: usize, parent: Option<Parent>) -> Self {
    let (sender, _) = broadcast::channel(capacity);
    Self {
      inner: Arc::new(Inner {
        sender,
        capacity,
        listeners: Mutex::new(Vec::new()),
        parent,
      }),
    }
  }

  /// Bus for a nested run started by `job` (at `iteration`, when iterating).
  ///
  /// Every event published on the returned bus is also published on this one
  /// as a `nestedWorkflowEvent`, before `publish` returns.
  pub fn nested(&self, job: impl Into<String>, iteration: Option<usize>) -> Self {
    Self::build(
      self.inner.capacity,
      Some(Parent {
        bus: self.clone(),
        job: job.into(),
        iteration,
      }),
    )
  }

  /// Subscribe to all events published from now on.
  pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
    self.inner.sender.subscribe()
  }

  /// Receive all events published from now on, without a bound.
  pub fn listen(&self) -> mpsc::UnboundedReceiver<WorkflowEvent> {
    let (sender, receiver) = mpsc::unbounded_channel();
    if let Ok(mut listeners) = self.inner.listeners.lock() {
      listeners.push(sender);
    }
    receiver
  }

  pub fn publish(&self, event: WorkflowEvent) {
    if let Ok(mut listeners) = self.inner.listeners.lock() {
      listeners.retain(|listener| listener.send(event.clone()).is_ok());
    }

    match &self.inner.parent {
      Some(parent) => {
        let _ = self.inner.sender.send(event.clone());
        parent
          .bus
          .publish(WorkflowEvent::nested(&parent.job, parent.iteration, event));
      }
      None => {
        let _ = self.inner.sender.send(event);
      }
    }
  }

  pub fn receiver_count(&self) -> usize {
    self.inner.sender.receiver_count()
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(DEFAULT_EVENT_CAPACITY)
  }
}

impl std::fmt::Debug for EventBus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventBus")
      .field("capacity", &self.inner.capacity)
      .field("receiver_count", &self.inner.sender.receiver_count())
      .field("nested", &self.inner.parent.is_some())
      .finish()
  }
}
