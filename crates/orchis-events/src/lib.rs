//! Workflow lifecycle events.
//!
//! Every run publishes [`WorkflowEvent`]s on an [`EventBus`]. Job handlers get
//! a clone of the bus too, so they can publish their own events (the built-in
//! `debug` task does). A nested workflow runs on a bus made with
//! [`EventBus::nested`], which publishes each of its events on the parent bus
//! too, wrapped in [`WorkflowEvent::NestedWorkflow`].

mod bus;
mod event;

pub use bus::{DEFAULT_EVENT_CAPACITY, EventBus};
pub use event::WorkflowEvent;
