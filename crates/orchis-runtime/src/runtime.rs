//! Workflow runtime.
//!
//! The [`Runtime`] is the entry point for running workflows. It owns the
//! queue backend jobs are dispatched to and the loader used for nested
//! workflows, and provides `run(workflow, inputs, events)`.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use orchis_error::WorkflowError;
use orchis_events::{EventBus, WorkflowEvent};
use orchis_workflow::Workflow;

use crate::config::RuntimeConfig;
use crate::execution::Execution;
use crate::loader::WorkflowLoader;

/// The workflow runtime.
pub struct Runtime {
  pub(crate) backend: Arc<dyn orchis_dispatch::QueueBackend>,
  pub(crate) loader: Arc<dyn WorkflowLoader>,
  pub(crate) config: RuntimeConfig,
}

impl Runtime {
  pub fn new(
    backend: Arc<dyn orchis_dispatch::QueueBackend>,
    loader: Arc<dyn WorkflowLoader>,
    config: RuntimeConfig,
  ) -> Self {
    Self {
      backend,
      loader,
      config,
    }
  }

  /// A bus sized for this runtime's runs.
  pub fn event_bus(&self) -> EventBus {
    EventBus::new(self.config.event_capacity)
  }

  /// Load a workflow through the runtime's loader.
  pub async fn load(&self, path: &str) -> Result<Workflow, WorkflowError> {
    self.loader.load(path).await
  }

  /// Run a workflow to completion.
  ///
  /// Returns the resolved `outputs` when the workflow declares them, otherwise
  /// every job's output keyed by job name, plus the `inputs`.
  pub async fn run(
    &self,
    workflow: &Workflow,
    inputs: Value,
    events: &EventBus,
  ) -> Result<Value, WorkflowError> {
    self
      .run_at_depth(workflow, inputs, events, self.config.max_nesting_level)
      .await
  }

  /// Run a workflow with `max_nesting_level` nested levels remaining.
  pub fn run_at_depth<'a>(
    &'a self,
    workflow: &'a Workflow,
    inputs: Value,
    events: &'a EventBus,
    max_nesting_level: u32,
  ) -> BoxFuture<'a, Result<Value, WorkflowError>> {
    self
      .execute(workflow, inputs, events, max_nesting_level)
      .boxed()
  }

  #[instrument(
    name = "workflow_run",
    skip(self, workflow, inputs, events),
    fields(workflow = %workflow.name)
  )]
  async fn execute(
    &self,
    workflow: &Workflow,
    inputs: Value,
    events: &EventBus,
    max_nesting_level: u32,
  ) -> Result<Value, WorkflowError> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    info!(
      execution_id = %execution_id,
      workflow = %workflow.name,
      job_count = workflow.jobs.len(),
      "workflow_started"
    );
    events.publish(WorkflowEvent::start(
      &workflow.name,
      inputs.clone(),
      workflow.jobs.len(),
    ));

    for (job, target) in workflow.undeclared_references() {
      warn!(
        execution_id = %execution_id,
        job = %job,
        reference = %target,
        "undeclared_reference"
      );
    }

    let result = Execution::new(self, workflow, events, max_nesting_level, execution_id.clone())
      .run(inputs)
      .await
      .map_err(|e| e.with_workflow(&workflow.name));
    let duration_ms = elapsed_ms(started);

    match &result {
      Ok(results) => {
        info!(execution_id = %execution_id, duration_ms, "workflow_completed");
        events.publish(WorkflowEvent::end(
          &workflow.name,
          results.clone(),
          duration_ms,
        ));
      }
      Err(e) => {
        error!(execution_id = %execution_id, duration_ms, error = %e, "workflow_failed");
        events.publish(WorkflowEvent::error(
          &workflow.name,
          e.clone().into(),
          duration_ms,
        ));
      }
    }

    result
  }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
  u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
