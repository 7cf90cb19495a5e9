//! Jobs that run another workflow.
//!
//! The child workflow is loaded once per job and run one nesting level down,
//! once or once per iteration element. Each child run publishes on a nested
//! bus, which hands every event to the parent bus as a `nestedWorkflowEvent`
//! as it is published.

use serde_json::Value;
use tokio::time::Instant;
use tracing::{info, warn};

use orchis_error::{NestedWorkflowError, OrchisError, WorkflowError};
use orchis_events::WorkflowEvent;
use orchis_workflow::{Job, Workflow};

use crate::execution::{Scheduler, StepTarget, Unit};

impl Scheduler<'_> {
  /// Unit body of a nested workflow job.
  pub(crate) async fn run_nested_job(
    &self,
    job: &Job,
    workflow_path: &str,
    dependencies: Vec<(&str, Unit<'_>)>,
  ) -> Result<(), OrchisError> {
    if self.max_nesting_level == 0 {
      warn!(
        execution_id = %self.execution_id,
        job = %job.name,
        workflow_path = %workflow_path,
        "nesting_depth_exceeded"
      );
      let err: OrchisError =
        NestedWorkflowError::depth_exceeded(&job.name, workflow_path, self.max_nesting_level).into();
      self
        .events
        .publish(WorkflowEvent::job_failed(&job.name, err.clone(), 0));
      return Err(err);
    }

    let started = Instant::now();
    self.events.publish(WorkflowEvent::job_started(
      &job.name,
      None,
      Some(workflow_path),
      job.depends_on.clone(),
    ));
    info!(
      execution_id = %self.execution_id,
      job = %job.name,
      workflow_path = %workflow_path,
      "job_started"
    );

    let result: Result<Value, OrchisError> = self
      .execute_nested(job, workflow_path, dependencies)
      .await
      .map_err(|e| NestedWorkflowError::failed(&job.name, workflow_path, e).into());
    self.settle(job, started, result)
  }

  async fn execute_nested(
    &self,
    job: &Job,
    workflow_path: &str,
    dependencies: Vec<(&str, Unit<'_>)>,
  ) -> Result<Value, OrchisError> {
    self.wait_for_dependencies(job, dependencies).await?;
    let child = self.runtime.load(workflow_path).await?;
    self.execute_job(job, StepTarget::Workflow(&child)).await
  }

  /// Run `child` once with `inputs`, forwarding its events to the parent bus.
  pub(crate) async fn run_child(
    &self,
    job: &Job,
    child: &Workflow,
    inputs: Value,
    iteration: Option<usize>,
  ) -> Result<Value, WorkflowError> {
    let child_events = self.events.nested(&job.name, iteration);
    self
      .runtime
      .run_at_depth(child, inputs, &child_events, self.max_nesting_level - 1)
      .await
  }
}
