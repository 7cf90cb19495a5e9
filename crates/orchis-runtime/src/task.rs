use serde_json::Value;
use tokio::time::Instant;
use tracing::info;

use orchis_error::{JobExecutionError, OrchisError};
use orchis_events::WorkflowEvent;
use orchis_workflow::Job;

use crate::execution::{Scheduler, StepTarget, Unit};

impl Scheduler<'_> {
  /// Unit body of a job dispatched to a task queue.
  pub(crate) async fn run_task_job(
    &self,
    job: &Job,
    task: &str,
    dependencies: Vec<(&str, Unit<'_>)>,
  ) -> Result<(), OrchisError> {
    let started = Instant::now();
    self.events.publish(WorkflowEvent::job_started(
      &job.name,
      Some(task),
      None,
      job.depends_on.clone(),
    ));
    info!(
      execution_id = %self.execution_id,
      job = %job.name,
      task = %task,
      "job_started"
    );

    let result = self.execute_task(job, dependencies).await;
    self.settle(job, started, result)
  }

  async fn execute_task(
    &self,
    job: &Job,
    dependencies: Vec<(&str, Unit<'_>)>,
  ) -> Result<Value, OrchisError> {
    self
      .wait_for_dependencies(job, dependencies)
      .await
      .map_err(|e| JobExecutionError::dependency_failed(&job.name, e))?;
    self.execute_job(job, StepTarget::Dispatch).await
  }
}
