//! Execution of one workflow run.
//!
//! Every job gets an execution unit: a shared future that first awaits the
//! units of its dependencies and then runs the job. All units are created up
//! front and polled together on the run's own task, so independent branches
//! proceed concurrently without any ready-queue bookkeeping. Units are built
//! in dependency-first order so each one can hold clones of its dependencies'
//! units.
//!
//! A failing job never cancels its siblings. The run waits for every unit to
//! settle and then reports all failures at once.

use std::collections::HashMap;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, error, info};

use orchis_dispatch::Dispatcher;
use orchis_error::{DependencyError, JobExecutionError, OrchisError, WorkflowError, WorkflowErrorKind};
use orchis_events::{EventBus, WorkflowEvent};
use orchis_template::{Overlay, resolve_value, type_name};
use orchis_workflow::{Job, JobKind, Workflow};

use crate::registry::{RegistryError, ResultsRegistry};
use crate::runtime::{Runtime, elapsed_ms};

/// Registry key of the per-step iteration context.
const ITERATE_KEY: &str = "iterate";

pub(crate) type Unit<'s> = Shared<BoxFuture<'s, Result<(), OrchisError>>>;

/// A workflow run that has not connected its queues yet.
pub(crate) struct Execution<'a> {
  runtime: &'a Runtime,
  workflow: &'a Workflow,
  events: &'a EventBus,
  max_nesting_level: u32,
  execution_id: String,
}

impl<'a> Execution<'a> {
  pub(crate) fn new(
    runtime: &'a Runtime,
    workflow: &'a Workflow,
    events: &'a EventBus,
    max_nesting_level: u32,
    execution_id: String,
  ) -> Self {
    Self {
      runtime,
      workflow,
      events,
      max_nesting_level,
      execution_id,
    }
  }

  /// Connect queues, run every job and resolve the outputs.
  pub(crate) async fn run(self, inputs: Value) -> Result<Value, WorkflowError> {
    let dispatcher = Dispatcher::connect(
      self.runtime.backend.as_ref(),
      self.workflow.task_jobs(),
      self.events,
      self.runtime.config.queue_init_timeout,
    )
    .await?;
    debug!(
      execution_id = %self.execution_id,
      connections = dispatcher.len(),
      "queues_connected"
    );

    let registry = ResultsRegistry::new(inputs);
    let errors = Scheduler {
      runtime: self.runtime,
      workflow: self.workflow,
      events: self.events,
      registry: &registry,
      dispatcher: &dispatcher,
      max_nesting_level: self.max_nesting_level,
      execution_id: &self.execution_id,
    }
    .run_all()
    .await;

    dispatcher.close().await;

    if !errors.is_empty() {
      return Err(WorkflowError::jobs_failed(errors, registry.snapshot().ok()));
    }

    self.outputs(&registry)
  }

  fn outputs(&self, registry: &ResultsRegistry) -> Result<Value, WorkflowError> {
    let unreadable = |e: RegistryError| WorkflowError::new(WorkflowErrorKind::Outputs, e.to_string());
    match &self.workflow.outputs {
      Some(outputs) => {
        let template = Value::Object(outputs.clone());
        registry
          .read(|scope| resolve_value(&template, scope))
          .map_err(unreadable)?
          .map_err(WorkflowError::outputs)
      }
      None => registry.snapshot().map_err(unreadable),
    }
  }
}

/// What a job does with each set of resolved inputs.
pub(crate) enum StepTarget<'w> {
  /// Dispatch to the job's task queue.
  Dispatch,
  /// Run this workflow one level down.
  Workflow(&'w Workflow),
}

/// State shared by the execution units of one run.
pub(crate) struct Scheduler<'a> {
  pub(crate) runtime: &'a Runtime,
  pub(crate) workflow: &'a Workflow,
  pub(crate) events: &'a EventBus,
  pub(crate) registry: &'a ResultsRegistry,
  pub(crate) dispatcher: &'a Dispatcher,
  pub(crate) max_nesting_level: u32,
  pub(crate) execution_id: &'a str,
}

impl<'a> Scheduler<'a> {
  /// Create every unit, wait for all of them and collect the failures in job
  /// name order.
  async fn run_all(&self) -> Vec<OrchisError> {
    let mut units: HashMap<&str, Unit<'_>> = HashMap::new();
    for job in self.workflow.execution_order() {
      let dependencies = job
        .depends_on
        .iter()
        .filter_map(|name| units.get(name.as_str()).map(|unit| (name.as_str(), unit.clone())))
        .collect();
      let unit = self.job_unit(job, dependencies).shared();
      units.insert(job.name.as_str(), unit);
    }

    let settled = join_all(
      self
        .workflow
        .jobs
        .keys()
        .filter_map(|name| units.get(name.as_str()).cloned()),
    )
    .await;

    settled.into_iter().filter_map(Result::err).collect()
  }

  fn job_unit<'s>(
    &'s self,
    job: &'a Job,
    dependencies: Vec<(&'s str, Unit<'s>)>,
  ) -> BoxFuture<'s, Result<(), OrchisError>> {
    async move {
      match &job.kind {
        JobKind::Task { task } => self.run_task_job(job, task, dependencies).await,
        JobKind::Workflow { workflow_path } => {
          self.run_nested_job(job, workflow_path, dependencies).await
        }
      }
    }
    .boxed()
  }

  /// Wait until every dependency has settled. Fails with the first failed
  /// dependency in declaration order.
  pub(crate) async fn wait_for_dependencies(
    &self,
    job: &Job,
    dependencies: Vec<(&str, Unit<'_>)>,
  ) -> Result<(), DependencyError> {
    if dependencies.is_empty() {
      return Ok(());
    }
    debug!(
      execution_id = %self.execution_id,
      job = %job.name,
      dependencies = ?job.depends_on,
      "waiting_on_dependencies"
    );

    let settled = join_all(
      dependencies
        .into_iter()
        .map(|(name, unit)| async move { (name, unit.await) }),
    )
    .await;

    for (name, result) in settled {
      if let Err(source) = result {
        return Err(DependencyError::upstream_failed(&job.name, name, source));
      }
    }
    Ok(())
  }

  /// Resolve the job's inputs, optionally with a per-step `iterate` context.
  pub(crate) fn resolve_inputs(
    &self,
    job: &Job,
    step: Option<&Value>,
  ) -> Result<Value, JobExecutionError> {
    let resolved = self
      .registry
      .read(|scope| match step {
        Some(step) => resolve_value(&job.inputs, &Overlay::new(scope, ITERATE_KEY, step)),
        None => resolve_value(&job.inputs, scope),
      })
      .map_err(|e| JobExecutionError::registry(&job.name, e.to_string()))?;

    resolved.map_err(|e| JobExecutionError::input_resolution(&job.name, e.with_job(&job.name)))
  }

  /// Resolve the job's `iterate` target, which must be an array.
  fn resolve_iteration(&self, job: &Job, target: &Value) -> Result<Vec<Value>, JobExecutionError> {
    let resolved = self
      .registry
      .read(|scope| resolve_value(target, scope))
      .map_err(|e| JobExecutionError::registry(&job.name, e.to_string()))?
      .map_err(|e| JobExecutionError::input_resolution(&job.name, e.with_job(&job.name)))?;

    match resolved {
      Value::Array(items) => Ok(items),
      other => Err(JobExecutionError::not_sequence(&job.name, type_name(&other))),
    }
  }

  /// Run the job once, or once per element of its `iterate` target, and
  /// record the output.
  ///
  /// Iteration steps run one after another; each step's `iterate` context is
  /// only visible to that step's input resolution.
  pub(crate) async fn execute_job(
    &self,
    job: &Job,
    target: StepTarget<'_>,
  ) -> Result<Value, OrchisError> {
    let output = match &job.iterate {
      Some(iterate) => {
        let items = self.resolve_iteration(job, iterate)?;
        self
          .events
          .publish(WorkflowEvent::iteration_started(&job.name, items.len()));

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
          self
            .events
            .publish(WorkflowEvent::iteration_step(&job.name, index, item.clone()));
          let step = json!({ "item": item, "index": index });
          let inputs = self.resolve_inputs(job, Some(&step))?;
          results.push(self.run_step(job, &target, Some(index), inputs).await?);
        }

        let results = Value::Array(results);
        self
          .events
          .publish(WorkflowEvent::iteration_completed(&job.name, results.clone()));
        results
      }
      None => {
        let inputs = self.resolve_inputs(job, None)?;
        self.run_step(job, &target, None, inputs).await?
      }
    };

    self
      .registry
      .insert(&job.name, output.clone())
      .map_err(|e| JobExecutionError::registry(&job.name, e.to_string()))?;
    Ok(output)
  }

  async fn run_step(
    &self,
    job: &Job,
    target: &StepTarget<'_>,
    iteration: Option<usize>,
    inputs: Value,
  ) -> Result<Value, OrchisError> {
    match target {
      StepTarget::Dispatch => {
        self
          .events
          .publish(WorkflowEvent::job_queued(&job.name, iteration, inputs.clone()));
        Ok(
          self
            .dispatcher
            .dispatch(&job.name, inputs, job.timeout_ms)
            .await?,
        )
      }
      StepTarget::Workflow(child) => Ok(self.run_child(job, child, inputs, iteration).await?),
    }
  }

  /// Log and publish the outcome of a job.
  pub(crate) fn settle(
    &self,
    job: &Job,
    started: Instant,
    result: Result<Value, OrchisError>,
  ) -> Result<(), OrchisError> {
    let duration_ms = elapsed_ms(started);
    match result {
      Ok(output) => {
        info!(
          execution_id = %self.execution_id,
          job = %job.name,
          duration_ms,
          "job_completed"
        );
        self
          .events
          .publish(WorkflowEvent::job_completed(&job.name, output, duration_ms));
        Ok(())
      }
      Err(e) => {
        error!(
          execution_id = %self.execution_id,
          job = %job.name,
          duration_ms,
          error = %e,
          "job_failed"
        );
        self
          .events
          .publish(WorkflowEvent::job_failed(&job.name, e.clone(), duration_ms));
        Err(e)
      }
    }
  }
}
