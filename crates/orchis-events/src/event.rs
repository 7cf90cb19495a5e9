use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use orchis_error::OrchisError;

/// Events emitted during a workflow run.
///
/// `name` is the workflow name for run-level events (`start`, `end`, `error`)
/// and the job name for everything else.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkflowEvent {
  /// The run has started.
  Start {
    name: String,
    timestamp: DateTime<Utc>,
    inputs: Value,
    job_count: usize,
  },

  /// The run has completed successfully.
  End {
    name: String,
    timestamp: DateTime<Utc>,
    results: Value,
    #[serde(rename = "duration")]
    duration_ms: u64,
  },

  /// The run has failed.
  Error {
    name: String,
    timestamp: DateTime<Utc>,
    error: OrchisError,
    #[serde(rename = "duration")]
    duration_ms: u64,
  },

  /// A job was started and is waiting on its dependencies.
  JobStarted {
    name: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_path: Option<String>,
    dependencies: Vec<String>,
  },

  /// Resolved inputs were handed to the queue.
  JobQueued {
    name: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iteration: Option<usize>,
    inputs: Value,
  },

  JobCompleted {
    name: String,
    timestamp: DateTime<Utc>,
    results: Value,
    #[serde(rename = "duration")]
    duration_ms: u64,
  },

  JobFailed {
    name: String,
    timestamp: DateTime<Utc>,
    error: OrchisError,
    #[serde(rename = "duration")]
    duration_ms: u64,
  },

  IterationStarted {
    name: String,
    timestamp: DateTime<Utc>,
    count: usize,
  },

  IterationStep {
    name: String,
    timestamp: DateTime<Utc>,
    index: usize,
    value: Value,
  },

  IterationCompleted {
    name: String,
    timestamp: DateTime<Utc>,
    results: Value,
  },

  /// An event raised inside the nested workflow run by job `name`.
  #[serde(rename = "nestedWorkflowEvent")]
  NestedWorkflow {
    name: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iteration: Option<usize>,
    event: Box<WorkflowEvent>,
  },

  /// Published by the `debug` task.
  Debug {
    name: String,
    timestamp: DateTime<Utc>,
    data: Value,
  },
}

impl WorkflowEvent {
  pub fn start(name: impl Into<String>, inputs: Value, job_count: usize) -> Self {
    Self::Start {
      name: name.into(),
      timestamp: Utc::now(),
      inputs,
      job_count,
    }
  }

  pub fn end(name: impl Into<String>, results: Value, duration_ms: u64) -> Self {
    Self::End {
      name: name.into(),
      timestamp: Utc::now(),
      results,
      duration_ms,
    }
  }

  pub fn error(name: impl Into<String>, error: OrchisError, duration_ms: u64) -> Self {
    Self::Error {
      name: name.into(),
      timestamp: Utc::now(),
      error,
      duration_ms,
    }
  }

  pub fn job_started(
    name: impl Into<String>,
    task: Option<&str>,
    workflow_path: Option<&str>,
    dependencies: Vec<String>,
  ) -> Self {
    Self::JobStarted {
      name: name.into(),
      timestamp: Utc::now(),
      task: task.map(str::to_string),
      workflow_path: workflow_path.map(str::to_string),
      dependencies,
    }
  }

  pub fn job_queued(name: impl Into<String>, iteration: Option<usize>, inputs: Value) -> Self {
    Self::JobQueued {
      name: name.into(),
      timestamp: Utc::now(),
      iteration,
      inputs,
    }
  }

  pub fn job_completed(name: impl Into<String>, results: Value, duration_ms: u64) -> Self {
    Self::JobCompleted {
      name: name.into(),
      timestamp: Utc::now(),
      results,
      duration_ms,
    }
  }

  pub fn job_failed(name: impl Into<String>, error: OrchisError, duration_ms: u64) -> Self {
    Self::JobFailed {
      name: name.into(),
      timestamp: Utc::now(),
      error,
      duration_ms,
    }
  }

  pub fn iteration_started(name: impl Into<String>, count: usize) -> Self {
    Self::IterationStarted {
      name: name.into(),
      timestamp: Utc::now(),
      count,
    }
  }

  pub fn iteration_step(name: impl Into<String>, index: usize, value: Value) -> Self {
    Self::IterationStep {
      name: name.into(),
      timestamp: Utc::now(),
      index,
      value,
    }
  }

  pub fn iteration_completed(name: impl Into<String>, results: Value) -> Self {
    Self::IterationCompleted {
      name: name.into(),
      timestamp: Utc::now(),
      results,
    }
  }

  /// Wrap an event raised by the nested workflow of job `name`.
  pub fn nested(name: impl Into<String>, iteration: Option<usize>, event: WorkflowEvent) -> Self {
    Self::NestedWorkflow {
      name: name.into(),
      timestamp: Utc::now(),
      iteration,
      event: Box::new(event),
    }
  }

  pub fn debug(name: impl Into<String>, data: Value) -> Self {
    Self::Debug {
      name: name.into(),
      timestamp: Utc::now(),
      data,
    }
  }

  /// Topic name as published to subscribers.
  pub fn topic(&self) -> &'static str {
    match self {
      Self::Start { .. } => "start",
      Self::End { .. } => "end",
      Self::Error { .. } => "error",
      Self::JobStarted { .. } => "jobStarted",
      Self::JobQueued { .. } => "jobQueued",
      Self::JobCompleted { .. } => "jobCompleted",
      Self::JobFailed { .. } => "jobFailed",
      Self::IterationStarted { .. } => "iterationStarted",
      Self::IterationStep { .. } => "iterationStep",
      Self::IterationCompleted { .. } => "iterationCompleted",
      Self::NestedWorkflow { .. } => "nestedWorkflowEvent",
      Self::Debug { .. } => "debug",
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Start { name, .. }
      | Self::End { name, .. }
      | Self::Error { name, .. }
      | Self::JobStarted { name, .. }
      | Self::JobQueued { name, .. }
      | Self::JobCompleted { name, .. }
      | Self::JobFailed { name, .. }
      | Self::IterationStarted { name, .. }
      | Self::IterationStep { name, .. }
      | Self::IterationCompleted { name, .. }
      | Self::NestedWorkflow { name, .. }
      | Self::Debug { name, .. } => name,
    }
  }

  pub fn timestamp(&self) -> DateTime<Utc> {
    match self {
      Self::Start { timestamp, .. }
      | Self::End { timestamp, .. }
      | Self::Error { timestamp, .. }
      | Self::JobStarted { timestamp, .. }
      | Self::JobQueued { timestamp, .. }
      | Self::JobCompleted { timestamp, .. }
      | Self::JobFailed { timestamp, .. }
      | Self::IterationStarted { timestamp, .. }
      | Self::IterationStep { timestamp, .. }
      | Self::IterationCompleted { timestamp, .. }
      | Self::NestedWorkflow { timestamp, .. }
      | Self::Debug { timestamp, .. } => *timestamp,
    }
  }
}
