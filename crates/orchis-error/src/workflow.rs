use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{DependencyError, OrchisError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkflowErrorKind {
  /// One or more jobs failed; see `errors`.
  JobsFailed,
  /// A queue connection could not be opened in time.
  QueueInitialization { job: String, task: String },
  /// The workflow document is structurally invalid.
  InvalidDefinition,
  /// The workflow document could not be read or parsed.
  Load { path: String },
  /// The output templates could not be resolved.
  Outputs,
}

/// Top-level failure of a workflow run.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct WorkflowError {
  pub kind: WorkflowErrorKind,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub workflow: Option<String>,
  /// Every job failure of the run, in job name order.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub errors: Vec<OrchisError>,
  /// Snapshot of the results registry at the time of failure.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub partial_results: Option<Value>,
  #[source]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<Box<OrchisError>>,
}

impl WorkflowError {
  pub fn new(kind: WorkflowErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      workflow: None,
      errors: Vec::new(),
      partial_results: None,
      source: None,
    }
  }

  /// Aggregate of all job failures of a run.
  pub fn jobs_failed(errors: Vec<OrchisError>, partial_results: Option<Value>) -> Self {
    let message = format!("{} job(s) failed", errors.len());
    Self {
      errors,
      partial_results,
      ..Self::new(WorkflowErrorKind::JobsFailed, message)
    }
  }

  pub fn queue_initialization(
    job: impl Into<String>,
    task: impl Into<String>,
    reason: impl std::fmt::Display,
  ) -> Self {
    let job = job.into();
    let task = task.into();
    let message = format!(
      "failed to initialize queue for job \"{}\" (task \"{}\"): {}",
      job, task, reason
    );
    Self::new(WorkflowErrorKind::QueueInitialization { job, task }, message)
  }

  pub fn invalid_definition(message: impl Into<String>) -> Self {
    Self::new(WorkflowErrorKind::InvalidDefinition, message)
  }

  pub fn load(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
    let path = path.into();
    let message = format!("failed to load workflow \"{}\": {}", path, reason);
    Self::new(WorkflowErrorKind::Load { path }, message)
  }

  pub fn outputs(source: DependencyError) -> Self {
    Self {
      source: Some(Box::new(source.clone().into())),
      ..Self::new(
        WorkflowErrorKind::Outputs,
        format!("failed to resolve outputs: {}", source.message),
      )
    }
  }

  pub fn with_workflow(mut self, workflow: impl Into<String>) -> Self {
    self.workflow = Some(workflow.into());
    self
  }
}
