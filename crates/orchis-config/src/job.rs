use serde::{Deserialize, Serialize};

use crate::Template;
use crate::error::ConfigError;

/// Timeout applied to a job that does not declare one (5 minutes).
pub const DEFAULT_JOB_TIMEOUT_MS: u64 = 300_000;

/// Legacy task identifier marking a job as a nested workflow.
pub const NESTED_WORKFLOW_TASK: &str = "runWorkflow";

/// A single job entry in a workflow document.
///
/// A job is either dispatched to a task handler (`task`) or runs another
/// workflow (`workflowPath`). The legacy form `job: runWorkflow` together with
/// `workflowPath` is also accepted as a nested workflow.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDef {
  /// Handler identifier, e.g. "download".
  #[serde(default, alias = "job", skip_serializing_if = "Option::is_none")]
  pub task: Option<String>,

  /// Path of the workflow document to run as this job.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workflow_path: Option<String>,

  /// Jobs that must complete before this one starts.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends_on: Vec<String>,

  /// Input template tree. Absent means the empty mapping.
  #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
  pub inputs: Template,

  /// Template that must resolve to a sequence; the job runs once per element.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub iterate: Option<Template>,

  /// Timeout in milliseconds for each dispatch of this job.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout: Option<u64>,
}

/// What backs a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind<'a> {
  /// Dispatched to the task handler with this identifier.
  Task(&'a str),
  /// Runs the workflow document at this path.
  Workflow(&'a str),
}

impl JobDef {
  /// Determine whether this job is a task or a nested workflow.
  pub fn kind(&self, job: &str) -> Result<JobKind<'_>, ConfigError> {
    match (self.task.as_deref(), self.workflow_path.as_deref()) {
      (Some(NESTED_WORKFLOW_TASK), Some(path)) => Ok(JobKind::Workflow(path)),
      (Some(NESTED_WORKFLOW_TASK), None) => Err(ConfigError::MissingWorkflowPath {
        job: job.to_string(),
      }),
      (Some(task), None) => Ok(JobKind::Task(task)),
      (None, Some(path)) => Ok(JobKind::Workflow(path)),
      (Some(task), Some(_)) => Err(ConfigError::ConflictingJobKind {
        job: job.to_string(),
        task: task.to_string(),
      }),
      (None, None) => Err(ConfigError::MissingTask {
        job: job.to_string(),
      }),
    }
  }

  /// Check the job entry is well formed.
  pub fn validate(&self, job: &str) -> Result<(), ConfigError> {
    self.kind(job)?;
    if !(self.inputs.is_null() || self.inputs.is_object()) {
      return Err(ConfigError::InvalidInputs {
        job: job.to_string(),
      });
    }
    Ok(())
  }

  /// Effective timeout in milliseconds. A missing or zero timeout means the
  /// default.
  pub fn timeout_ms(&self) -> u64 {
    match self.timeout {
      Some(0) | None => DEFAULT_JOB_TIMEOUT_MS,
      Some(timeout) => timeout,
    }
  }
}
