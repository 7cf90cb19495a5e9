use serde::Serialize;
use thiserror::Error;

use crate::{DependencyError, OrchisError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobFailureKind {
  /// The dispatched job did not complete within its timeout.
  Timeout { timeout_ms: u64 },
  /// The queue backend or the job handler reported a failure.
  Backend,
  /// The job's inputs could not be resolved.
  InputResolution,
  /// A declared dependency failed.
  DependencyFailed,
  /// The `iterate` template did not resolve to an array.
  IterationTargetNotSequence,
  /// The job's result could not be recorded.
  Registry,
}

/// Failure of a single job.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("job \"{job}\" failed: {message}")]
pub struct JobExecutionError {
  pub job: String,
  pub kind: JobFailureKind,
  pub message: String,
  #[source]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<Box<OrchisError>>,
}

impl JobExecutionError {
  pub fn new(job: impl Into<String>, kind: JobFailureKind, message: impl Into<String>) -> Self {
    Self {
      job: job.into(),
      kind,
      message: message.into(),
      source: None,
    }
  }

  pub fn timeout(job: impl Into<String>, timeout_ms: u64) -> Self {
    Self::new(
      job,
      JobFailureKind::Timeout { timeout_ms },
      format!("timed out after {}ms", timeout_ms),
    )
  }

  pub fn backend(job: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(job, JobFailureKind::Backend, message)
  }

  pub fn input_resolution(job: impl Into<String>, source: DependencyError) -> Self {
    Self {
      source: Some(Box::new(source.clone().into())),
      ..Self::new(job, JobFailureKind::InputResolution, source.message)
    }
  }

  pub fn dependency_failed(job: impl Into<String>, source: DependencyError) -> Self {
    Self {
      source: Some(Box::new(source.clone().into())),
      ..Self::new(job, JobFailureKind::DependencyFailed, source.message)
    }
  }

  /// `found` names the JSON type the iteration template resolved to.
  pub fn not_sequence(job: impl Into<String>, found: &str) -> Self {
    Self::new(
      job,
      JobFailureKind::IterationTargetNotSequence,
      format!("iterate must resolve to an array, got {}", found),
    )
  }

  pub fn registry(job: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(job, JobFailureKind::Registry, message)
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self.kind, JobFailureKind::Timeout { .. })
  }
}
