use serde::Serialize;
use thiserror::Error;

use crate::OrchisError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum NestedFailureKind {
  /// No nesting levels remain.
  DepthExceeded { max_nesting_level: u32 },
  /// Loading or running the nested workflow failed.
  Failed,
}

/// Failure of a job that runs another workflow.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("nested workflow job \"{job}\" ({workflow_path}) failed: {message}")]
pub struct NestedWorkflowError {
  pub job: String,
  pub workflow_path: String,
  pub kind: NestedFailureKind,
  pub message: String,
  #[source]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<Box<OrchisError>>,
}

impl NestedWorkflowError {
  pub fn depth_exceeded(
    job: impl Into<String>,
    workflow_path: impl Into<String>,
    max_nesting_level: u32,
  ) -> Self {
    Self {
      job: job.into(),
      workflow_path: workflow_path.into(),
      kind: NestedFailureKind::DepthExceeded { max_nesting_level },
      message: format!(
        "maximum nesting depth exceeded (remaining level {})",
        max_nesting_level
      ),
      source: None,
    }
  }

  pub fn failed(
    job: impl Into<String>,
    workflow_path: impl Into<String>,
    source: impl Into<OrchisError>,
  ) -> Self {
    let source = source.into();
    Self {
      job: job.into(),
      workflow_path: workflow_path.into(),
      kind: NestedFailureKind::Failed,
      message: source.to_string(),
      source: Some(Box::new(source)),
    }
  }
}
