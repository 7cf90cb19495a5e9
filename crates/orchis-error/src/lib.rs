//! Orchis Error
//!
//! The error taxonomy shared by every orchis crate. Each failure kind is a
//! payload struct carrying its own structured context, and [`OrchisError`]
//! is the tagged union callers match on:
//!
//! ```text
//! OrchisError
//! ├── Workflow(WorkflowError)              top-level run failure, aggregates job errors
//! ├── JobExecution(JobExecutionError)      one job's dispatch, handler or timeout failure
//! ├── Dependency(DependencyError)          template/path resolution failure
//! └── NestedWorkflow(NestedWorkflowError)  nested workflow failure or depth limit
//! ```
//!
//! Lower-level errors are wrapped, never flattened: a `DependencyError` raised
//! while resolving a job's inputs becomes the boxed `source` of a
//! `JobExecutionError`, which in turn ends up in the `errors` list of the
//! aggregate `WorkflowError`.

mod dependency;
mod job;
mod nested;
mod workflow;

use serde::Serialize;
use thiserror::Error;

pub use dependency::{DependencyError, DependencyErrorKind};
pub use job::{JobExecutionError, JobFailureKind};
pub use nested::{NestedFailureKind, NestedWorkflowError};
pub use workflow::{WorkflowError, WorkflowErrorKind};

/// Any orchestration failure.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", content = "context")]
pub enum OrchisError {
  #[serde(rename = "WorkflowError")]
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  #[serde(rename = "JobExecutionError")]
  #[error(transparent)]
  JobExecution(#[from] JobExecutionError),

  #[serde(rename = "DependencyError")]
  #[error(transparent)]
  Dependency(#[from] DependencyError),

  #[serde(rename = "NestedWorkflowError")]
  #[error(transparent)]
  NestedWorkflow(#[from] NestedWorkflowError),
}

impl OrchisError {
  /// Name of the job the error is attributed to, if any.
  pub fn job(&self) -> Option<&str> {
    match self {
      Self::Workflow(_) => None,
      Self::JobExecution(e) => Some(&e.job),
      Self::Dependency(e) => e.job.as_deref(),
      Self::NestedWorkflow(e) => Some(&e.job),
    }
  }

  /// Whether this error is a dispatch timeout.
  pub fn is_timeout(&self) -> bool {
    matches!(self, Self::JobExecution(e) if e.is_timeout())
  }
}
