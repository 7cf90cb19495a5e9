use serde::Serialize;
use thiserror::Error;

use crate::OrchisError;

/// Why a reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DependencyErrorKind {
  /// The value at the parent path has no such property (or index).
  MissingProperty,
  /// The value at the parent path is null.
  NullValue,
  /// A declared dependency failed, so this job cannot start.
  UpstreamFailed { dependency: String },
}

/// A template or path resolution failure.
///
/// `path` is the full reference that failed (e.g. `a.b.c`), `segment` the
/// segment that could not be followed and `available_keys` the keys present at
/// the point of failure.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct DependencyError {
  pub kind: DependencyErrorKind,
  pub message: String,
  pub path: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub segment: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub traversed: Option<String>,
  pub available_keys: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub job: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input_path: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub template: Option<String>,
  #[source]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<Box<OrchisError>>,
}

fn join_path(parent: &str, segment: &str) -> String {
  if parent.is_empty() {
    segment.to_string()
  } else {
    format!("{}.{}", parent, segment)
  }
}

impl DependencyError {
  fn new(kind: DependencyErrorKind, message: String, path: impl Into<String>) -> Self {
    Self {
      kind,
      message,
      path: path.into(),
      segment: None,
      traversed: None,
      available_keys: Vec::new(),
      job: None,
      input_path: None,
      template: None,
      source: None,
    }
  }

  /// `segment` is not a property of the value found at `parent`.
  pub fn missing_property(
    path: &str,
    segment: &str,
    parent: &str,
    available_keys: Vec<String>,
  ) -> Self {
    let traversed = join_path(parent, segment);
    let message = format!(
      "cannot resolve \"${{{}}}\": missing property \"{}\" at \"{}\"",
      path, segment, traversed
    );
    Self {
      segment: Some(segment.to_string()),
      traversed: Some(traversed),
      available_keys,
      ..Self::new(DependencyErrorKind::MissingProperty, message, path)
    }
  }

  /// The value found at `parent` is null, so `segment` cannot be followed.
  pub fn null_value(path: &str, segment: &str, parent: &str) -> Self {
    let traversed = join_path(parent, segment);
    let message = format!(
      "cannot resolve \"${{{}}}\": value is null at \"{}\"",
      path, traversed
    );
    Self {
      segment: Some(segment.to_string()),
      traversed: Some(traversed),
      ..Self::new(DependencyErrorKind::NullValue, message, path)
    }
  }

  /// The declared dependency `dependency` of `job` failed.
  pub fn upstream_failed(job: &str, dependency: &str, source: OrchisError) -> Self {
    let message = format!(
      "dependency \"{}\" of job \"{}\" failed: {}",
      dependency, job, source
    );
    Self {
      job: Some(job.to_string()),
      source: Some(Box::new(source)),
      ..Self::new(
        DependencyErrorKind::UpstreamFailed {
          dependency: dependency.to_string(),
        },
        message,
        dependency,
      )
    }
  }

  pub fn with_job(mut self, job: impl Into<String>) -> Self {
    self.job = Some(job.into());
    self
  }

  /// Record the template the failing reference appeared in.
  pub fn with_template(mut self, template: impl Into<String>) -> Self {
    let template = template.into();
    if self.template.is_none() {
      self.message = format!("{} in template \"{}\"", self.message, template);
      self.template = Some(template);
    }
    self
  }

  /// Record the dotted input path of the field being resolved.
  ///
  /// Only the innermost field is recorded; wrapping an already located error
  /// again leaves it unchanged.
  pub fn at_input(mut self, input_path: &str) -> Self {
    if self.input_path.is_none() && !input_path.is_empty() {
      self.message = format!(
        "failed to resolve input at \"{}\": {}",
        input_path, self.message
      );
      self.input_path = Some(input_path.to_string());
    }
    self
  }
}
