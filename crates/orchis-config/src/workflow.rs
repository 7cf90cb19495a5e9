use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::job::JobDef;
use crate::prompt::PromptDef;

/// A workflow document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,

  /// Jobs keyed by job name.
  pub jobs: BTreeMap<String, JobDef>,

  /// Output templates resolved against the final results.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub outputs: Option<serde_json::Map<String, serde_json::Value>>,

  /// Top-level inputs the workflow expects.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub prompts: BTreeMap<String, PromptDef>,
}

/// Serialization format of a workflow document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
  Json,
  Yaml,
}

impl DocumentFormat {
  /// Pick a format from a file extension.
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
      Some("json") => Ok(Self::Json),
      Some("yaml") | Some("yml") => Ok(Self::Yaml),
      _ => Err(ConfigError::UnsupportedFormat {
        path: path.display().to_string(),
      }),
    }
  }
}

impl WorkflowDef {
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }

  pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_str(content)?)
  }

  /// Parse a document in the given format.
  pub fn parse(content: &str, format: DocumentFormat) -> Result<Self, ConfigError> {
    match format {
      DocumentFormat::Json => Self::from_json(content),
      DocumentFormat::Yaml => Self::from_yaml(content),
    }
  }
}
