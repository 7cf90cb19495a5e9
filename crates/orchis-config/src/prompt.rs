//! Workflow prompts.
//!
//! Prompts declare the top-level inputs a workflow expects. They are collected
//! by the caller (the CLI takes them as `--input key=value`) and converted to
//! typed values before the run starts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// A single prompt declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDef {
  /// Human readable label. Defaults to the prompt key.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,

  /// Value used when none is supplied.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,

  /// Whether a value must be supplied (or defaulted).
  #[serde(default = "default_required")]
  pub required: bool,

  /// Target type name: string, number, boolean or json.
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub value_type: Option<String>,
}

fn default_required() -> bool {
  true
}

/// Supported prompt value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptType {
  String,
  Number,
  Boolean,
  Json,
}

impl PromptType {
  /// Parse a type name. Returns `None` for unknown names.
  pub fn from_name(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "string" => Some(Self::String),
      "number" => Some(Self::Number),
      "boolean" => Some(Self::Boolean),
      "json" => Some(Self::Json),
      _ => None,
    }
  }

  /// Convert a raw string to a typed value.
  pub fn convert(&self, raw: &str) -> Result<Value, ConfigError> {
    match self {
      Self::String => Ok(Value::String(raw.to_string())),
      Self::Number => {
        let trimmed = raw.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
          return Ok(Value::Number(n.into()));
        }
        trimmed
          .parse::<f64>()
          .ok()
          .and_then(serde_json::Number::from_f64)
          .map(Value::Number)
          .ok_or_else(|| ConfigError::InvalidPromptValue {
            value: raw.to_string(),
            expected: "number".to_string(),
          })
      }
      Self::Boolean => Ok(Value::Bool(matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y"
      ))),
      Self::Json => serde_json::from_str(raw).map_err(|_| ConfigError::InvalidPromptValue {
        value: raw.to_string(),
        expected: "json".to_string(),
      }),
    }
  }
}

impl PromptDef {
  /// The declared type. Missing type means string; unknown names yield `None`.
  pub fn prompt_type(&self) -> Option<PromptType> {
    match &self.value_type {
      None => Some(PromptType::String),
      Some(name) => PromptType::from_name(name),
    }
  }

  /// Label to show for this prompt.
  pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
    self.label.as_deref().unwrap_or(key)
  }
}
