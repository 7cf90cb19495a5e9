//! Workflow inputs from `--input key=value` pairs.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use orchis_config::PromptDef;

/// clap value parser for `key=value`.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
    _ => Err(format!("expected key=value, got \"{}\"", raw)),
  }
}

/// Build the top-level inputs of a run.
///
/// Supplied values are converted to their prompt's type; a value that does not
/// convert is kept as the raw string. Prompts without a supplied value take
/// their default, and a required prompt with neither is an error. Values for
/// keys no prompt declares are passed through as strings.
pub fn collect(
  prompts: &BTreeMap<String, PromptDef>,
  supplied: Vec<(String, String)>,
) -> Result<Value> {
  let mut supplied: BTreeMap<String, String> = supplied.into_iter().collect();
  let mut inputs = Map::new();
  let mut missing = Vec::new();

  for (key, prompt) in prompts {
    match supplied.remove(key) {
      Some(raw) => {
        inputs.insert(key.clone(), convert(key, prompt, raw));
      }
      None => match &prompt.default {
        Some(default) => {
          debug!(input = %key, "input_defaulted");
          inputs.insert(key.clone(), default.clone());
        }
        None if prompt.required => missing.push(prompt.label(key).to_string()),
        None => {}
      },
    }
  }

  if !missing.is_empty() {
    bail!("missing required input(s): {}", missing.join(", "));
  }

  for (key, raw) in supplied {
    inputs.insert(key, Value::String(raw));
  }
  Ok(Value::Object(inputs))
}

fn convert(key: &str, prompt: &PromptDef, raw: String) -> Value {
  let Some(prompt_type) = prompt.prompt_type() else {
    warn!(
      input = %key,
      value_type = prompt.value_type.as_deref().unwrap_or_default(),
      "unknown_input_type"
    );
    return Value::String(raw);
  };

  match prompt_type.convert(&raw) {
    Ok(value) => value,
    Err(e) => {
      warn!(input = %key, error = %e, "input_conversion_failed");
      Value::String(raw)
    }
  }
}
