use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use orchis_error::DependencyError;

use crate::scope::Scope;

static REFERENCE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("reference pattern is valid"));

static SINGLE_REFERENCE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\$\{([^}]+)\}$").expect("reference pattern is valid"));

/// Distinct reference paths in a template, in order of first appearance.
pub fn references(template: &str) -> Vec<String> {
  let mut paths: Vec<String> = Vec::new();
  for capture in REFERENCE.captures_iter(template) {
    let path = capture[1].trim().to_string();
    if !paths.contains(&path) {
      paths.push(path);
    }
  }
  paths
}

/// Walk a dotted path from the scope root.
///
/// Numeric segments index into arrays.
pub fn resolve_path<S: Scope + ?Sized>(path: &str, scope: &S) -> Result<Value, DependencyError> {
  let mut segments = path.split('.').map(str::trim);
  // split always yields at least one item
  let root = segments.next().unwrap_or_default();

  let mut current = scope
    .get(root)
    .ok_or_else(|| DependencyError::missing_property(path, root, "", scope.keys()))?;
  let mut traversed = root.to_string();

  for segment in segments {
    let next = match current {
      Value::Null => return Err(DependencyError::null_value(path, segment, &traversed)),
      Value::Object(map) => map
        .get(segment)
        .ok_or_else(|| DependencyError::missing_property(path, segment, &traversed, keys_of(map))),
      Value::Array(items) => segment
        .parse::<usize>()
        .ok()
        .and_then(|index| items.get(index))
        .ok_or_else(|| {
          let indices = (0..items.len()).map(|i| i.to_string()).collect();
          DependencyError::missing_property(path, segment, &traversed, indices)
        }),
      _ => Err(DependencyError::missing_property(
        path,
        segment,
        &traversed,
        Vec::new(),
      )),
    }?;
    current = next;
    traversed.push('.');
    traversed.push_str(segment);
  }

  Ok(current.clone())
}

fn keys_of(map: &Map<String, Value>) -> Vec<String> {
  map.keys().cloned().collect()
}

/// Resolve a single template string.
pub fn resolve_template<S: Scope + ?Sized>(
  template: &str,
  scope: &S,
) -> Result<Value, DependencyError> {
  if let Some(capture) = SINGLE_REFERENCE.captures(template) {
    return resolve_path(capture[1].trim(), scope).map_err(|e| e.with_template(template));
  }

  if !REFERENCE.is_match(template) {
    return Ok(Value::String(template.to_string()));
  }

  let mut resolved: HashMap<String, String> = HashMap::new();
  for path in references(template) {
    let value = resolve_path(&path, scope).map_err(|e| e.with_template(template))?;
    resolved.insert(path, stringify(&value));
  }

  let mut output = String::with_capacity(template.len());
  let mut last = 0;
  for capture in REFERENCE.captures_iter(template) {
    let (Some(whole), Some(path)) = (capture.get(0), capture.get(1)) else {
      continue;
    };
    output.push_str(&template[last..whole.start()]);
    if let Some(text) = resolved.get(path.as_str().trim()) {
      output.push_str(text);
    }
    last = whole.end();
  }
  output.push_str(&template[last..]);

  Ok(Value::String(output))
}

/// Resolve every template string in a JSON tree.
///
/// Key order is preserved. A failure is annotated with the input path of the
/// field it occurred in, e.g. `clips[2].url`.
pub fn resolve_value<S: Scope + ?Sized>(value: &Value, scope: &S) -> Result<Value, DependencyError> {
  resolve_at(value, scope, "")
}

fn resolve_at<S: Scope + ?Sized>(
  value: &Value,
  scope: &S,
  input_path: &str,
) -> Result<Value, DependencyError> {
  match value {
    Value::String(template) => {
      resolve_template(template, scope).map_err(|e| e.at_input(input_path))
    }
    Value::Object(fields) => {
      let mut resolved = Map::with_capacity(fields.len());
      for (key, field) in fields {
        let path = if input_path.is_empty() {
          key.clone()
        } else {
          format!("{}.{}", input_path, key)
        };
        resolved.insert(key.clone(), resolve_at(field, scope, &path)?);
      }
      Ok(Value::Object(resolved))
    }
    Value::Array(items) => items
      .iter()
      .enumerate()
      .map(|(index, item)| resolve_at(item, scope, &format!("{}[{}]", input_path, index)))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array),
    other => Ok(other.clone()),
  }
}

/// String form of a value substituted into a mixed template.
pub fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::Array(_) | Value::Object(_) => value.to_string(),
  }
}

/// JSON type name used in diagnostics.
pub fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
