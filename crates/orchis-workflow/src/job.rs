use orchis_config::JobDef;
use serde_json::{Map, Value};

use crate::error::GraphError;

/// What backs a validated job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
  Task { task: String },
  Workflow { workflow_path: String },
}

/// A validated job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
  pub name: String,
  pub kind: JobKind,
  pub depends_on: Vec<String>,
  /// Input template tree, always a mapping.
  pub inputs: Value,
  pub iterate: Option<Value>,
  pub timeout_ms: u64,
}

impl Job {
  pub fn from_def(name: &str, def: JobDef) -> Result<Self, GraphError> {
    def.validate(name)?;
    let kind = match def.kind(name)? {
      orchis_config::JobKind::Task(task) => JobKind::Task {
        task: task.to_string(),
      },
      orchis_config::JobKind::Workflow(path) => JobKind::Workflow {
        workflow_path: path.to_string(),
      },
    };
    let timeout_ms = def.timeout_ms();
    let inputs = match def.inputs {
      Value::Null => Value::Object(Map::new()),
      inputs => inputs,
    };

    Ok(Self {
      name: name.to_string(),
      kind,
      depends_on: def.depends_on,
      inputs,
      iterate: def.iterate,
      timeout_ms,
    })
  }

  /// Task identifier, for task jobs.
  pub fn task(&self) -> Option<&str> {
    match &self.kind {
      JobKind::Task { task } => Some(task),
      JobKind::Workflow { .. } => None,
    }
  }

  /// Nested workflow path, for workflow jobs.
  pub fn workflow_path(&self) -> Option<&str> {
    match &self.kind {
      JobKind::Workflow { workflow_path } => Some(workflow_path),
      JobKind::Task { .. } => None,
    }
  }

  /// Every template string in the job's inputs and iteration target.
  pub fn templates(&self) -> Vec<&str> {
    let mut out = Vec::new();
    collect_strings(&self.inputs, &mut out);
    if let Some(iterate) = &self.iterate {
      collect_strings(iterate, &mut out);
    }
    out
  }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
  match value {
    Value::String(s) => out.push(s),
    Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
    Value::Object(fields) => fields.values().for_each(|field| collect_strings(field, out)),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use orchis_config::ConfigError;
  use serde_json::json;

  use super::*;

  #[test]
  fn test_defaults_applied() {
    let def: JobDef = serde_json::from_value(json!({ "task": "math" })).unwrap();
    let job = Job::from_def("add", def).unwrap();

    assert_eq!(job.task(), Some("math"));
    assert_eq!(job.workflow_path(), None);
    assert_eq!(job.inputs, json!({}));
    assert_eq!(job.timeout_ms, orchis_config::DEFAULT_JOB_TIMEOUT_MS);
  }

  #[test]
  fn test_nested_job() {
    let def: JobDef =
      serde_json::from_value(json!({ "job": "runWorkflow", "workflowPath": "child.yaml" })).unwrap();
    let job = Job::from_def("child", def).unwrap();
    assert_eq!(job.workflow_path(), Some("child.yaml"));
  }

  #[test]
  fn test_invalid_inputs_rejected() {
    let def: JobDef = serde_json::from_value(json!({ "task": "math", "inputs": [1] })).unwrap();
    assert!(matches!(
      Job::from_def("add", def),
      Err(GraphError::InvalidJob(ConfigError::InvalidInputs { .. }))
    ));
  }

  #[test]
  fn test_templates_collected() {
    let def: JobDef = serde_json::from_value(json!({
      "task": "math",
      "inputs": { "a": "${x.y}", "list": ["${z}", 1], "n": null },
      "iterate": "${inputs.items}"
    }))
    .unwrap();
    let job = Job::from_def("add", def).unwrap();
    assert_eq!(job.templates(), ["${x.y}", "${z}", "${inputs.items}"]);
  }
}
