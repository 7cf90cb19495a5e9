use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid JSON workflow document: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid YAML workflow document: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("unsupported workflow document format: {path}")]
  UnsupportedFormat { path: String },

  #[error("job \"{job}\" is missing required task field")]
  MissingTask { job: String },

  #[error("job \"{job}\" (runWorkflow) is missing required workflowPath field")]
  MissingWorkflowPath { job: String },

  #[error("job \"{job}\" declares both task \"{task}\" and workflowPath")]
  ConflictingJobKind { job: String, task: String },

  #[error("job \"{job}\" inputs must be a mapping")]
  InvalidInputs { job: String },

  #[error("cannot convert \"{value}\" to {expected}")]
  InvalidPromptValue { value: String, expected: String },
}
