use orchis_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
  #[error(transparent)]
  InvalidJob(#[from] ConfigError),

  #[error("job name \"{job}\" is reserved")]
  ReservedJobName { job: String },

  #[error("job \"{job}\" depends on unknown job \"{dependency}\"")]
  UnknownDependency { job: String, dependency: String },

  #[error("dependency cycle detected: {}", cycle.join(" -> "))]
  CycleDetected { cycle: Vec<String> },
}
