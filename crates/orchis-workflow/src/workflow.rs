use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use orchis_config::{PromptDef, WorkflowDef};
use serde_json::{Map, Value};

use crate::error::GraphError;
use crate::graph::Graph;
use crate::job::Job;

/// Registry keys that cannot be used as job names.
pub const RESERVED_KEYS: [&str; 2] = ["inputs", "iterate"];

/// A validated workflow, ready to run.
#[derive(Debug, Clone)]
pub struct Workflow {
  pub name: String,
  /// File the workflow was loaded from, if any.
  pub source: Option<PathBuf>,
  pub jobs: BTreeMap<String, Job>,
  pub outputs: Option<Map<String, Value>>,
  pub prompts: BTreeMap<String, PromptDef>,
  graph: Graph,
}

impl Workflow {
  /// Validate a parsed document.
  ///
  /// Rejects malformed jobs, reserved job names, dependencies on unknown jobs
  /// and dependency cycles.
  pub fn from_def(def: WorkflowDef, source: Option<PathBuf>) -> Result<Self, GraphError> {
    let name = def
      .name
      .or_else(|| {
        source
          .as_deref()
          .and_then(Path::file_stem)
          .map(|stem| stem.to_string_lossy().into_owned())
      })
      .unwrap_or_else(|| "unnamed".to_string());

    let mut jobs = BTreeMap::new();
    for (job_name, job_def) in def.jobs {
      if RESERVED_KEYS.contains(&job_name.as_str()) {
        return Err(GraphError::ReservedJobName { job: job_name });
      }
      let job = Job::from_def(&job_name, job_def)?;
      jobs.insert(job_name, job);
    }

    for job in jobs.values() {
      if let Some(dependency) = job.depends_on.iter().find(|d| !jobs.contains_key(*d)) {
        return Err(GraphError::UnknownDependency {
          job: job.name.clone(),
          dependency: dependency.clone(),
        });
      }
    }

    let graph = Graph::new(&jobs);
    if let Some(cycle) = graph.detect_cycle() {
      return Err(GraphError::CycleDetected { cycle });
    }

    Ok(Self {
      name,
      source,
      jobs,
      outputs: def.outputs,
      prompts: def.prompts,
      graph,
    })
  }

  /// `(job, task)` pairs for every job dispatched to a task handler.
  pub fn task_jobs(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .jobs
      .values()
      .filter_map(|job| job.task().map(|task| (job.name.as_str(), task)))
  }

  /// Jobs in dependency-first order.
  pub fn execution_order(&self) -> Vec<&Job> {
    self
      .graph
      .topological_order()
      .iter()
      .filter_map(|name| self.jobs.get(name))
      .collect()
  }

  /// References that read a job which is not among the reader's dependencies.
  ///
  /// Returns `(job, referenced root)` pairs. Such reads race the producing job
  /// and fail whenever it has not finished yet. References to `inputs` and
  /// `iterate` are always allowed.
  pub fn undeclared_references(&self) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for job in self.jobs.values() {
      let ancestors = self.graph.ancestors(&job.name);
      for template in job.templates() {
        for path in orchis_template::references(template) {
          let root = path.split('.').next().unwrap_or_default().trim().to_string();
          if RESERVED_KEYS.contains(&root.as_str()) || ancestors.contains(&root) {
            continue;
          }
          let pair = (job.name.clone(), root);
          if !found.contains(&pair) {
            found.push(pair);
          }
        }
      }
    }
    found
  }
}
