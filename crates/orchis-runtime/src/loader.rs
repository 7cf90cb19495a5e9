use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use orchis_config::{DocumentFormat, WorkflowDef};
use orchis_error::WorkflowError;
use orchis_workflow::{GraphError, Workflow};

/// Source of workflow documents, used for top-level and nested runs.
#[async_trait]
pub trait WorkflowLoader: Send + Sync {
  /// Load and validate the workflow at `path`.
  async fn load(&self, path: &str) -> Result<Workflow, WorkflowError>;
}

/// Loads workflow documents from the filesystem.
///
/// Relative paths are resolved against `base_dir`. The document format is
/// picked from the file extension.
#[derive(Debug, Clone)]
pub struct FsWorkflowLoader {
  base_dir: PathBuf,
}

impl FsWorkflowLoader {
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: base_dir.into(),
    }
  }

  fn resolve(&self, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.base_dir.join(path)
    }
  }
}

#[async_trait]
impl WorkflowLoader for FsWorkflowLoader {
  async fn load(&self, path: &str) -> Result<Workflow, WorkflowError> {
    let full_path = self.resolve(path);
    let format = DocumentFormat::from_path(&full_path).map_err(|e| WorkflowError::load(path, e))?;

    let content = match tokio::fs::read_to_string(&full_path).await {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        return Err(WorkflowError::load(path, "workflow file not found"));
      }
      Err(e) => return Err(WorkflowError::load(path, e)),
    };

    let def = WorkflowDef::parse(&content, format).map_err(|e| WorkflowError::load(path, e))?;
    let workflow = Workflow::from_def(def, Some(full_path)).map_err(|e| invalid(path, e))?;

    debug!(path = %path, workflow = %workflow.name, jobs = workflow.jobs.len(), "workflow_loaded");
    Ok(workflow)
  }
}

fn invalid(path: &str, e: GraphError) -> WorkflowError {
  WorkflowError::invalid_definition(format!("invalid workflow \"{}\": {}", path, e))
}
