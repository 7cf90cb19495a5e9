//! Orchis Config
//!
//! Serializable workflow document types. These represent workflow definitions
//! as written by users, before they are validated and locked by
//! `orchis-workflow` and executed by `orchis-runtime`.
//!
//! Documents can be written in JSON or YAML:
//!
//! ```yaml
//! name: thumbnails
//! prompts:
//!   url:
//!     label: Video URL
//! jobs:
//!   download:
//!     task: download
//!     inputs:
//!       url: ${inputs.url}
//!   stills:
//!     task: extractFrame
//!     dependsOn: [download]
//!     iterate: ${inputs.offsets}
//!     inputs:
//!       file: ${download.path}
//!       at: ${iterate.item}
//! outputs:
//!   frames: ${stills}
//! ```

mod error;
mod job;
mod prompt;
mod workflow;

pub use error::ConfigError;
pub use job::{DEFAULT_JOB_TIMEOUT_MS, JobDef, JobKind, NESTED_WORKFLOW_TASK};
pub use prompt::{PromptDef, PromptType};
pub use workflow::{DocumentFormat, WorkflowDef};

/// A template tree: a JSON value whose string leaves may contain `${path}`
/// references.
pub type Template = serde_json::Value;
