//! Orchis Workflow
//!
//! The validated form of a workflow document. Where `orchis-config` only
//! describes what a document may contain, a [`Workflow`] guarantees:
//! - every job is either a task or a nested workflow, never both
//! - job inputs are mappings and timeouts are set
//! - no job uses a reserved registry key (`inputs`, `iterate`) as its name
//! - every dependency names a declared job and the dependency graph is acyclic

mod error;
mod graph;
mod job;
mod workflow;

pub use error::GraphError;
pub use graph::Graph;
pub use job::{Job, JobKind};
pub use workflow::{RESERVED_KEYS, Workflow};
