//! Orchis Runtime
//!
//! Runs validated workflows. Jobs start as soon as their dependencies have
//! completed; their inputs are resolved against the outputs recorded so far
//! and dispatched to a queue backend, or, for nested workflow jobs, run as a
//! child workflow one nesting level down.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orchis_dispatch::{HandlerRegistry, LocalQueueBackend};
//! use orchis_runtime::{FsWorkflowLoader, Runtime, RuntimeConfig};
//!
//! # async fn example() -> Result<(), orchis_error::WorkflowError> {
//! let backend = LocalQueueBackend::new(HandlerRegistry::with_builtins());
//! let runtime = Runtime::new(
//!   Arc::new(backend),
//!   Arc::new(FsWorkflowLoader::new(".")),
//!   RuntimeConfig::default(),
//! );
//!
//! let workflow = runtime.load("pipeline.yaml").await?;
//! let events = runtime.event_bus();
//! let results = runtime.run(&workflow, serde_json::json!({}), &events).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod execution;
mod loader;
mod nested;
mod registry;
mod runtime;
mod task;

pub use config::{DEFAULT_MAX_NESTING_LEVEL, DEFAULT_QUEUE_INIT_TIMEOUT, RuntimeConfig};
pub use loader::{FsWorkflowLoader, WorkflowLoader};
pub use registry::{RegistryError, ResultsRegistry};
pub use runtime::Runtime;
