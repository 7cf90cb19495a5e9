//! Orchis Dispatch
//!
//! Hands resolved job inputs to a queue backend and waits for the result:
//!
//! - [`JobHandler`] / [`HandlerRegistry`]: task implementations, keyed by task id
//! - [`QueueBackend`] / [`QueueConnection`]: the queue system jobs are sent to
//! - [`LocalQueueBackend`]: runs registered handlers on tokio tasks in-process
//! - [`Dispatcher`]: opens one connection per task job up front and bounds
//!   each dispatch by the job's timeout

mod backend;
mod dispatcher;
mod error;
mod handler;
mod local;

pub use backend::{JobHandle, QueueBackend, QueueConnection};
pub use dispatcher::{Dispatcher, job_payload};
pub use error::{BackendError, HandlerError};
pub use handler::{DEBUG_TASK, DebugHandler, FnHandler, HandlerRegistry, JobHandler, handler_fn};
pub use local::{DEFAULT_CONCURRENCY, LocalQueueBackend};
