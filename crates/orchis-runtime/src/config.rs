use std::time::Duration;

use orchis_events::DEFAULT_EVENT_CAPACITY;

/// Nesting levels available to a top-level run.
pub const DEFAULT_MAX_NESTING_LEVEL: u32 = 5;

/// Time each queue connection gets to become ready.
pub const DEFAULT_QUEUE_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Remaining workflow-within-workflow depth for a top-level run.
  pub max_nesting_level: u32,
  /// Bound on opening each queue connection.
  pub queue_init_timeout: Duration,
  /// Capacity of event buses created for nested runs.
  pub event_capacity: usize,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      max_nesting_level: DEFAULT_MAX_NESTING_LEVEL,
      queue_init_timeout: DEFAULT_QUEUE_INIT_TIMEOUT,
      event_capacity: DEFAULT_EVENT_CAPACITY,
    }
  }
}
