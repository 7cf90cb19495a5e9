//! Progress reporting for `orchis run`.
//!
//! Every event of the run is turned into one log line on the `orchis::events`
//! target. Events of nested runs are prefixed with the job that started them,
//! e.g. `encode[2] > job "probe" completed in 1.2s`.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use orchis_events::{EventBus, WorkflowEvent};

/// Logs the events of one run until finished.
pub struct EventLog {
  cancel: CancellationToken,
  handle: JoinHandle<usize>,
}

impl EventLog {
  pub fn spawn(events: &EventBus) -> Self {
    let mut receiver = events.listen();
    let cancel = CancellationToken::new();
    let stop = cancel.clone();

    let handle = tokio::spawn(async move {
      let mut seen = 0;
      loop {
        tokio::select! {
          biased;
          received = receiver.recv() => match received {
            Some(event) => {
              log_event(&event);
              seen += 1;
            }
            None => return seen,
          },
          _ = stop.cancelled() => break,
        }
      }
      seen + drain(&mut receiver)
    });

    Self { cancel, handle }
  }

  /// Log whatever is still buffered and stop. Returns how many events were seen.
  pub async fn finish(self) -> usize {
    self.cancel.cancel();
    match self.handle.await {
      Ok(seen) => seen,
      Err(e) => {
        warn!(error = %e, "event_log_failed");
        0
      }
    }
  }
}

fn drain(receiver: &mut UnboundedReceiver<WorkflowEvent>) -> usize {
  let mut seen = 0;
  while let Ok(event) = receiver.try_recv() {
    log_event(&event);
    seen += 1;
  }
  seen
}

fn log_event(event: &WorkflowEvent) {
  let Some(line) = describe(event) else {
    return;
  };
  let topic = event.topic();
  if is_failure(event) {
    error!(target: "orchis::events", topic, "{}", line);
  } else {
    info!(target: "orchis::events", topic, "{}", line);
  }
}

fn is_failure(event: &WorkflowEvent) -> bool {
  match event {
    WorkflowEvent::Error { .. } | WorkflowEvent::JobFailed { .. } => true,
    WorkflowEvent::NestedWorkflow { event, .. } => is_failure(event),
    _ => false,
  }
}

/// One human readable line per event. Iteration steps are not reported.
fn describe(event: &WorkflowEvent) -> Option<String> {
  let line = match event {
    WorkflowEvent::Start { name, job_count, .. } => {
      format!("workflow \"{}\" started with {} job(s)", name, job_count)
    }
    WorkflowEvent::End {
      name,
      results,
      duration_ms,
      ..
    } => format!(
      "workflow \"{}\" completed in {} with {} result(s)",
      name,
      format_duration(*duration_ms),
      results.as_object().map_or(0, |m| m.len())
    ),
    WorkflowEvent::Error {
      name,
      error,
      duration_ms,
      ..
    } => format!(
      "workflow \"{}\" failed after {}: {}",
      name,
      format_duration(*duration_ms),
      error
    ),
    WorkflowEvent::JobStarted {
      name, dependencies, ..
    } if !dependencies.is_empty() => {
      format!("job \"{}\" started (waiting for: {})", name, dependencies.join(", "))
    }
    WorkflowEvent::JobStarted { name, .. } => format!("job \"{}\" started", name),
    WorkflowEvent::JobQueued {
      name,
      iteration: Some(index),
      ..
    } => format!("job \"{}\" queued (iteration {})", name, index),
    WorkflowEvent::JobQueued { name, .. } => format!("job \"{}\" queued", name),
    WorkflowEvent::JobCompleted {
      name, duration_ms, ..
    } => format!("job \"{}\" completed in {}", name, format_duration(*duration_ms)),
    WorkflowEvent::JobFailed {
      name,
      error,
      duration_ms,
      ..
    } => format!(
      "job \"{}\" failed after {}: {}",
      name,
      format_duration(*duration_ms),
      error
    ),
    WorkflowEvent::IterationStarted { name, count, .. } => {
      format!("job \"{}\" iterating over {} item(s)", name, count)
    }
    WorkflowEvent::IterationStep { .. } => return None,
    WorkflowEvent::IterationCompleted { name, .. } => {
      format!("job \"{}\" finished iterating", name)
    }
    WorkflowEvent::NestedWorkflow {
      name,
      iteration,
      event,
      ..
    } => {
      let inner = describe(event)?;
      match iteration {
        Some(index) => format!("{}[{}] > {}", name, index, inner),
        None => format!("{} > {}", name, inner),
      }
    }
    WorkflowEvent::Debug { name, data, .. } => format!("debug [{}]: {}", name, data),
  };
  Some(line)
}

/// `850ms`, `1.2s`, `3.5m`, `2.0h`.
pub fn format_duration(ms: u64) -> String {
  match ms {
    0..1_000 => format!("{}ms", ms),
    1_000..60_000 => format!("{:.1}s", ms as f64 / 1_000.0),
    60_000..3_600_000 => format!("{:.1}m", ms as f64 / 60_000.0),
    _ => format!("{:.1}h", ms as f64 / 3_600_000.0),
  }
}
