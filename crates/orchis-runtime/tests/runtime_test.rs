//! Integration tests for Runtime::run against the in-process queue backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchis_config::WorkflowDef;
use orchis_dispatch::{HandlerError, HandlerRegistry, LocalQueueBackend, handler_fn};
use orchis_error::{
  DependencyErrorKind, JobFailureKind, NestedFailureKind, OrchisError, WorkflowError,
  WorkflowErrorKind,
};
use orchis_events::{EventBus, WorkflowEvent};
use orchis_runtime::{FsWorkflowLoader, Runtime, RuntimeConfig, WorkflowLoader};
use orchis_workflow::Workflow;
use serde_json::{Value, json};
use tokio::sync::broadcast::Receiver;

fn workflow(path: &str, yaml: &str) -> Workflow {
  let def = WorkflowDef::from_yaml(yaml).expect("valid workflow yaml");
  Workflow::from_def(def, Some(PathBuf::from(path))).expect("valid workflow")
}

/// Serves workflows from memory.
#[derive(Default)]
struct MapLoader {
  workflows: HashMap<String, Workflow>,
}

impl MapLoader {
  fn with(mut self, path: &str, yaml: &str) -> Self {
    self.workflows.insert(path.to_string(), workflow(path, yaml));
    self
  }
}

#[async_trait]
impl WorkflowLoader for MapLoader {
  async fn load(&self, path: &str) -> Result<Workflow, WorkflowError> {
    self
      .workflows
      .get(path)
      .cloned()
      .ok_or_else(|| WorkflowError::load(path, "workflow file not found"))
  }
}

/// Handlers used by the tests:
/// - `echo` returns its inputs
/// - `sleep` waits `ms` milliseconds and returns `{ value, ms }`
/// - `fail` always fails
fn registry(invocations: Arc<AtomicUsize>) -> HandlerRegistry {
  HandlerRegistry::with_builtins()
    .with(
      "echo",
      handler_fn(move |inputs: Value, _events| {
        invocations.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, HandlerError>(inputs) }
      }),
    )
    .with(
      "sleep",
      handler_fn(|inputs: Value, _events| async move {
        let ms = inputs["ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok::<_, HandlerError>(json!({ "value": inputs["value"].clone(), "ms": ms }))
      }),
    )
    .with(
      "fail",
      handler_fn(|_inputs: Value, _events| async move {
        Err::<Value, _>(HandlerError::new("handler exploded"))
      }),
    )
}

fn runtime_with(loader: impl WorkflowLoader + 'static) -> (Runtime, Arc<AtomicUsize>) {
  let invocations = Arc::new(AtomicUsize::new(0));
  let backend = LocalQueueBackend::new(registry(invocations.clone()));
  let runtime = Runtime::new(
    Arc::new(backend),
    Arc::new(loader),
    RuntimeConfig::default(),
  );
  (runtime, invocations)
}

fn runtime() -> Runtime {
  runtime_with(MapLoader::default()).0
}

fn drain(receiver: &mut Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
  let mut events = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    events.push(event);
  }
  events
}

fn position(events: &[WorkflowEvent], topic: &str, name: &str) -> usize {
  events
    .iter()
    .position(|e| e.topic() == topic && e.name() == name)
    .unwrap_or_else(|| panic!("no {} event for {}", topic, name))
}

fn job_errors(err: &WorkflowError) -> HashMap<&str, &OrchisError> {
  err
    .errors
    .iter()
    .map(|e| (e.job().expect("job error"), e))
    .collect()
}

#[tokio::test(start_paused = true)]
async fn test_dependent_dispatched_after_dependency_completes() {
  let runtime = runtime();
  let flow = workflow(
    "deps.yaml",
    r#"
jobs:
  b:
    task: echo
    dependsOn: [a]
    inputs:
      x: ${a.value}
  a:
    task: sleep
    inputs:
      ms: 50
      value: 7
"#,
  );
  let events = runtime.event_bus();
  let mut receiver = events.subscribe();

  let results = runtime.run(&flow, json!({ "n": 1 }), &events).await.unwrap();

  assert_eq!(results["inputs"], json!({ "n": 1 }));
  assert_eq!(results["a"], json!({ "value": 7, "ms": 50 }));
  assert_eq!(results["b"]["x"], 7);
  assert_eq!(results["b"]["name"], "b");
  assert_eq!(results["b"]["task"], "echo");

  let events = drain(&mut receiver);
  assert_eq!(events.first().map(|e| e.topic()), Some("start"));
  assert_eq!(events.last().map(|e| e.topic()), Some("end"));
  assert!(position(&events, "jobCompleted", "a") < position(&events, "jobQueued", "b"));
  assert!(position(&events, "jobStarted", "b") < position(&events, "jobCompleted", "a"));
}

#[tokio::test(start_paused = true)]
async fn test_iteration_results_keep_input_order() {
  let runtime = runtime();
  let flow = workflow(
    "loop.yaml",
    r#"
jobs:
  loop:
    task: sleep
    iterate: ${inputs.list}
    inputs:
      ms: ${iterate.item}
      value: item-${iterate.index}
"#,
  );
  let events = runtime.event_bus();
  let mut receiver = events.subscribe();

  let results = runtime
    .run(&flow, json!({ "list": [30, 10, 20] }), &events)
    .await
    .unwrap();

  assert_eq!(
    results["loop"],
    json!([
      { "value": "item-0", "ms": 30 },
      { "value": "item-1", "ms": 10 },
      { "value": "item-2", "ms": 20 }
    ])
  );
  assert!(!results.as_object().unwrap().contains_key("iterate"));

  let events = drain(&mut receiver);
  let steps: Vec<usize> = events
    .iter()
    .filter_map(|e| match e {
      WorkflowEvent::IterationStep { index, .. } => Some(*index),
      _ => None,
    })
    .collect();
  assert_eq!(steps, [0, 1, 2]);

  let queued: Vec<Option<usize>> = events
    .iter()
    .filter_map(|e| match e {
      WorkflowEvent::JobQueued { iteration, .. } => Some(*iteration),
      _ => None,
    })
    .collect();
  assert_eq!(queued, [Some(0), Some(1), Some(2)]);
  assert!(
    position(&events, "iterationStarted", "loop") < position(&events, "iterationCompleted", "loop")
  );
}

#[tokio::test(start_paused = true)]
async fn test_failure_does_not_cancel_sibling() {
  let runtime = runtime();
  let flow = workflow(
    "siblings.yaml",
    r#"
jobs:
  broken:
    task: fail
  slow:
    task: sleep
    inputs:
      ms: 100
      value: 2
"#,
  );

  let err = runtime
    .run(&flow, json!({}), &runtime.event_bus())
    .await
    .unwrap_err();

  assert_eq!(err.kind, WorkflowErrorKind::JobsFailed);
  assert_eq!(err.message, "1 job(s) failed");
  assert_eq!(err.workflow.as_deref(), Some("siblings"));
  assert_eq!(err.errors.len(), 1);
  assert!(matches!(
    &err.errors[0],
    OrchisError::JobExecution(e) if e.job == "broken"
      && e.kind == JobFailureKind::Backend
      && e.message.contains("handler exploded")
  ));

  let partial = err.partial_results.expect("partial results");
  assert_eq!(partial["slow"]["value"], 2);
  assert!(partial.get("broken").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_while_sibling_completes() {
  let runtime = runtime();
  let flow = workflow(
    "timeout.yaml",
    r#"
jobs:
  stuck:
    task: sleep
    timeout: 50
    inputs:
      ms: 1000
  quick:
    task: sleep
    inputs:
      ms: 200
      value: done
"#,
  );

  let err = runtime
    .run(&flow, json!({}), &runtime.event_bus())
    .await
    .unwrap_err();

  assert_eq!(err.errors.len(), 1);
  assert!(err.errors[0].is_timeout());
  assert!(matches!(
    &err.errors[0],
    OrchisError::JobExecution(e) if e.kind == JobFailureKind::Timeout { timeout_ms: 50 }
  ));
  assert_eq!(err.partial_results.unwrap()["quick"]["value"], "done");
}

#[tokio::test(start_paused = true)]
async fn test_failed_dependency_fails_dependents() {
  let runtime = runtime();
  let flow = workflow(
    "chain.yaml",
    r#"
jobs:
  first:
    task: fail
  second:
    task: echo
    dependsOn: [first]
  third:
    task: echo
    dependsOn: [second]
"#,
  );
  let events = runtime.event_bus();
  let mut receiver = events.subscribe();

  let err = runtime.run(&flow, json!({}), &events).await.unwrap_err();
  assert_eq!(err.message, "3 job(s) failed");

  let errors = job_errors(&err);
  match errors["second"] {
    OrchisError::JobExecution(e) => {
      assert_eq!(e.kind, JobFailureKind::DependencyFailed);
      assert!(matches!(
        e.source.as_deref(),
        Some(OrchisError::Dependency(d))
          if d.kind == DependencyErrorKind::UpstreamFailed { dependency: "first".to_string() }
      ));
    }
    other => panic!("unexpected error: {:?}", other),
  }

  let events = drain(&mut receiver);
  assert!(
    events
      .iter()
      .all(|e| !(e.topic() == "jobQueued" && e.name() != "first"))
  );
  assert_eq!(events.last().map(|e| e.topic()), Some("error"));
}

#[tokio::test(start_paused = true)]
async fn test_input_resolution_failure_reports_path() {
  let runtime = runtime();
  let flow = workflow(
    "inputs.yaml",
    r#"
jobs:
  source:
    task: echo
    inputs:
      value: 1
  reader:
    task: echo
    dependsOn: [source]
    inputs:
      nested:
        list: ["${source.missing}"]
"#,
  );

  let err = runtime
    .run(&flow, json!({}), &runtime.event_bus())
    .await
    .unwrap_err();

  let errors = job_errors(&err);
  let OrchisError::JobExecution(e) = errors["reader"] else {
    panic!("expected a job execution error");
  };
  assert_eq!(e.kind, JobFailureKind::InputResolution);
  let Some(OrchisError::Dependency(dependency)) = e.source.as_deref() else {
    panic!("expected a dependency error source");
  };
  assert_eq!(dependency.path, "source.missing");
  assert_eq!(dependency.input_path.as_deref(), Some("nested.list[0]"));
  assert_eq!(dependency.job.as_deref(), Some("reader"));
  assert!(dependency.available_keys.contains(&"value".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_iterate_must_be_sequence() {
  let runtime = runtime();
  let flow = workflow(
    "scalar.yaml",
    "jobs:\n  loop:\n    task: echo\n    iterate: ${inputs.count}\n",
  );

  let err = runtime
    .run(&flow, json!({ "count": 3 }), &runtime.event_bus())
    .await
    .unwrap_err();
  assert!(matches!(
    &err.errors[0],
    OrchisError::JobExecution(e)
      if e.kind == JobFailureKind::IterationTargetNotSequence && e.message.contains("number")
  ));
}

#[tokio::test(start_paused = true)]
async fn test_declared_outputs_are_resolved() {
  let runtime = runtime();
  let flow = workflow(
    "outputs.yaml",
    r#"
jobs:
  add:
    task: echo
    inputs:
      total: 5
outputs:
  total: ${add.total}
  label: total=${add.total} for ${inputs.who}
"#,
  );

  let results = runtime
    .run(&flow, json!({ "who": "me" }), &runtime.event_bus())
    .await
    .unwrap();
  assert_eq!(results, json!({ "total": 5, "label": "total=5 for me" }));
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_outputs_fail_run() {
  let runtime = runtime();
  let flow = workflow(
    "bad-outputs.yaml",
    "jobs:\n  a:\n    task: echo\noutputs:\n  x: ${a.nothing}\n",
  );
  let events = runtime.event_bus();
  let mut receiver = events.subscribe();

  let err = runtime.run(&flow, json!({}), &events).await.unwrap_err();
  assert_eq!(err.kind, WorkflowErrorKind::Outputs);
  assert!(matches!(err.source.as_deref(), Some(OrchisError::Dependency(_))));

  let events = drain(&mut receiver);
  assert!(events.iter().all(|e| e.topic() != "end"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_task_aborts_before_any_job() {
  let (runtime, invocations) = runtime_with(MapLoader::default());
  let flow = workflow(
    "unknown.yaml",
    "jobs:\n  a:\n    task: echo\n  b:\n    task: teleport\n",
  );
  let events = runtime.event_bus();
  let mut receiver = events.subscribe();

  let err = runtime.run(&flow, json!({}), &events).await.unwrap_err();
  assert_eq!(
    err.kind,
    WorkflowErrorKind::QueueInitialization {
      job: "b".to_string(),
      task: "teleport".to_string()
    }
  );
  assert_eq!(invocations.load(Ordering::SeqCst), 0);

  let topics: Vec<&str> = drain(&mut receiver).iter().map(|e| e.topic()).collect();
  assert_eq!(topics, ["start", "error"]);
}

const CHILD: &str = r#"
jobs:
  inner:
    task: echo
    inputs:
      v: ${inputs.v}
outputs:
  v: ${inner.v}
"#;

#[tokio::test(start_paused = true)]
async fn test_nested_workflow_per_iteration() {
  let (runtime, _) = runtime_with(MapLoader::default().with("child.yaml", CHILD));
  let flow = workflow(
    "parent.yaml",
    r#"
jobs:
  sub:
    workflowPath: child.yaml
    iterate: ${inputs.items}
    inputs:
      v: ${iterate.item}
  after:
    task: echo
    dependsOn: [sub]
    inputs:
      first: ${sub.0.v}
"#,
  );
  let events = runtime.event_bus();
  let mut receiver = events.subscribe();

  let results = runtime
    .run(&flow, json!({ "items": ["x", "y"] }), &events)
    .await
    .unwrap();
  assert_eq!(results["sub"], json!([{ "v": "x" }, { "v": "y" }]));
  assert_eq!(results["after"]["first"], "x");

  let events = drain(&mut receiver);
  let nested: Vec<(Option<usize>, &str, &str)> = events
    .iter()
    .filter_map(|e| match e {
      WorkflowEvent::NestedWorkflow {
        name,
        iteration,
        event,
        ..
      } => {
        assert_eq!(name, "sub");
        Some((*iteration, event.topic(), event.name()))
      }
      _ => None,
    })
    .collect();

  assert!(nested.contains(&(Some(0), "start", "child")));
  assert!(nested.contains(&(Some(0), "jobCompleted", "inner")));
  assert!(nested.contains(&(Some(1), "end", "child")));
  let last_nested = events
    .iter()
    .rposition(|e| e.topic() == "nestedWorkflowEvent")
    .unwrap();
  assert!(last_nested < position(&events, "jobCompleted", "sub"));
}

#[tokio::test(start_paused = true)]
async fn test_depth_limit_refuses_without_dispatch() {
  let (runtime, invocations) = runtime_with(MapLoader::default().with("child.yaml", CHILD));
  let flow = workflow(
    "parent.yaml",
    "jobs:\n  sub:\n    workflowPath: child.yaml\n    inputs:\n      v: 1\n",
  );

  let err = runtime
    .run_at_depth(&flow, json!({}), &runtime.event_bus(), 0)
    .await
    .unwrap_err();

  assert_eq!(err.errors.len(), 1);
  assert!(matches!(
    &err.errors[0],
    OrchisError::NestedWorkflow(e)
      if e.kind == NestedFailureKind::DepthExceeded { max_nesting_level: 0 }
        && e.workflow_path == "child.yaml"
  ));
  assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recursive_workflow_hits_depth_limit() {
  let loops = "jobs:\n  again:\n    workflowPath: loop.yaml\n";
  let (runtime, _) = runtime_with(MapLoader::default().with("loop.yaml", loops));
  let flow = workflow("loop.yaml", loops);

  let err = runtime
    .run_at_depth(&flow, json!({}), &runtime.event_bus(), 2)
    .await
    .unwrap_err();

  // again (level 2) -> again (level 1) -> again (level 0, refused)
  let mut current = &err.errors[0];
  let mut depth = 0;
  loop {
    match current {
      OrchisError::NestedWorkflow(e) if e.kind == NestedFailureKind::Failed => {
        current = e.source.as_deref().unwrap();
        depth += 1;
      }
      OrchisError::Workflow(w) => current = &w.errors[0],
      OrchisError::NestedWorkflow(e) => {
        assert_eq!(e.kind, NestedFailureKind::DepthExceeded { max_nesting_level: 0 });
        break;
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }
  assert_eq!(depth, 2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_child_workflow() {
  let runtime = runtime();
  let flow = workflow("parent.yaml", "jobs:\n  sub:\n    workflowPath: gone.yaml\n");

  let err = runtime
    .run(&flow, json!({}), &runtime.event_bus())
    .await
    .unwrap_err();
  let OrchisError::NestedWorkflow(e) = &err.errors[0] else {
    panic!("expected a nested workflow error");
  };
  assert_eq!(e.kind, NestedFailureKind::Failed);
  assert!(e.message.contains("workflow file not found"));
}

#[tokio::test]
async fn test_debug_task_publishes_event() {
  let runtime = runtime();
  let flow = workflow(
    "debug.yaml",
    "jobs:\n  inspect:\n    task: debug\n    inputs:\n      seen: ${inputs.value}\n",
  );
  let events = runtime.event_bus();
  let mut receiver = events.subscribe();

  let results = runtime
    .run(&flow, json!({ "value": 42 }), &events)
    .await
    .unwrap();
  assert_eq!(results["inspect"], json!({}));

  let events = drain(&mut receiver);
  let debug = events
    .iter()
    .find_map(|e| match e {
      WorkflowEvent::Debug { name, data, .. } => Some((name.clone(), data.clone())),
      _ => None,
    })
    .expect("debug event");
  assert_eq!(debug.0, "inspect");
  assert_eq!(debug.1["seen"], 42);
}

#[tokio::test]
async fn test_nested_workflow_from_disk() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("child.yaml"), CHILD).unwrap();
  std::fs::write(
    dir.path().join("parent.json"),
    r#"{
      "jobs": {
        "sub": { "job": "runWorkflow", "workflowPath": "child.yaml", "inputs": { "v": "${inputs.v}" } }
      },
      "outputs": { "result": "${sub.v}" }
    }"#,
  )
  .unwrap();

  let (runtime, _) = runtime_with(FsWorkflowLoader::new(dir.path()));
  let flow = runtime.load("parent.json").await.unwrap();
  assert_eq!(flow.name, "parent");

  let results = runtime
    .run(&flow, json!({ "v": [1, 2] }), &runtime.event_bus())
    .await
    .unwrap();
  assert_eq!(results, json!({ "result": [1, 2] }));
}

#[tokio::test]
async fn test_concurrent_runs_share_backend() {
  let runtime = Arc::new(runtime());
  let flow = Arc::new(workflow(
    "shared.yaml",
    "jobs:\n  a:\n    task: echo\n    inputs:\n      n: ${inputs.n}\n",
  ));

  let seen = Arc::new(Mutex::new(Vec::new()));
  let mut tasks = Vec::new();
  for n in 0..4 {
    let (runtime, flow, seen) = (runtime.clone(), flow.clone(), seen.clone());
    tasks.push(tokio::spawn(async move {
      let results = runtime
        .run(&flow, json!({ "n": n }), &runtime.event_bus())
        .await
        .unwrap();
      seen.lock().unwrap().push(results["a"]["n"].as_i64().unwrap());
    }));
  }
  for task in tasks {
    task.await.unwrap();
  }

  let mut seen = seen.lock().unwrap().clone();
  seen.sort_unstable();
  assert_eq!(seen, [0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_independent_jobs_run_concurrently() {
  let runtime = runtime();
  let flow = workflow(
    "fanout.yaml",
    r#"
jobs:
  left:
    task: sleep
    inputs:
      ms: 100
      value: l
  right:
    task: sleep
    inputs:
      ms: 100
      value: r
"#,
  );
  let events = runtime.event_bus();
  let mut receiver = events.listen();

  let results = runtime.run(&flow, json!({}), &events).await.unwrap();
  assert_eq!(results["left"]["value"], "l");
  assert_eq!(results["right"]["value"], "r");

  let mut seen = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    seen.push(event);
  }
  let first_completed =
    position(&seen, "jobCompleted", "left").min(position(&seen, "jobCompleted", "right"));
  assert!(position(&seen, "jobQueued", "left") < first_completed);
  assert!(position(&seen, "jobQueued", "right") < first_completed);

  match seen.last() {
    Some(WorkflowEvent::End { duration_ms, .. }) => {
      assert!(*duration_ms >= 100 && *duration_ms < 200, "took {}ms", duration_ms)
    }
    other => panic!("unexpected last event: {:?}", other),
  }
}

#[tokio::test(start_paused = true)]
async fn test_nested_events_all_reach_parent() {
  let mut child = String::from("jobs:\n");
  for index in 0..600 {
    child.push_str(&format!("  job{}:\n    task: echo\n    inputs:\n      n: {}\n", index, index));
  }
  let (runtime, invocations) = runtime_with(MapLoader::default().with("wide.yaml", &child));
  let flow = workflow("outer.yaml", "jobs:\n  wide:\n    workflowPath: wide.yaml\n");
  let events = EventBus::new(16);
  let mut receiver = events.listen();

  runtime.run(&flow, json!({}), &events).await.unwrap();
  assert_eq!(invocations.load(Ordering::SeqCst), 600);

  let mut nested = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    if let WorkflowEvent::NestedWorkflow { event, .. } = event {
      nested.push(*event);
    }
  }
  // start, end and three events per job
  assert_eq!(nested.len(), 1_802);
  assert_eq!(nested.iter().filter(|e| e.topic() == "jobCompleted").count(), 600);
  assert_eq!(nested.first().map(|e| e.topic()), Some("start"));
  assert_eq!(nested.last().map(|e| e.topic()), Some("end"));
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_means_default() {
  let runtime = runtime();
  let flow = workflow(
    "zero.yaml",
    r#"
jobs:
  slow:
    task: sleep
    timeout: 0
    inputs:
      ms: 500
      value: kept
"#,
  );

  let results = runtime
    .run(&flow, json!({}), &runtime.event_bus())
    .await
    .unwrap();
  assert_eq!(results["slow"]["value"], "kept");
}
