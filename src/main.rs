use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use orchis_dispatch::{DEFAULT_CONCURRENCY, HandlerRegistry, LocalQueueBackend};
use orchis_runtime::{DEFAULT_MAX_NESTING_LEVEL, FsWorkflowLoader, Runtime, RuntimeConfig};
use orchis_workflow::Workflow;

mod inputs;
mod report;

/// Orchis - a declarative workflow orchestrator
#[derive(Parser)]
#[command(name = "orchis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Emit logs as JSON lines
  #[arg(long, global = true)]
  json_logs: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow and print its results as JSON
  Run(RunArgs),

  /// Load and validate a workflow without running it
  Validate {
    /// Path to the workflow file (JSON or YAML)
    workflow_file: PathBuf,
  },
}

#[derive(Args)]
struct RunArgs {
  /// Path to the workflow file (JSON or YAML)
  workflow_file: PathBuf,

  /// Workflow input as key=value, repeatable
  #[arg(short, long = "input", value_name = "KEY=VALUE", value_parser = inputs::parse_pair)]
  inputs: Vec<(String, String)>,

  /// How many workflows deep nested workflow jobs may go
  #[arg(long, env = "ORCHIS_MAX_NESTING_LEVEL", default_value_t = DEFAULT_MAX_NESTING_LEVEL)]
  max_nesting_level: u32,

  /// Maximum number of jobs the local backend runs at once
  #[arg(long, env = "ORCHIS_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
  concurrency: usize,

  /// Directory nested workflow paths are relative to (default: the workflow's directory)
  #[arg(long, env = "ORCHIS_BASE_DIR")]
  base_dir: Option<PathBuf>,
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();
  init_tracing(cli.json_logs);

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Commands::Run(args) => rt.block_on(run_workflow(args)),
    Commands::Validate { workflow_file } => rt.block_on(validate_workflow(workflow_file)),
  }
}

fn init_tracing(json: bool) {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  if json {
    tracing_subscriber::registry()
      .with(env_filter)
      .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
      .init();
  } else {
    tracing_subscriber::registry()
      .with(env_filter)
      .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
      .init();
  }
}

fn runtime(workflow_file: &Path, base_dir: Option<PathBuf>, config: RuntimeConfig, concurrency: usize) -> Runtime {
  let base_dir = base_dir
    .or_else(|| workflow_file.parent().map(Path::to_path_buf))
    .unwrap_or_else(|| PathBuf::from("."));
  let backend = LocalQueueBackend::new(HandlerRegistry::with_builtins()).with_concurrency(concurrency);
  tracing::debug!(
    concurrency = backend.concurrency(),
    base_dir = %base_dir.display(),
    "runtime_configured"
  );

  Runtime::new(
    Arc::new(backend),
    Arc::new(FsWorkflowLoader::new(base_dir)),
    config,
  )
}

async fn load(runtime: &Runtime, workflow_file: &Path) -> Result<Workflow> {
  runtime
    .load(&workflow_file.to_string_lossy())
    .await
    .with_context(|| format!("failed to load workflow file: {}", workflow_file.display()))
}

async fn run_workflow(args: RunArgs) -> Result<ExitCode> {
  let workflow_file = std::path::absolute(&args.workflow_file)
    .with_context(|| format!("invalid workflow path: {}", args.workflow_file.display()))?;
  let config = RuntimeConfig {
    max_nesting_level: args.max_nesting_level,
    ..RuntimeConfig::default()
  };
  let runtime = runtime(&workflow_file, args.base_dir, config, args.concurrency);

  let workflow = load(&runtime, &workflow_file).await?;
  let inputs = inputs::collect(&workflow.prompts, args.inputs)
    .context("failed to collect workflow inputs")?;

  let events = runtime.event_bus();
  let log = report::EventLog::spawn(&events);
  let result = runtime.run(&workflow, inputs, &events).await;
  let logged = log.finish().await;
  tracing::debug!(events = logged, "event_log_finished");

  match result {
    Ok(results) => {
      println!("{}", serde_json::to_string_pretty(&results)?);
      Ok(ExitCode::SUCCESS)
    }
    Err(err) => {
      eprintln!("{}", serde_json::to_string_pretty(&err)?);
      Ok(ExitCode::FAILURE)
    }
  }
}

async fn validate_workflow(workflow_file: PathBuf) -> Result<ExitCode> {
  let workflow_file = std::path::absolute(&workflow_file)
    .with_context(|| format!("invalid workflow path: {}", workflow_file.display()))?;
  let runtime = runtime(&workflow_file, None, RuntimeConfig::default(), DEFAULT_CONCURRENCY);

  let workflow = load(&runtime, &workflow_file).await?;
  let undeclared = workflow.undeclared_references();
  for (job, reference) in &undeclared {
    eprintln!("warning: job \"{}\" references \"{}\" without depending on it", job, reference);
  }

  println!(
    "workflow \"{}\" is valid: {} job(s), {} warning(s)",
    workflow.name,
    workflow.jobs.len(),
    undeclared.len()
  );
  Ok(ExitCode::SUCCESS)
}
