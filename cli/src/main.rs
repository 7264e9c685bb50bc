//! TrafficRelay CLI: inspect deployments and push traffic batches through a
//! worker pool from the terminal.
//!
//! # Commands
//! ```text
//! trafficrelay deployments --config <relay.yaml>
//! trafficrelay check       --config <relay.yaml>
//! trafficrelay normalize   --file <raw.json>
//! trafficrelay dispatch    --config <relay.yaml> --deployment <name> --batch <bodies.json>
//!                          [--queue <tag>] [--requeue-out <requeued.ndjson>]
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use trafficrelay_core::{
    normalize_reported, Batch, BatchConsumer, LogConfig, RelayConfig, RetryAckSink,
    SliceDispatcher,
};

mod file_queue;
mod tracing_setup;

use file_queue::FileQueue;

#[derive(Parser)]
#[command(
    name = "trafficrelay",
    about = "Slice traffic-capture batches and dispatch them to a worker pool",
    long_about = "
TrafficRelay CLI: validate relay configuration, normalize raw payloads, and run
a batch of message bodies through a deployment's worker pool.

ENVIRONMENT VARIABLES:
  RUST_LOG    Overrides the log filter from the config file
",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List deployments and their resolved instances
    Deployments {
        /// Path to the relay config (.yaml, .yml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Validate a relay config file
    Check {
        /// Path to the relay config (.yaml, .yml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Normalize a raw `{ "batchData": [...] }` document and print the result
    Normalize {
        /// JSON file to normalize
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run one batch through a deployment
    Dispatch {
        /// Path to the relay config (.yaml, .yml or .json)
        #[arg(short, long)]
        config: PathBuf,
        /// Deployment name
        #[arg(short, long)]
        deployment: String,
        /// Source queue tag (default: the deployment's traffic queue)
        #[arg(short, long)]
        queue: Option<String>,
        /// Message bodies: JSON array, or NDJSON for .ndjson / .jsonl files
        #[arg(short, long)]
        batch: PathBuf,
        /// Append requeued bodies here as NDJSON (default: stdout)
        #[arg(long)]
        requeue_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Deployments { config } => {
            let config = load_config(&config, cli.verbose)?;
            cmd_deployments(&config)
        }
        Commands::Check { config } => {
            let config = load_config(&config, cli.verbose)?;
            println!("✓ config OK ({} deployment(s))", config.deployments.len());
            Ok(())
        }
        Commands::Normalize { file } => {
            tracing_setup::init_tracing(&LogConfig::default(), cli.verbose);
            cmd_normalize(&file)
        }
        Commands::Dispatch {
            config,
            deployment,
            queue,
            batch,
            requeue_out,
        } => {
            let config = load_config(&config, cli.verbose)?;
            cmd_dispatch(&config, &deployment, queue, &batch, requeue_out.as_deref()).await
        }
    }
}

fn load_config(path: &Path, verbose: bool) -> Result<RelayConfig> {
    let config = RelayConfig::load(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    tracing_setup::init_tracing(&config.log, verbose);
    Ok(config)
}

fn cmd_deployments(config: &RelayConfig) -> Result<()> {
    if config.deployments.is_empty() {
        println!("No deployments configured.");
        return Ok(());
    }
    for d in &config.deployments {
        println!("{}", d.name);
        println!("  Traffic queue:  {}", d.traffic_queue);
        if !d.diagnostic_queues.is_empty() {
            println!("  Diagnostic:     {}", d.diagnostic_queues.join(", "));
        }
        println!("  Timeout:        {}ms", d.request_timeout_ms);
        println!("  Instances:      {}", d.pool_size);
        for i in 0..d.pool_size {
            println!("    {:<20} {}", d.instance_name(i), d.endpoint(i));
        }
        println!();
    }
    Ok(())
}

fn cmd_normalize(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let raw: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", file.display()))?;

    let normalization = normalize_reported(&raw);
    for issue in &normalization.issues {
        eprintln!("warning: {issue}");
    }
    println!("{}", serde_json::to_string_pretty(&normalization.payload)?);
    Ok(())
}

async fn cmd_dispatch(
    config: &RelayConfig,
    deployment: &str,
    queue: Option<String>,
    batch_path: &Path,
    requeue_out: Option<&Path>,
) -> Result<()> {
    let deployment = config.deployment(deployment)?.clone();
    let queue = queue.unwrap_or_else(|| deployment.traffic_queue.clone());
    let bodies = read_bodies(batch_path)?;
    if bodies.is_empty() {
        bail!("{} contains no message bodies", batch_path.display());
    }

    let out: Box<dyn Write + Send> = match requeue_out {
        Some(path) => Box::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let transport = Arc::new(FileQueue::new(deployment.traffic_queue.clone(), out));

    let pool = trafficrelay_http::pool_for(&deployment)
        .with_context(|| format!("building pool for {}", deployment.name))?;
    let sink = RetryAckSink::new(transport.clone(), transport.clone());
    let dispatcher = SliceDispatcher::new(pool, sink);
    let consumer = BatchConsumer::new(deployment, dispatcher);

    let batch = Batch::from_bodies(queue, bodies);
    tracing::info!(queue = %batch.queue, messages = batch.len(), "dispatching batch");
    consumer.handle(&batch).await?;

    eprintln!(
        "done: {} acked, {} requeued",
        transport.acked(),
        transport.requeued()
    );
    Ok(())
}

fn read_bodies(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let ndjson = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "ndjson" | "jsonl"));

    if ndjson {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<Value>(line)
                    .with_context(|| format!("{}:{}: invalid JSON", path.display(), n + 1))
            })
            .collect()
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("{}: expected a JSON array of bodies", path.display()))
    }
}
