//! hyperbench CLI
//!
//! Benchmarks hyperparameter optimizers against precomputed score tables.
//!
//! ```bash
//! hyperbench run --datasets data/hpo --output-dir results --name dehb \
//!     --repeats 20 --budget 6 12 18 24 --logging-dir logs
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hb_engine::{serve_worker, ExperimentConfig, ExperimentOrchestrator, OptimizerDef, WorkerIsolation};
use hb_optimizer::StrategyKind;

/// Benchmark hyperparameter optimizers on surrogate score tables
#[derive(Parser)]
#[command(name = "hyperbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run (or resume) a sweep
    Run(RunArgs),

    /// Run a single repeat read from stdin; used by the subprocess pool
    #[command(hide = true)]
    Worker,
}

#[derive(Args)]
struct RunArgs {
    /// JSON experiment config; flags given here override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset CSV file or directory of CSV files
    #[arg(short, long)]
    datasets: Option<PathBuf>,

    /// Output directory for cell results; omit for a dry run
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Optimizer to benchmark (random, dehb, active_learning); repeatable
    #[arg(short, long = "name")]
    names: Vec<StrategyKind>,

    /// Independent repeats per cell
    #[arg(short, long)]
    repeats: Option<usize>,

    /// Trial budgets to sweep
    #[arg(short, long = "budget", num_args = 1..)]
    budgets: Vec<usize>,

    /// Directory for per-repeat trial logs
    #[arg(short, long)]
    logging_dir: Option<PathBuf>,

    /// Concurrent repeats [default: available parallelism]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run repeats on threads instead of child processes
    #[arg(long)]
    in_process: bool,

    /// Treat any existing result file as complete without checking it
    #[arg(long)]
    trust_existing: bool,
}

impl RunArgs {
    fn into_config(self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?,
            None => ExperimentConfig::default(),
        };

        if let Some(datasets) = self.datasets {
            config.datasets = datasets;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        if self.logging_dir.is_some() {
            config.logging_dir = self.logging_dir;
        }
        if !self.names.is_empty() {
            config.optimizers = self.names.into_iter().map(OptimizerDef::new).collect();
        }
        if let Some(repeats) = self.repeats {
            config.repeats = repeats;
        }
        if !self.budgets.is_empty() {
            config.budgets = self.budgets;
        }
        if self.workers.is_some() {
            config.max_workers = self.workers;
        }
        if self.in_process {
            config.isolation = WorkerIsolation::Thread;
        }
        if self.trust_existing {
            config.validate_artifacts = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the worker protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Worker => {
            let succeeded = serve_worker(std::io::stdin().lock(), std::io::stdout().lock())
                .context("Worker protocol failure")?;
            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = args.into_config()?;
    let orchestrator = ExperimentOrchestrator::from_config(config).context("Invalid experiment config")?;
    let summary = orchestrator.run().await?;

    if summary.interrupted() {
        eprintln!("Process interrupted, cleaning up...");
        std::process::exit(0);
    }

    for (path, reason) in &summary.failed_datasets {
        eprintln!("Dataset {} was skipped: {}", path.display(), reason);
    }
    let failed: Vec<String> = summary
        .cells
        .iter()
        .filter_map(|c| c.error.as_ref().map(|e| format!("{}: {}", c.key, e)))
        .collect();
    if !failed.is_empty() {
        bail!("{} cell(s) failed:\n  {}", failed.len(), failed.join("\n  "));
    }
    Ok(())
}
