//! The body of one repeat, shared by every executor, and the stdin/stdout
//! protocol of the `worker` subcommand.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hb_data::{ScoreTable, SurrogateObjective};
use hb_optimizer::{StrategyKind, TrialLogger};
use hb_types::{CellKey, HbResult, HyperparameterSpace, RunResult};

/// Everything a worker needs to run one repeat. Serialized whole for child
/// processes, so each worker evaluates its own snapshot of the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatTask {
    pub key: CellKey,
    pub strategy: StrategyKind,
    pub repeat: usize,
    pub seed: u64,
    pub log_path: Option<PathBuf>,
    pub table: Arc<ScoreTable>,
    pub space: Arc<HyperparameterSpace>,
}

/// A worker's answer on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    Completed { result: RunResult },
    Failed { message: String },
}

/// Run one repeat to completion.
pub fn run_repeat(task: &RepeatTask) -> HbResult<RunResult> {
    task.table.ensure_covers(&task.space)?;

    let objective = SurrogateObjective::new(Arc::clone(&task.table));
    let mut logger = TrialLogger::open_or_disabled(task.log_path.as_deref());
    let mut strategy = task
        .strategy
        .configure(Arc::clone(&task.space), task.key.budget, task.seed);

    let started = Instant::now();
    let optimum = strategy.optimize(&objective, &mut logger)?;
    let elapsed_secs = started.elapsed().as_secs_f64();

    tracing::info!(
        "Best config for {} on {} (seed {}): {} = {}, completed in {:.2}s",
        task.strategy,
        task.key.dataset,
        task.seed,
        optimum.assignment,
        optimum.fitness,
        elapsed_secs
    );

    Ok(RunResult {
        repeat: task.repeat,
        seed: task.seed,
        best_assignment: optimum.assignment,
        best_fitness: optimum.fitness,
        elapsed_secs,
    })
}

/// Read a [`RepeatTask`] from `input`, run it, and write a [`WorkerReply`] to
/// `output`. Returns whether the repeat succeeded.
pub fn serve_worker<R: Read, W: Write>(mut input: R, mut output: W) -> HbResult<bool> {
    let mut payload = Vec::new();
    input.read_to_end(&mut payload)?;
    let task: RepeatTask = serde_json::from_slice(&payload)?;

    let reply = match run_repeat(&task) {
        Ok(result) => WorkerReply::Completed { result },
        Err(e) => {
            tracing::error!("Repeat {} of {} failed: {}", task.repeat, task.key, e);
            WorkerReply::Failed {
                message: e.to_string(),
            }
        }
    };
    let succeeded = matches!(reply, WorkerReply::Completed { .. });

    serde_json::to_writer(&mut output, &reply)?;
    output.flush()?;
    Ok(succeeded)
}
