//! The sweep driver: dataset x optimizer x budget cells, each fanned out into
//! parallel repeats, persisted once complete, skipped when already done.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use hb_data::{dataset_name, discover_datasets, load_table, ScoreTable};
use hb_optimizer::StrategyKind;
use hb_types::{internal_error, seed_for_repeat, CellKey, HbError, HbResult, HyperparameterSpace, RunResult};

use crate::artifacts::{cell_artifact_path, inspect_artifact, trial_log_path, ArtifactStatus, CellReport};
use crate::config::{ExperimentConfig, WorkerIsolation};
use crate::executor::{InProcessExecutor, RepeatExecutor, SubprocessExecutor};
use crate::worker::RepeatTask;

/// Final state of one sweep cell in this invocation. A cell with no valid
/// artifact is pending; it is running while its repeats are in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// A valid artifact from an earlier invocation already exists.
    Skipped,
    Complete,
    Failed,
    /// Interrupted while running; nothing was written, so the next invocation
    /// sees the cell as pending again.
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub key: CellKey,
    pub state: CellState,
    pub error: Option<String>,
}

/// What one invocation did.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    pub sweep_id: Uuid,
    pub cells: Vec<CellRecord>,
    /// Datasets that could not be loaded, with the reason.
    pub failed_datasets: Vec<(PathBuf, String)>,
}

impl SweepSummary {
    fn new() -> Self {
        Self {
            sweep_id: Uuid::new_v4(),
            cells: Vec::new(),
            failed_datasets: Vec::new(),
        }
    }

    fn record(&mut self, key: CellKey, state: CellState, error: Option<String>) {
        self.cells.push(CellRecord { key, state, error });
    }

    pub fn in_state(&self, state: CellState) -> impl Iterator<Item = &CellKey> {
        self.cells
            .iter()
            .filter(move |c| c.state == state)
            .map(|c| &c.key)
    }

    pub fn count(&self, state: CellState) -> usize {
        self.in_state(state).count()
    }

    pub fn interrupted(&self) -> bool {
        self.count(CellState::Aborted) > 0
    }
}

enum CellOutcome {
    Complete(CellReport),
    Failed(HbError),
    Interrupted,
}

type Shutdown<'a> = Pin<&'a mut (dyn Future<Output = ()> + Send)>;

/// Drives the full factorial sweep described by an [`ExperimentConfig`].
pub struct ExperimentOrchestrator {
    config: ExperimentConfig,
    executor: Arc<dyn RepeatExecutor>,
}

impl ExperimentOrchestrator {
    pub fn new(config: ExperimentConfig, executor: Arc<dyn RepeatExecutor>) -> HbResult<Self> {
        config.validate()?;
        Ok(Self { config, executor })
    }

    /// Pick the executor from the configured isolation mode.
    pub fn from_config(config: ExperimentConfig) -> HbResult<Self> {
        let executor: Arc<dyn RepeatExecutor> = match config.isolation {
            WorkerIsolation::Process => Arc::new(SubprocessExecutor::current_exe()?),
            WorkerIsolation::Thread => Arc::new(InProcessExecutor),
        };
        Self::new(config, executor)
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Run the sweep, stopping early on Ctrl-C.
    pub async fn run(&self) -> HbResult<SweepSummary> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for interrupts: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the sweep until it finishes or `shutdown` resolves.
    ///
    /// On shutdown the running cell's workers are torn down without waiting
    /// for them and nothing is written for that cell.
    pub async fn run_until<F>(&self, shutdown: F) -> HbResult<SweepSummary>
    where
        F: Future<Output = ()> + Send,
    {
        let mut shutdown: Shutdown<'_> = std::pin::pin!(shutdown);

        let mut summary = SweepSummary::new();
        let datasets = discover_datasets(&self.config.datasets)?;
        info!(
            "Sweep {} over {} datasets with {} workers ({})",
            summary.sweep_id,
            datasets.len(),
            self.config.worker_count(),
            self.executor.name()
        );

        for path in datasets {
            let prepared = load_table(&path).and_then(|table| {
                let space = table.hyperparameter_space()?;
                Ok((Arc::new(table), Arc::new(space)))
            });
            let (table, space) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    error!("Skipping dataset {}: {}", path.display(), e);
                    summary.failed_datasets.push((path, e.to_string()));
                    continue;
                }
            };

            if !self
                .sweep_dataset(&path, table, space, &mut summary, &mut shutdown)
                .await
            {
                break;
            }
        }

        info!(
            "Sweep {} finished: {} complete, {} skipped, {} failed{}",
            summary.sweep_id,
            summary.count(CellState::Complete),
            summary.count(CellState::Skipped),
            summary.count(CellState::Failed),
            if summary.interrupted() { ", interrupted" } else { "" }
        );
        Ok(summary)
    }

    /// Returns `false` once the sweep has been interrupted.
    async fn sweep_dataset(
        &self,
        path: &Path,
        table: Arc<ScoreTable>,
        space: Arc<HyperparameterSpace>,
        summary: &mut SweepSummary,
        shutdown: &mut Shutdown<'_>,
    ) -> bool {
        let data_name = dataset_name(path);

        for optimizer in self.config.enabled_optimizers() {
            for &budget in &self.config.budgets {
                let key = CellKey::new(data_name.clone(), optimizer.name.name(), budget);
                let artifact = self
                    .config
                    .output_dir
                    .as_deref()
                    .map(|dir| cell_artifact_path(dir, &key));

                if let Some(artifact) = &artifact {
                    if self.is_done(artifact, &key) {
                        info!("Skipping {}: results already at {}", key, artifact.display());
                        summary.record(key, CellState::Skipped, None);
                        continue;
                    }
                }

                info!("Running {} with {} repeats", key, self.config.repeats);
                let outcome = self
                    .run_cell(&key, optimizer.name, &table, &space, shutdown)
                    .await;

                match outcome {
                    CellOutcome::Complete(report) => {
                        let written = match &artifact {
                            Some(path) => report.write(path),
                            None => Ok(()),
                        };
                        match written {
                            Ok(()) => summary.record(key, CellState::Complete, None),
                            Err(e) => {
                                error!("Failed to persist {}: {}", key, e);
                                summary.record(key, CellState::Failed, Some(e.to_string()));
                            }
                        }
                    }
                    CellOutcome::Failed(e) => {
                        error!("Cell {} failed: {}", key, e);
                        summary.record(key, CellState::Failed, Some(e.to_string()));
                    }
                    CellOutcome::Interrupted => {
                        warn!("Cell {} aborted by interrupt; no results written", key);
                        summary.record(key, CellState::Aborted, None);
                        return false;
                    }
                }
            }
        }
        true
    }

    fn is_done(&self, artifact: &Path, key: &CellKey) -> bool {
        let expected = self.config.validate_artifacts.then_some(self.config.repeats);
        match inspect_artifact(artifact, key, expected) {
            ArtifactStatus::Complete => true,
            ArtifactStatus::Missing => false,
            ArtifactStatus::Invalid(reason) => {
                warn!(
                    "Ignoring unusable artifact {} ({}); recomputing {}",
                    artifact.display(),
                    reason,
                    key
                );
                false
            }
        }
    }

    fn task_for(
        &self,
        key: &CellKey,
        strategy: StrategyKind,
        repeat: usize,
        table: &Arc<ScoreTable>,
        space: &Arc<HyperparameterSpace>,
    ) -> RepeatTask {
        let seed = seed_for_repeat(repeat);
        RepeatTask {
            key: key.clone(),
            strategy,
            repeat,
            seed,
            log_path: self
                .config
                .logging_dir
                .as_deref()
                .map(|dir| trial_log_path(dir, strategy.name(), &key.dataset, seed)),
            table: Arc::clone(table),
            space: Arc::clone(space),
        }
    }

    async fn run_cell(
        &self,
        key: &CellKey,
        strategy: StrategyKind,
        table: &Arc<ScoreTable>,
        space: &Arc<HyperparameterSpace>,
        shutdown: &mut Shutdown<'_>,
    ) -> CellOutcome {
        let repeats = self.config.repeats;
        let pool = Arc::new(Semaphore::new(self.config.worker_count()));
        let mut tasks = JoinSet::new();

        for repeat in 0..repeats {
            let task = self.task_for(key, strategy, repeat, table, space);
            let executor = Arc::clone(&self.executor);
            let pool = Arc::clone(&pool);
            tasks.spawn(async move {
                let result = match pool.acquire_owned().await {
                    Ok(_permit) => executor.execute(task).await,
                    Err(_) => Err(internal_error!("worker pool closed")),
                };
                (repeat, result)
            });
        }

        let mut results: Vec<Option<RunResult>> = vec![None; repeats];
        let mut completed = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.as_mut() => {
                    tasks.shutdown().await;
                    return CellOutcome::Interrupted;
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((repeat, Ok(result)))) => {
                        completed += 1;
                        info!(
                            "{}: repeat {} done, best {} ({}/{})",
                            key, repeat, result.best_fitness, completed, repeats
                        );
                        results[repeat] = Some(result);
                    }
                    Some(Ok((repeat, Err(e)))) => {
                        error!("{}: repeat {} failed: {}", key, repeat, e);
                        tasks.shutdown().await;
                        return CellOutcome::Failed(e);
                    }
                    Some(Err(join_error)) => {
                        tasks.shutdown().await;
                        return CellOutcome::Failed(internal_error!(
                            "repeat task for {key} did not finish: {join_error}"
                        ));
                    }
                },
            }
        }

        let results: Vec<RunResult> = results.into_iter().flatten().collect();
        match CellReport::new(key.clone(), results) {
            Ok(report) => CellOutcome::Complete(report),
            Err(e) => CellOutcome::Failed(e),
        }
    }
}
