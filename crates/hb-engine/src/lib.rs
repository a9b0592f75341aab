// HyperBench experiment harness
// Sweeps dataset x optimizer x budget x repeat, resumably and in parallel.

pub mod artifacts;
pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod worker;

pub use artifacts::{cell_artifact_path, inspect_artifact, trial_log_path, ArtifactStatus, CellReport};
pub use config::{ExperimentConfig, OptimizerDef, WorkerIsolation};
pub use executor::{InProcessExecutor, RepeatExecutor, SubprocessExecutor};
pub use orchestrator::{CellRecord, CellState, ExperimentOrchestrator, SweepSummary};
pub use worker::{run_repeat, serve_worker, RepeatTask, WorkerReply};
