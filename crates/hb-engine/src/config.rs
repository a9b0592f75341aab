//! Experiment configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use hb_optimizer::StrategyKind;
use hb_types::{config_error, HbResult};

/// One optimizer entry of the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerDef {
    pub name: StrategyKind,
    #[serde(default)]
    pub disable: bool,
}

impl OptimizerDef {
    pub fn new(name: StrategyKind) -> Self {
        Self {
            name,
            disable: false,
        }
    }
}

/// How repeats are isolated from each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerIsolation {
    /// One child process per repeat.
    #[default]
    Process,
    /// One blocking-pool thread per repeat, sharing the read-only table.
    Thread,
}

/// Top-level configuration for a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// A dataset file or a directory scanned recursively for `.csv` files.
    pub datasets: PathBuf,

    /// Where cell artifacts go. `None` disables skip checks and persistence.
    pub output_dir: Option<PathBuf>,

    /// Where per-repeat trial logs go. `None` disables trial logging.
    pub logging_dir: Option<PathBuf>,

    pub optimizers: Vec<OptimizerDef>,

    pub repeats: usize,

    /// Trial budgets ("checkpoints") to sweep.
    pub budgets: Vec<usize>,

    /// Concurrent repeats; defaults to the host's available parallelism.
    pub max_workers: Option<usize>,

    pub isolation: WorkerIsolation,

    /// Check an existing artifact's shape before treating its cell as done.
    pub validate_artifacts: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            datasets: PathBuf::new(),
            output_dir: None,
            logging_dir: None,
            optimizers: Vec::new(),
            repeats: 20,
            budgets: Vec::new(),
            max_workers: None,
            isolation: WorkerIsolation::Process,
            validate_artifacts: true,
        }
    }
}

impl ExperimentConfig {
    pub fn new(datasets: impl Into<PathBuf>) -> Self {
        Self {
            datasets: datasets.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> HbResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_logging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logging_dir = Some(dir.into());
        self
    }

    pub fn with_optimizer(mut self, name: StrategyKind) -> Self {
        self.optimizers.push(OptimizerDef::new(name));
        self
    }

    pub fn with_repeats(mut self, n: usize) -> Self {
        self.repeats = n;
        self
    }

    pub fn with_budgets(mut self, budgets: Vec<usize>) -> Self {
        self.budgets = budgets;
        self
    }

    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n);
        self
    }

    pub fn with_isolation(mut self, isolation: WorkerIsolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn enabled_optimizers(&self) -> impl Iterator<Item = &OptimizerDef> {
        self.optimizers.iter().filter(|o| !o.disable)
    }

    pub fn worker_count(&self) -> usize {
        self.max_workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn validate(&self) -> HbResult<()> {
        if self.datasets.as_os_str().is_empty() {
            return Err(config_error!("no dataset path given"));
        }
        if self.repeats == 0 {
            return Err(config_error!("repeats must be at least 1"));
        }
        if self.budgets.is_empty() {
            return Err(config_error!("at least one trial budget is required"));
        }
        if self.budgets.contains(&0) {
            return Err(config_error!("trial budgets must be positive"));
        }
        if self.enabled_optimizers().next().is_none() {
            return Err(config_error!("no enabled optimizer"));
        }
        if self.max_workers == Some(0) {
            return Err(config_error!("max_workers must be at least 1"));
        }
        Ok(())
    }
}
