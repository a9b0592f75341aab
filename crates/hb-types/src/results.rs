//! Per-repeat results and sweep-grid addressing.

use serde::{Deserialize, Serialize};

use crate::space::Assignment;

/// Outcome of one (dataset, optimizer, budget, repeat) execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub repeat: usize,
    pub seed: u64,
    pub best_assignment: Assignment,
    pub best_fitness: f64,
    pub elapsed_secs: f64,
}

/// One (dataset, optimizer, budget) cell of the sweep grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub dataset: String,
    pub optimizer: String,
    pub budget: usize,
}

impl CellKey {
    pub fn new(dataset: impl Into<String>, optimizer: impl Into<String>, budget: usize) -> Self {
        Self {
            dataset: dataset.into(),
            optimizer: optimizer.into(),
            budget,
        }
    }
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.optimizer, self.dataset, self.budget)
    }
}

/// Deterministic seed for a repeat: repeat index + 1.
pub fn seed_for_repeat(repeat: usize) -> u64 {
    repeat as u64 + 1
}
