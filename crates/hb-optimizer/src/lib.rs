//! # hb-optimizer
//!
//! Search strategies for HyperBench. Every strategy satisfies the
//! [`OptimizerStrategy`] contract and is resolved once, by name, through the
//! typed [`StrategyKind`] registry. A [`SearchSession`] enforces the trial budget,
//! tracks the running best and feeds the per-repeat [`TrialLogger`].

mod search;
mod session;
mod strategy;
mod trial;

pub use search::{ActiveLearning, DifferentialEvolution, RandomSearch};
pub use session::SearchSession;
pub use strategy::{Optimum, OptimizerStrategy, StrategyKind};
pub use trial::{TrialLogger, TrialRecord, TRIAL_LOG_HEADER};
