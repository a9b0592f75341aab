//! The optimizer contract and the typed strategy registry.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use hb_data::Objective;
use hb_types::{Assignment, HbError, HbResult, HyperparameterSpace};

use crate::search::{ActiveLearning, DifferentialEvolution, RandomSearch};
use crate::trial::TrialLogger;

/// Best assignment a strategy found and what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimum {
    pub assignment: Assignment,
    pub fitness: f64,
    pub evaluations: usize,
}

/// A search algorithm bound to one space, one budget and one seed.
///
/// Implementations own their random state; two instances never share it.
pub trait OptimizerStrategy: Send {
    /// Registry name of the strategy.
    fn name(&self) -> &str;

    /// Spend at most the configured budget of `objective` evaluations and return
    /// the best result. Ties keep the first assignment found.
    fn optimize(&mut self, objective: &dyn Objective, logger: &mut TrialLogger)
        -> HbResult<Optimum>;
}

/// Every strategy the harness can run, resolved from its name once at
/// configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    Random,
    Dehb,
    ActiveLearning,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [Self::Random, Self::Dehb, Self::ActiveLearning];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Dehb => "dehb",
            Self::ActiveLearning => "active_learning",
        }
    }

    /// Bind a fresh strategy instance to `space`, `budget` and `seed`.
    pub fn configure(
        self,
        space: Arc<HyperparameterSpace>,
        budget: usize,
        seed: u64,
    ) -> Box<dyn OptimizerStrategy> {
        match self {
            Self::Random => Box::new(RandomSearch::new(space, budget, seed)),
            Self::Dehb => Box::new(DifferentialEvolution::new(space, budget, seed)),
            Self::ActiveLearning => Box::new(ActiveLearning::new(space, budget, seed)),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = HbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "random" | "rand" => Ok(Self::Random),
            "dehb" | "de" | "differential_evolution" => Ok(Self::Dehb),
            "active_learning" | "activelearning" | "lite" => Ok(Self::ActiveLearning),
            _ => Err(HbError::Config(format!(
                "unknown optimizer '{s}', expected one of: {}",
                Self::ALL.map(|k| k.name()).join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = HbError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("DEHB".parse::<StrategyKind>().unwrap(), StrategyKind::Dehb);
        assert_eq!(
            "Active_Learning".parse::<StrategyKind>().unwrap(),
            StrategyKind::ActiveLearning
        );
        assert_eq!("LITE".parse::<StrategyKind>().unwrap(), StrategyKind::ActiveLearning);
        assert_eq!(" random ".parse::<StrategyKind>().unwrap(), StrategyKind::Random);
    }

    #[test]
    fn unknown_name_fails_fast() {
        match "hyperband".parse::<StrategyKind>() {
            Err(HbError::Config(message)) => assert!(message.contains("hyperband")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn serde_uses_registry_names() {
        let json = serde_json::to_string(&StrategyKind::ActiveLearning).unwrap();
        assert_eq!(json, r#""active_learning""#);
        let kind: StrategyKind = serde_json::from_str(r#""DEHB""#).unwrap();
        assert_eq!(kind, StrategyKind::Dehb);
        assert!(serde_json::from_str::<StrategyKind>(r#""nope""#).is_err());
    }

    #[test]
    fn configured_strategy_reports_its_name() {
        let space = Arc::new(
            HyperparameterSpace::new(vec![hb_types::ParameterDef {
                name: "a".into(),
                values: vec![hb_types::ParamValue::Int(0)],
            }])
            .unwrap(),
        );
        for kind in StrategyKind::ALL {
            let strategy = kind.configure(space.clone(), 1, 1);
            assert_eq!(strategy.name(), kind.name());
        }
    }
}
