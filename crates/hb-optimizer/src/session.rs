//! Budget accounting shared by every strategy.

use rand::Rng;
use std::collections::HashMap;
use std::time::Instant;

use hb_data::Objective;
use hb_types::{HbResult, HyperparameterSpace, OptimizationError};

use crate::strategy::Optimum;
use crate::trial::TrialLogger;

/// Random draws tried before falling back to a scan of the space.
const REJECTION_ATTEMPTS: usize = 64;

/// A point in the space: one value index per parameter.
pub type Point = Vec<usize>;

/// One optimization run's view of the objective.
///
/// Only unseen points consume budget; re-proposing a point returns its cached
/// fitness. The best fitness is kept monotonically and ties keep the first
/// point found.
pub struct SearchSession<'a> {
    strategy: &'a str,
    space: &'a HyperparameterSpace,
    objective: &'a dyn Objective,
    logger: &'a mut TrialLogger,
    budget: usize,
    started: Instant,
    evaluated: HashMap<Point, f64>,
    best: Option<(Point, f64)>,
}

impl<'a> SearchSession<'a> {
    pub fn new(
        strategy: &'a str,
        space: &'a HyperparameterSpace,
        objective: &'a dyn Objective,
        logger: &'a mut TrialLogger,
        budget: usize,
    ) -> Self {
        Self {
            strategy,
            space,
            objective,
            logger,
            budget,
            started: Instant::now(),
            evaluated: HashMap::new(),
            best: None,
        }
    }

    pub fn space(&self) -> &HyperparameterSpace {
        self.space
    }

    pub fn evaluations(&self) -> usize {
        self.evaluated.len()
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.evaluated.len())
    }

    pub fn exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Every point of the space has been evaluated.
    pub fn fully_explored(&self) -> bool {
        self.space.size() == Some(self.evaluated.len())
    }

    /// No further evaluation is possible.
    pub fn done(&self) -> bool {
        self.exhausted() || self.fully_explored()
    }

    pub fn fitness_of(&self, point: &[usize]) -> Option<f64> {
        self.evaluated.get(point).copied()
    }

    pub fn best(&self) -> Option<(&[usize], f64)> {
        self.best.as_ref().map(|(p, f)| (p.as_slice(), *f))
    }

    /// Evaluate `point`, returning `None` once the budget is spent.
    ///
    /// Lookup failures propagate and abort the run.
    pub fn evaluate(&mut self, point: &[usize]) -> HbResult<Option<f64>> {
        if let Some(cached) = self.fitness_of(point) {
            return Ok(Some(cached));
        }
        if self.exhausted() {
            return Ok(None);
        }

        let assignment = self.space.assignment_at(point)?;
        let fitness = self.objective.evaluate(&assignment)?;
        self.evaluated.insert(point.to_vec(), fitness);
        self.logger.log(&assignment, fitness, self.started.elapsed());

        let improved = match self.best {
            None => true,
            Some((_, best)) => fitness > best,
        };
        if improved {
            tracing::trace!("{}: new best {} at {}", self.strategy, fitness, assignment);
            self.best = Some((point.to_vec(), fitness));
        }
        Ok(Some(fitness))
    }

    /// A uniformly random point of the space.
    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Point {
        self.space
            .parameters()
            .iter()
            .map(|p| rng.random_range(0..p.values.len()))
            .collect()
    }

    /// A random point that has not been evaluated yet, if any remain.
    pub fn sample_unseen<R: Rng>(&self, rng: &mut R) -> Option<Point> {
        if self.space.dimensions() == 0 || self.fully_explored() {
            return None;
        }
        for _ in 0..REJECTION_ATTEMPTS {
            let point = self.random_point(rng);
            if !self.evaluated.contains_key(&point) {
                return Some(point);
            }
        }

        // Dense spaces: walk the cross-product from a random offset.
        let size = self.space.size()?;
        let start = rng.random_range(0..size);
        (0..size)
            .map(|k| self.point_at((start + k) % size))
            .find(|p| !self.evaluated.contains_key(p))
    }

    /// Mixed-radix decoding of a flat cross-product index.
    fn point_at(&self, mut index: usize) -> Point {
        let mut point = vec![0; self.space.dimensions()];
        for (slot, param) in point.iter_mut().zip(self.space.parameters()).rev() {
            let radix = param.values.len();
            *slot = index % radix;
            index /= radix;
        }
        point
    }

    pub fn finish(self) -> HbResult<Optimum> {
        let evaluations = self.evaluations();
        match self.best {
            Some((point, fitness)) => {
                tracing::debug!(
                    "{} finished after {} evaluations with best {}",
                    self.strategy,
                    evaluations,
                    fitness
                );
                Ok(Optimum {
                    assignment: self.space.assignment_at(&point)?,
                    fitness,
                    evaluations,
                })
            }
            None if self.space.size() == Some(0) => Err(OptimizationError::EmptySpace {
                strategy: self.strategy.to_string(),
            }
            .into()),
            None => Err(OptimizationError::BudgetExhausted {
                strategy: self.strategy.to_string(),
                budget: self.budget,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::{Assignment, HbError, ParamValue, ParameterDef};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    struct SumObjective;

    impl Objective for SumObjective {
        fn evaluate(&self, assignment: &Assignment) -> HbResult<f64> {
            Ok(assignment
                .iter()
                .map(|(_, v)| match v {
                    ParamValue::Int(i) => *i as f64,
                    _ => 0.0,
                })
                .sum())
        }
    }

    fn grid(dims: &[usize]) -> HyperparameterSpace {
        HyperparameterSpace::new(
            dims.iter()
                .enumerate()
                .map(|(i, &n)| ParameterDef {
                    name: format!("p{i}"),
                    values: (0..n as i64).map(ParamValue::Int).collect(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn budget_counts_unique_points_only() {
        let space = grid(&[3, 3]);
        let mut logger = TrialLogger::disabled();
        let mut session = SearchSession::new("test", &space, &SumObjective, &mut logger, 2);

        assert_eq!(session.evaluate(&[1, 1]).unwrap(), Some(2.0));
        assert_eq!(session.evaluate(&[1, 1]).unwrap(), Some(2.0));
        assert_eq!(session.remaining(), 1);
        assert_eq!(session.evaluate(&[0, 2]).unwrap(), Some(2.0));
        assert!(session.exhausted());
        assert_eq!(session.evaluate(&[2, 2]).unwrap(), None);

        // Tie at 2.0: the first point found is kept.
        let optimum = session.finish().unwrap();
        assert_eq!(optimum.assignment, Assignment::new().with("p0", 1i64).with("p1", 1i64));
        assert_eq!(optimum.evaluations, 2);
    }

    #[test]
    fn sample_unseen_covers_whole_space() {
        let space = grid(&[2, 3]);
        let mut logger = TrialLogger::disabled();
        let mut session = SearchSession::new("test", &space, &SumObjective, &mut logger, 100);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let mut seen = HashSet::new();
        while let Some(point) = session.sample_unseen(&mut rng) {
            assert!(seen.insert(point.clone()), "point {point:?} proposed twice");
            session.evaluate(&point).unwrap();
        }
        assert_eq!(seen.len(), 6);
        assert!(session.fully_explored());
        assert_eq!(session.finish().unwrap().fitness, 3.0);
    }

    #[test]
    fn zero_budget_is_an_optimization_error() {
        let space = grid(&[2]);
        let mut logger = TrialLogger::disabled();
        let session = SearchSession::new("test", &space, &SumObjective, &mut logger, 0);
        assert!(matches!(
            session.finish(),
            Err(HbError::Optimization(OptimizationError::BudgetExhausted { budget: 0, .. }))
        ));
    }

    #[test]
    fn empty_space_is_reported() {
        let space = HyperparameterSpace::new(vec![]).unwrap();
        let mut logger = TrialLogger::disabled();
        let session = SearchSession::new("test", &space, &SumObjective, &mut logger, 5);
        assert!(session.sample_unseen(&mut ChaCha8Rng::seed_from_u64(1)).is_none());
        assert!(matches!(
            session.finish(),
            Err(HbError::Optimization(OptimizationError::EmptySpace { .. }))
        ));
    }
}
