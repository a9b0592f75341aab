//! Search strategies over categorical spaces.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Arc;

use hb_data::Objective;
use hb_types::{HbResult, HyperparameterSpace};

use crate::session::{Point, SearchSession};
use crate::strategy::{Optimum, OptimizerStrategy};
use crate::trial::TrialLogger;

// ---- Random search ----

/// Uniform sampling without replacement across the cross-product.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: Arc<HyperparameterSpace>,
    budget: usize,
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(space: Arc<HyperparameterSpace>, budget: usize, seed: u64) -> Self {
        Self {
            space,
            budget,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl OptimizerStrategy for RandomSearch {
    fn name(&self) -> &str {
        "random"
    }

    fn optimize(&mut self, objective: &dyn Objective, logger: &mut TrialLogger) -> HbResult<Optimum> {
        let mut session = SearchSession::new("random", &self.space, objective, logger, self.budget);
        while !session.done() {
            let Some(point) = session.sample_unseen(&mut self.rng) else {
                break;
            };
            session.evaluate(&point)?;
        }
        session.finish()
    }
}

// ---- Differential evolution ----

/// Differential evolution (rand/1/bin) over value indices.
///
/// The initial population is drawn without replacement; each generation builds
/// one trial per member and keeps it if it scores at least as well. Trials that
/// collide with an already-evaluated point are replaced by an unseen random
/// point so every evaluation spends budget on something new.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    space: Arc<HyperparameterSpace>,
    budget: usize,
    rng: ChaCha8Rng,
    population_size: usize,
    mutation_factor: f64,
    crossover_rate: f64,
}

impl DifferentialEvolution {
    pub fn new(space: Arc<HyperparameterSpace>, budget: usize, seed: u64) -> Self {
        Self {
            space,
            budget,
            rng: ChaCha8Rng::seed_from_u64(seed),
            population_size: 10,
            mutation_factor: 0.5,
            crossover_rate: 0.5,
        }
    }

    fn mutate(&mut self, population: &[(Point, f64)], target: usize) -> Point {
        let dims = self.space.dimensions();
        let n = population.len();

        let mutant: Point = if n < 4 {
            self.space
                .parameters()
                .iter()
                .map(|p| self.rng.random_range(0..p.values.len()))
                .collect()
        } else {
            let mut picks = Vec::with_capacity(3);
            while picks.len() < 3 {
                let idx = self.rng.random_range(0..n);
                if idx != target && !picks.contains(&idx) {
                    picks.push(idx);
                }
            }
            let (a, b, c) = (&population[picks[0]].0, &population[picks[1]].0, &population[picks[2]].0);
            self.space
                .parameters()
                .iter()
                .enumerate()
                .map(|(d, p)| {
                    let raw = a[d] as f64 + self.mutation_factor * (b[d] as f64 - c[d] as f64);
                    raw.round().clamp(0.0, (p.values.len() - 1) as f64) as usize
                })
                .collect()
        };

        let forced = self.rng.random_range(0..dims);
        (0..dims)
            .map(|d| {
                if d == forced || self.rng.random::<f64>() < self.crossover_rate {
                    mutant[d]
                } else {
                    population[target].0[d]
                }
            })
            .collect()
    }
}

impl OptimizerStrategy for DifferentialEvolution {
    fn name(&self) -> &str {
        "dehb"
    }

    fn optimize(&mut self, objective: &dyn Objective, logger: &mut TrialLogger) -> HbResult<Optimum> {
        let space = Arc::clone(&self.space);
        let mut session = SearchSession::new("dehb", &space, objective, logger, self.budget);

        let mut population: Vec<(Point, f64)> = Vec::new();
        while population.len() < self.population_size.min(self.budget) {
            let Some(point) = session.sample_unseen(&mut self.rng) else {
                break;
            };
            if let Some(fitness) = session.evaluate(&point)? {
                population.push((point, fitness));
            }
        }

        'generations: while !session.done() && !population.is_empty() {
            for target in 0..population.len() {
                if session.done() {
                    break 'generations;
                }
                let mut trial = self.mutate(&population, target);
                if session.fitness_of(&trial).is_some() {
                    match session.sample_unseen(&mut self.rng) {
                        Some(point) => trial = point,
                        None => break 'generations,
                    }
                }
                let Some(fitness) = session.evaluate(&trial)? else {
                    break 'generations;
                };
                if fitness >= population[target].1 {
                    population[target] = (trial, fitness);
                }
            }
        }

        session.finish()
    }
}

// ---- Active learning ----

/// Active learner in the style of "LITE": after a random warm-up, repeatedly
/// label the candidate that a best/rest naive-Bayes model rates most likely to
/// belong to the best √n configurations seen so far.
#[derive(Debug, Clone)]
pub struct ActiveLearning {
    space: Arc<HyperparameterSpace>,
    budget: usize,
    rng: ChaCha8Rng,
    warmup: usize,
    pool_size: usize,
}

impl ActiveLearning {
    pub fn new(space: Arc<HyperparameterSpace>, budget: usize, seed: u64) -> Self {
        Self {
            space,
            budget,
            rng: ChaCha8Rng::seed_from_u64(seed),
            warmup: 4,
            pool_size: 64,
        }
    }

    /// Laplace-smoothed log-likelihood of `point` under the value frequencies of
    /// `members`.
    fn log_likelihood(space: &HyperparameterSpace, members: &[&Point], point: &[usize]) -> f64 {
        let n = members.len() as f64;
        space
            .parameters()
            .iter()
            .enumerate()
            .map(|(d, p)| {
                let hits = members.iter().filter(|m| m[d] == point[d]).count() as f64;
                ((hits + 1.0) / (n + p.values.len() as f64)).ln()
            })
            .sum()
    }

    fn candidates(&mut self, session: &SearchSession<'_>) -> Vec<Point> {
        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        for _ in 0..self.pool_size * 2 {
            if pool.len() == self.pool_size {
                break;
            }
            match session.sample_unseen(&mut self.rng) {
                Some(point) => {
                    if seen.insert(point.clone()) {
                        pool.push(point);
                    }
                }
                None => break,
            }
        }
        pool
    }
}

impl OptimizerStrategy for ActiveLearning {
    fn name(&self) -> &str {
        "active_learning"
    }

    fn optimize(&mut self, objective: &dyn Objective, logger: &mut TrialLogger) -> HbResult<Optimum> {
        let space = Arc::clone(&self.space);
        let mut session =
            SearchSession::new("active_learning", &space, objective, logger, self.budget);

        let mut labeled: Vec<(Point, f64)> = Vec::new();
        while labeled.len() < self.warmup && !session.done() {
            let Some(point) = session.sample_unseen(&mut self.rng) else {
                break;
            };
            if let Some(fitness) = session.evaluate(&point)? {
                labeled.push((point, fitness));
            }
        }

        while !session.done() && !labeled.is_empty() {
            // Stable sort keeps earlier labels ahead on ties.
            labeled.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let n_best = ((labeled.len() as f64).sqrt().floor() as usize).max(1);
            let best: Vec<&Point> = labeled[..n_best].iter().map(|(p, _)| p).collect();
            let rest: Vec<&Point> = labeled[n_best..].iter().map(|(p, _)| p).collect();

            let pool = self.candidates(&session);
            let mut chosen: Option<(usize, f64)> = None;
            for (i, candidate) in pool.iter().enumerate() {
                let mut score = Self::log_likelihood(&space, &best, candidate);
                if !rest.is_empty() {
                    score -= Self::log_likelihood(&space, &rest, candidate);
                }
                if chosen.map_or(true, |(_, s)| score > s) {
                    chosen = Some((i, score));
                }
            }
            let Some((idx, _)) = chosen else {
                break;
            };

            let point = pool[idx].clone();
            match session.evaluate(&point)? {
                Some(fitness) => labeled.push((point, fitness)),
                None => break,
            }
        }

        session.finish()
    }
}
