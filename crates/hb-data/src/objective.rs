//! Surrogate evaluation: table lookup plus distance-to-heaven scoring.

use std::collections::HashMap;
use std::sync::Arc;

use hb_types::{Assignment, HbError, HbResult, ParamValue};

use crate::table::{ObjectiveDirection, ScoreTable};

/// Anything that maps an assignment to a fitness where higher is better.
pub trait Objective: Send + Sync {
    fn evaluate(&self, assignment: &Assignment) -> HbResult<f64>;
}

/// Per-objective closeness to the ideal plus the aggregate distance.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveScores {
    /// Normalized values oriented so that 1.0 is ideal for every objective.
    pub heaven: Vec<f64>,
    /// Euclidean distance to the all-ones point, scaled into [0, 1].
    pub d2h: f64,
}

impl ObjectiveScores {
    pub fn fitness(&self) -> f64 {
        1.0 - self.d2h
    }
}

/// Aggregate distance of `heaven` from the all-ones ideal, normalized by the
/// number of objectives.
pub fn distance_to_heaven(heaven: &[f64]) -> f64 {
    if heaven.is_empty() {
        return 0.0;
    }
    let sum: f64 = heaven.iter().map(|h| (1.0 - h).powi(2)).sum();
    (sum / heaven.len() as f64).sqrt()
}

/// Deterministic fitness function over a [`ScoreTable`].
#[derive(Debug, Clone)]
pub struct SurrogateObjective {
    table: Arc<ScoreTable>,
    index: HashMap<Vec<ParamValue>, usize>,
    bounds: Vec<(f64, f64)>,
}

impl SurrogateObjective {
    pub fn new(table: Arc<ScoreTable>) -> Self {
        let mut index = HashMap::with_capacity(table.len());
        for (i, row) in table.rows().iter().enumerate() {
            // Duplicate feature tuples resolve to the first row in table order.
            index.entry(row.features.clone()).or_insert(i);
        }
        let bounds = table.objective_bounds();
        Self {
            table,
            index,
            bounds,
        }
    }

    pub fn table(&self) -> &ScoreTable {
        &self.table
    }

    /// Position of the first row whose features equal the assignment exactly.
    pub fn find_row(&self, assignment: &Assignment) -> HbResult<usize> {
        if assignment.is_empty() {
            return Err(HbError::InvalidArgument("no hyperparameters provided".to_string()));
        }

        let features = self.table.features();
        let mut key = Vec::with_capacity(features.len());
        for name in features {
            let value = assignment.get(name).ok_or_else(|| {
                HbError::InvalidArgument(format!("assignment is missing parameter '{name}'"))
            })?;
            key.push(value.clone());
        }
        if assignment.len() != features.len() {
            let unknown = assignment
                .iter()
                .map(|(name, _)| name)
                .find(|name| !features.contains(name))
                .cloned()
                .unwrap_or_default();
            return Err(HbError::InvalidArgument(format!(
                "assignment has unknown parameter '{unknown}'"
            )));
        }

        self.index.get(&key).copied().ok_or_else(|| HbError::Lookup {
            assignment: assignment.to_string(),
        })
    }

    /// Normalized per-objective scores and d2h for the matching row.
    pub fn score(&self, assignment: &Assignment) -> HbResult<ObjectiveScores> {
        let row = &self.table.rows()[self.find_row(assignment)?];
        let heaven: Vec<f64> = self
            .table
            .objectives()
            .iter()
            .zip(&row.objectives)
            .zip(&self.bounds)
            .map(|((column, &raw), &(lo, hi))| {
                // A constant column cannot separate rows; treat it as ideal.
                let normalized = if hi > lo { (raw - lo) / (hi - lo) } else { 1.0 };
                match column.direction {
                    ObjectiveDirection::Maximize => normalized,
                    ObjectiveDirection::Minimize if hi > lo => 1.0 - normalized,
                    ObjectiveDirection::Minimize => 1.0,
                }
            })
            .collect();
        let d2h = distance_to_heaven(&heaven);
        Ok(ObjectiveScores { heaven, d2h })
    }
}

impl Objective for SurrogateObjective {
    fn evaluate(&self, assignment: &Assignment) -> HbResult<f64> {
        Ok(self.score(assignment)?.fitness())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ObjectiveColumn, ScoreRow};

    fn int_row(features: &[i64], objectives: &[f64]) -> ScoreRow {
        ScoreRow {
            features: features.iter().map(|&v| ParamValue::Int(v)).collect(),
            objectives: objectives.to_vec(),
        }
    }

    fn toy_objective() -> SurrogateObjective {
        let table = ScoreTable::new(
            "toy",
            vec!["a".into(), "b".into()],
            vec![ObjectiveColumn::new("acc+", ObjectiveDirection::Maximize)],
            vec![
                int_row(&[0, 0], &[0.1]),
                int_row(&[0, 1], &[0.9]),
                int_row(&[1, 0], &[0.2]),
                int_row(&[1, 1], &[0.95]),
            ],
        )
        .unwrap();
        SurrogateObjective::new(Arc::new(table))
    }

    fn two_row(direction: ObjectiveDirection) -> SurrogateObjective {
        let name = match direction {
            ObjectiveDirection::Maximize => "y+",
            ObjectiveDirection::Minimize => "y-",
        };
        let table = ScoreTable::new(
            "pair",
            vec!["x".into()],
            vec![ObjectiveColumn::new(name, direction)],
            vec![int_row(&[0], &[0.2]), int_row(&[1], &[0.8])],
        )
        .unwrap();
        SurrogateObjective::new(Arc::new(table))
    }

    #[test]
    fn column_max_scores_ideal() {
        let objective = toy_objective();
        let best = Assignment::new().with("a", 1i64).with("b", 1i64);
        assert_eq!(objective.evaluate(&best).unwrap(), 1.0);

        let worst = Assignment::new().with("a", 0i64).with("b", 0i64);
        assert_eq!(objective.evaluate(&worst).unwrap(), 0.0);
    }

    #[test]
    fn lookup_is_deterministic() {
        let objective = toy_objective();
        let assignment = Assignment::new().with("a", 0i64).with("b", 1i64);
        let first = objective.evaluate(&assignment).unwrap();
        for _ in 0..10 {
            assert_eq!(objective.evaluate(&assignment).unwrap().to_bits(), first.to_bits());
        }
    }

    #[test]
    fn every_row_scores_within_bounds() {
        let objective = toy_objective();
        for a in 0..2i64 {
            for b in 0..2i64 {
                let fitness = objective
                    .evaluate(&Assignment::new().with("a", a).with("b", b))
                    .unwrap();
                assert!((0.0..=1.0).contains(&fitness), "fitness {fitness} out of range");
            }
        }
    }

    #[test]
    fn unknown_value_is_a_lookup_failure() {
        let objective = toy_objective();
        let result = objective.evaluate(&Assignment::new().with("a", 2i64).with("b", 0i64));
        assert!(matches!(result, Err(HbError::Lookup { .. })));
    }

    #[test]
    fn partial_assignment_is_invalid() {
        let objective = toy_objective();
        let result = objective.evaluate(&Assignment::new().with("a", 2i64));
        assert!(matches!(result, Err(HbError::InvalidArgument(_))));

        let result = objective.evaluate(&Assignment::new());
        assert!(matches!(result, Err(HbError::InvalidArgument(_))));
    }

    #[test]
    fn extra_parameter_is_invalid() {
        let objective = toy_objective();
        let assignment = Assignment::new()
            .with("a", 1i64)
            .with("b", 1i64)
            .with("c", 0i64);
        assert!(matches!(
            objective.evaluate(&assignment),
            Err(HbError::InvalidArgument(_))
        ));
    }

    #[test]
    fn orientation_inverts_ranking() {
        let low = Assignment::new().with("x", 0i64);
        let high = Assignment::new().with("x", 1i64);

        let minimize = two_row(ObjectiveDirection::Minimize);
        assert!(minimize.evaluate(&low).unwrap() > minimize.evaluate(&high).unwrap());

        let maximize = two_row(ObjectiveDirection::Maximize);
        assert!(maximize.evaluate(&low).unwrap() < maximize.evaluate(&high).unwrap());
    }

    #[test]
    fn duplicate_rows_resolve_to_first() {
        let table = ScoreTable::new(
            "dup",
            vec!["x".into()],
            vec![ObjectiveColumn::new("y+", ObjectiveDirection::Maximize)],
            vec![
                int_row(&[0], &[0.0]),
                int_row(&[1], &[1.0]),
                int_row(&[1], &[0.0]),
            ],
        )
        .unwrap();
        let objective = SurrogateObjective::new(Arc::new(table));
        let assignment = Assignment::new().with("x", 1i64);
        assert_eq!(objective.find_row(&assignment).unwrap(), 1);
        assert_eq!(objective.evaluate(&assignment).unwrap(), 1.0);
    }

    #[test]
    fn multi_objective_d2h() {
        let table = ScoreTable::new(
            "multi",
            vec!["x".into()],
            vec![
                ObjectiveColumn::new("acc+", ObjectiveDirection::Maximize),
                ObjectiveColumn::new("lat-", ObjectiveDirection::Minimize),
            ],
            vec![
                int_row(&[0], &[1.0, 10.0]),
                int_row(&[1], &[0.0, 0.0]),
                int_row(&[2], &[1.0, 0.0]),
            ],
        )
        .unwrap();
        let objective = SurrogateObjective::new(Arc::new(table));

        let scores = objective.score(&Assignment::new().with("x", 0i64)).unwrap();
        assert_eq!(scores.heaven, vec![1.0, 0.0]);
        assert!((scores.d2h - (0.5f64).sqrt()).abs() < 1e-12);

        // Only the row that is best on both objectives reaches 1.0.
        assert_eq!(objective.evaluate(&Assignment::new().with("x", 2i64)).unwrap(), 1.0);
        assert!(objective.evaluate(&Assignment::new().with("x", 1i64)).unwrap() < 1.0);
    }

    #[test]
    fn constant_column_never_penalizes() {
        let table = ScoreTable::new(
            "flat",
            vec!["x".into()],
            vec![ObjectiveColumn::new("y-", ObjectiveDirection::Minimize)],
            vec![int_row(&[0], &[3.0]), int_row(&[1], &[3.0])],
        )
        .unwrap();
        let objective = SurrogateObjective::new(Arc::new(table));
        assert_eq!(objective.evaluate(&Assignment::new().with("x", 1i64)).unwrap(), 1.0);
    }
}
