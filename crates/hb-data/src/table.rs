//! The read-only score table for one dataset.

use serde::{Deserialize, Serialize};

use hb_types::{HbError, HbResult, HyperparameterSpace, ParamValue, ParameterDef};

/// Whether an objective column is better when larger or smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// Reads the orientation marker at the end of a header name.
    pub fn from_column_name(name: &str) -> Option<Self> {
        if name.ends_with('-') {
            Some(Self::Minimize)
        } else if name.ends_with('+') {
            Some(Self::Maximize)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveColumn {
    pub name: String,
    pub direction: ObjectiveDirection,
}

impl ObjectiveColumn {
    pub fn new(name: impl Into<String>, direction: ObjectiveDirection) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }
}

/// One fully-evaluated configuration: feature values plus raw objective values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub features: Vec<ParamValue>,
    pub objectives: Vec<f64>,
}

/// Ordered rows of a pre-evaluated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    name: String,
    features: Vec<String>,
    objectives: Vec<ObjectiveColumn>,
    rows: Vec<ScoreRow>,
}

impl ScoreTable {
    pub fn new(
        name: impl Into<String>,
        features: Vec<String>,
        objectives: Vec<ObjectiveColumn>,
        rows: Vec<ScoreRow>,
    ) -> HbResult<Self> {
        let name = name.into();
        if features.is_empty() {
            return Err(HbError::Config(format!("table '{name}' has no feature columns")));
        }
        if objectives.is_empty() {
            return Err(HbError::Config(format!("table '{name}' has no objective columns")));
        }
        if rows.is_empty() {
            return Err(HbError::Config(format!("table '{name}' has no rows")));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.features.len() != features.len() || row.objectives.len() != objectives.len() {
                return Err(HbError::Config(format!(
                    "row {i} of table '{name}' has {} features and {} objectives, expected {} and {}",
                    row.features.len(),
                    row.objectives.len(),
                    features.len(),
                    objectives.len()
                )));
            }
            if let Some(bad) = row.objectives.iter().find(|v| !v.is_finite()) {
                return Err(HbError::Config(format!(
                    "row {i} of table '{name}' has non-finite objective value {bad}"
                )));
            }
        }

        Ok(Self {
            name,
            features,
            objectives,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn objectives(&self) -> &[ObjectiveColumn] {
        &self.objectives
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Observed (min, max) of each objective column.
    pub fn objective_bounds(&self) -> Vec<(f64, f64)> {
        (0..self.objectives.len())
            .map(|col| {
                self.rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
                    (lo.min(row.objectives[col]), hi.max(row.objectives[col]))
                })
            })
            .collect()
    }

    /// Each feature column's distinct values, in first-appearance order, become
    /// that parameter's categorical domain.
    pub fn hyperparameter_space(&self) -> HbResult<HyperparameterSpace> {
        let parameters = self
            .features
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let mut values: Vec<ParamValue> = Vec::new();
                for row in &self.rows {
                    let value = &row.features[col];
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
                ParameterDef {
                    name: name.clone(),
                    values,
                }
            })
            .collect();
        HyperparameterSpace::new(parameters)
    }

    /// Every parameter of `space` must be a feature column of this table.
    pub fn ensure_covers(&self, space: &HyperparameterSpace) -> HbResult<()> {
        for name in space.param_names() {
            if !self.features.iter().any(|f| f == name) {
                return Err(HbError::Config(format!(
                    "parameter '{name}' is not a column of table '{}'",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
