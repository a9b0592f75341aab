//! Hyperparameter space definitions and concrete assignments.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};

use crate::errors::{HbError, HbResult};

/// A single cell value of a feature column.
///
/// Floats compare by bit pattern so values can key hash maps; loaders never
/// produce NaN floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Parameter name → chosen value. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment(BTreeMap<String, ParamValue>);

impl Assignment {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Compact JSON form used in logs and result artifacts.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

impl std::fmt::Display for Assignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, ParamValue)> for Assignment {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single categorical dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// The full search space: an ordered list of categorical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterSpace {
    parameters: Vec<ParameterDef>,
}

impl HyperparameterSpace {
    pub fn new(parameters: Vec<ParameterDef>) -> HbResult<Self> {
        let mut seen = HashSet::new();
        for param in &parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(HbError::Config(format!(
                    "parameter '{}' is declared more than once",
                    param.name
                )));
            }
            if param.values.is_empty() {
                return Err(HbError::Config(format!(
                    "values for parameter '{}' must be a non-empty collection",
                    param.name
                )));
            }
        }
        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Candidate values of one parameter, if it exists.
    pub fn values(&self, name: &str) -> Option<&[ParamValue]> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.values.as_slice())
    }

    pub fn dimensions(&self) -> usize {
        self.parameters.len()
    }

    /// Number of points in the cross-product, or `None` on overflow.
    pub fn size(&self) -> Option<usize> {
        if self.parameters.is_empty() {
            return Some(0);
        }
        let mut total: usize = 1;
        for param in &self.parameters {
            total = total.checked_mul(param.values.len())?;
        }
        Some(total)
    }

    /// Builds the assignment addressed by one value index per dimension.
    pub fn assignment_at(&self, indices: &[usize]) -> HbResult<Assignment> {
        if indices.len() != self.parameters.len() {
            return Err(HbError::InvalidArgument(format!(
                "expected {} indices, got {}",
                self.parameters.len(),
                indices.len()
            )));
        }
        self.parameters
            .iter()
            .zip(indices)
            .map(|(param, &idx)| {
                param
                    .values
                    .get(idx)
                    .map(|v| (param.name.clone(), v.clone()))
                    .ok_or_else(|| {
                        HbError::InvalidArgument(format!(
                            "index {idx} out of range for parameter '{}'",
                            param.name
                        ))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> HyperparameterSpace {
        HyperparameterSpace::new(vec![
            ParameterDef {
                name: "a".into(),
                values: vec![ParamValue::Int(0), ParamValue::Int(1)],
            },
            ParameterDef {
                name: "kernel".into(),
                values: vec!["rbf".into(), "linear".into(), "poly".into()],
            },
        ])
        .unwrap()
    }

    #[test]
    fn space_size_is_cross_product() {
        assert_eq!(sample_space().size(), Some(6));
        assert_eq!(sample_space().dimensions(), 2);
    }

    #[test]
    fn empty_candidate_set_is_rejected() {
        let result = HyperparameterSpace::new(vec![ParameterDef {
            name: "lr".into(),
            values: vec![],
        }]);
        assert!(matches!(result, Err(HbError::Config(_))));
    }

    #[test]
    fn duplicate_parameter_is_rejected() {
        let def = ParameterDef {
            name: "lr".into(),
            values: vec![ParamValue::Float(0.1)],
        };
        let result = HyperparameterSpace::new(vec![def.clone(), def]);
        assert!(matches!(result, Err(HbError::Config(_))));
    }

    #[test]
    fn assignment_at_resolves_indices() {
        let space = sample_space();
        let assignment = space.assignment_at(&[1, 2]).unwrap();
        assert_eq!(assignment.get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(assignment.get("kernel"), Some(&ParamValue::from("poly")));
        assert!(space.assignment_at(&[2, 0]).is_err());
        assert!(space.assignment_at(&[0]).is_err());
    }

    #[test]
    fn float_values_hash_by_bits() {
        let mut set = HashSet::new();
        set.insert(ParamValue::Float(0.5));
        assert!(set.contains(&ParamValue::Float(0.5)));
        assert!(!set.contains(&ParamValue::Int(0)));
        assert_ne!(ParamValue::Int(1), ParamValue::Float(1.0));
    }

    #[test]
    fn assignment_json_is_typed() {
        let assignment = Assignment::new()
            .with("depth", 3i64)
            .with("lr", 0.5)
            .with("kernel", "rbf");
        let json = assignment.to_json();
        assert_eq!(json, r#"{"depth":3,"kernel":"rbf","lr":0.5}"#);

        let back: Assignment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, assignment);
        assert_eq!(assignment.to_string(), "{depth: 3, kernel: rbf, lr: 0.5}");
    }
}
