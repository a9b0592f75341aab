//! Dataset discovery and CSV loading.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use hb_types::{DataError, HbResult, ParamValue};
use walkdir::WalkDir;

use crate::table::{ObjectiveColumn, ObjectiveDirection, ScoreRow, ScoreTable};

/// Suffix marking a column that is neither feature nor objective.
const IGNORED_SUFFIX: char = 'X';

/// Role of a CSV header column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Feature,
    Objective(ObjectiveDirection),
    Ignored,
}

impl ColumnRole {
    pub fn from_header(name: &str) -> Self {
        if let Some(direction) = ObjectiveDirection::from_column_name(name) {
            Self::Objective(direction)
        } else if name.ends_with(IGNORED_SUFFIX) {
            Self::Ignored
        } else {
            Self::Feature
        }
    }
}

/// Resolve a file or directory into the ordered list of dataset files.
///
/// Directories are walked recursively for `.csv` files; entries are visited in
/// file-name order so a sweep's output ordering is stable across runs.
pub fn discover_datasets<P: AsRef<Path>>(input: P) -> HbResult<Vec<PathBuf>> {
    let input = input.as_ref();
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(DataError::SourceNotFound(input.display().to_string()).into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to walk {}: {}", input.display(), e),
        })?;
        let is_csv = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if entry.file_type().is_file() && is_csv {
            files.push(entry.into_path());
        }
    }

    tracing::info!("Discovered {} dataset files under {}", files.len(), input.display());
    Ok(files)
}

/// Dataset name used in artifact and log file names: the file stem.
pub fn dataset_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

/// Load an exhaustively-enumerated CSV into a [`ScoreTable`].
pub fn load_table<P: AsRef<Path>>(path: P) -> HbResult<ScoreTable> {
    let path = path.as_ref();
    let source = path.display().to_string();
    tracing::info!("Loading score table from: {}", source);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open CSV file {source}: {e}"),
        })?;

    let headers = rdr
        .headers()
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read CSV headers of {source}: {e}"),
        })?
        .clone();

    let roles: Vec<ColumnRole> = headers.iter().map(ColumnRole::from_header).collect();
    let feature_names: Vec<String> = headers
        .iter()
        .zip(&roles)
        .filter(|(_, role)| **role == ColumnRole::Feature)
        .map(|(name, _)| name.to_string())
        .collect();
    let objectives: Vec<ObjectiveColumn> = headers
        .iter()
        .zip(&roles)
        .filter_map(|(name, role)| match role {
            ColumnRole::Objective(direction) => Some(ObjectiveColumn::new(name, *direction)),
            _ => None,
        })
        .collect();

    if feature_names.is_empty() || objectives.is_empty() {
        return Err(DataError::InvalidFormat {
            path: source,
            message: format!(
                "expected feature columns and objective columns ending in '+' or '-', found {} and {}",
                feature_names.len(),
                objectives.len()
            ),
        }
        .into());
    }

    let mut raw_features: Vec<Vec<String>> = Vec::new();
    let mut objective_rows: Vec<Vec<f64>> = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.map_err(|e| DataError::ParseError {
            path: source.clone(),
            line,
            message: e.to_string(),
        })?;

        let mut features = Vec::with_capacity(feature_names.len());
        let mut values = Vec::with_capacity(objectives.len());
        for (cell, role) in record.iter().zip(&roles) {
            match role {
                ColumnRole::Feature => features.push(cell.to_string()),
                ColumnRole::Objective(_) => {
                    let value = cell.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(
                        || DataError::ParseError {
                            path: source.clone(),
                            line,
                            message: format!("objective value '{cell}' is not a finite number"),
                        },
                    )?;
                    values.push(value);
                }
                ColumnRole::Ignored => {}
            }
        }
        raw_features.push(features);
        objective_rows.push(values);
    }

    let typed_columns: Vec<Vec<ParamValue>> = (0..feature_names.len())
        .map(|col| type_column(raw_features.iter().map(|row| row[col].as_str())))
        .collect();

    let rows = objective_rows
        .into_iter()
        .enumerate()
        .map(|(i, objectives)| ScoreRow {
            features: typed_columns.iter().map(|column| column[i].clone()).collect(),
            objectives,
        })
        .collect();

    let table = ScoreTable::new(dataset_name(path), feature_names, objectives, rows)?;
    tracing::info!(
        "Loaded {} rows with {} features and {} objectives from {}",
        table.len(),
        table.features().len(),
        table.objectives().len(),
        source
    );
    Ok(table)
}

/// Types a feature column as a whole: all-integer, else all-float, else text.
fn type_column<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> Vec<ParamValue> {
    if let Some(ints) = cells
        .clone()
        .map(|c| c.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()
    {
        return ints.into_iter().map(ParamValue::Int).collect();
    }
    if let Some(floats) = cells
        .clone()
        .map(|c| c.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<_>>>()
    {
        return floats.into_iter().map(ParamValue::Float).collect();
    }
    cells.map(|c| ParamValue::Text(c.to_string())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;
    use std::fs;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut temp_file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(temp_file, "{contents}").unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_csv_loading() {
        let file = write_csv(
            "lr,kernel,depth,noteX,Acc+,Lat-\n\
             0.1,rbf,3,a,0.8,12\n\
             0.01,linear,4,b,0.7,9\n",
        );
        let table = load_table(file.path()).unwrap();

        assert_eq!(table.features(), &["lr", "kernel", "depth"]);
        assert_eq!(table.objectives().len(), 2);
        assert_eq!(table.objectives()[1].direction, ObjectiveDirection::Minimize);
        assert_eq!(table.len(), 2);

        let first = &table.rows()[0];
        assert_eq!(first.features[0], ParamValue::Float(0.1));
        assert_eq!(first.features[1], ParamValue::Text("rbf".into()));
        assert_eq!(first.features[2], ParamValue::Int(3));
        assert_eq!(first.objectives, vec![0.8, 12.0]);
    }

    #[test]
    fn mixed_numeric_column_is_float() {
        let file = write_csv("x,y+\n1,0.5\n1.5,0.7\n");
        let table = load_table(file.path()).unwrap();
        assert_eq!(table.rows()[0].features[0], ParamValue::Float(1.0));
    }

    #[test]
    fn missing_objectives_are_rejected() {
        let file = write_csv("x,y\n1,2\n");
        let result = load_table(file.path());
        assert!(matches!(
            result,
            Err(HbError::Data(DataError::InvalidFormat { .. }))
        ));
    }

    #[test]
    fn non_numeric_objective_reports_line() {
        let file = write_csv("x,y+\n1,0.5\n2,oops\n");
        match load_table(file.path()) {
            Err(HbError::Data(DataError::ParseError { line, .. })) => assert_eq!(line, 3),
            other => panic!("Expected ParseError, got: {other:?}"),
        }
    }

    #[test]
    fn discovery_walks_directories_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.csv"), "x,y+\n1,1\n").unwrap();
        fs::write(dir.path().join("a.csv"), "x,y+\n1,1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        fs::write(dir.path().join("nested").join("c.csv"), "x,y+\n1,1\n").unwrap();

        let files = discover_datasets(dir.path()).unwrap();
        let names: Vec<String> = files.iter().map(dataset_name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn discovery_of_single_file() {
        let file = write_csv("x,y+\n1,1\n");
        assert_eq!(discover_datasets(file.path()).unwrap(), vec![file.path().to_path_buf()]);
    }

    #[test]
    fn discovery_of_missing_path_fails() {
        let result = discover_datasets("/path/that/does/not/exist");
        assert!(matches!(
            result,
            Err(HbError::Data(DataError::SourceNotFound(_)))
        ));
    }
}
