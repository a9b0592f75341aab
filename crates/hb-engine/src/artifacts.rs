//! Cell result artifacts: the persisted output of a sweep cell and the
//! resume signal for the next invocation.
//!
//! An artifact holds three CSV records, each with one field per repeat in
//! repeat order: best configs (compact JSON), best fitness values, and elapsed
//! seconds.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use hb_types::{internal_error, seed_for_repeat, Assignment, CellKey, HbError, HbResult, RunResult};

const RECORDS: usize = 3;

/// `<output_dir>/<optimizer>/<dataset>_<budget>.csv`
pub fn cell_artifact_path(output_dir: &Path, key: &CellKey) -> PathBuf {
    output_dir
        .join(&key.optimizer)
        .join(format!("{}_{}.csv", key.dataset, key.budget))
}

/// `<logging_dir>/<optimizer>/<dataset>_<seed>.csv`
pub fn trial_log_path(logging_dir: &Path, optimizer: &str, dataset: &str, seed: u64) -> PathBuf {
    logging_dir
        .join(optimizer)
        .join(format!("{dataset}_{seed}.csv"))
}

/// All repeats of one cell, ordered by repeat index.
#[derive(Debug, Clone, PartialEq)]
pub struct CellReport {
    pub key: CellKey,
    pub results: Vec<RunResult>,
}

impl CellReport {
    /// Orders `results` by repeat and checks that repeats `0..n` are all present.
    pub fn new(key: CellKey, mut results: Vec<RunResult>) -> HbResult<Self> {
        results.sort_by_key(|r| r.repeat);
        for (i, result) in results.iter().enumerate() {
            if result.repeat != i {
                return Err(internal_error!("cell {key} is missing repeat {i}"));
            }
        }
        Ok(Self { key, results })
    }

    pub fn repeats(&self) -> usize {
        self.results.len()
    }

    /// Write the report, replacing any existing file only once the new
    /// contents are complete on disk.
    pub fn write(&self, path: &Path) -> HbResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HbError::InvalidArgument(format!("bad artifact path {}", path.display())))?;
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(&tmp)?);
        let configs: Vec<String> = self.results.iter().map(|r| r.best_assignment.to_json()).collect();
        let values: Vec<String> = self.results.iter().map(|r| r.best_fitness.to_string()).collect();
        let times: Vec<String> = self.results.iter().map(|r| r.elapsed_secs.to_string()).collect();
        for record in [configs, values, times] {
            writer
                .write_record(&record)
                .map_err(|e| HbError::Csv(e.to_string()))?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp, path)?;
        tracing::info!("Wrote {} repeats for {} to {}", self.repeats(), self.key, path.display());
        Ok(())
    }

    pub fn read(path: &Path, key: CellKey) -> HbResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| HbError::Csv(format!("{}: {e}", path.display())))?;
        let records = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| HbError::Csv(e.to_string()))?;

        if records.len() != RECORDS {
            return Err(HbError::Csv(format!(
                "expected {RECORDS} records, found {}",
                records.len()
            )));
        }
        let repeats = records[0].len();
        if records.iter().any(|r| r.len() != repeats) {
            return Err(HbError::Csv("records have differing repeat counts".to_string()));
        }

        let parse_f64 = |field: &str| {
            field
                .parse::<f64>()
                .map_err(|e| HbError::Csv(format!("bad number '{field}': {e}")))
        };
        let results = (0..repeats)
            .map(|i| {
                Ok(RunResult {
                    repeat: i,
                    seed: seed_for_repeat(i),
                    best_assignment: serde_json::from_str::<Assignment>(&records[0][i])?,
                    best_fitness: parse_f64(&records[1][i])?,
                    elapsed_secs: parse_f64(&records[2][i])?,
                })
            })
            .collect::<HbResult<Vec<_>>>()?;

        Ok(Self { key, results })
    }
}

/// What an artifact location says about its cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactStatus {
    Missing,
    Complete,
    Invalid(String),
}

/// Inspect the artifact at `path`. An absent or empty file is missing; with
/// `expected_repeats` set the artifact must also parse and hold exactly that
/// many repeats.
pub fn inspect_artifact(path: &Path, key: &CellKey, expected_repeats: Option<usize>) -> ArtifactStatus {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {}
        _ => return ArtifactStatus::Missing,
    }
    let Some(expected) = expected_repeats else {
        return ArtifactStatus::Complete;
    };
    match CellReport::read(path, key.clone()) {
        Ok(report) if report.repeats() == expected => ArtifactStatus::Complete,
        Ok(report) => ArtifactStatus::Invalid(format!(
            "holds {} repeats, expected {expected}",
            report.repeats()
        )),
        Err(e) => ArtifactStatus::Invalid(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> CellKey {
        CellKey::new("toy", "dehb", 4)
    }

    fn result(repeat: usize, fitness: f64) -> RunResult {
        RunResult {
            repeat,
            seed: seed_for_repeat(repeat),
            best_assignment: Assignment::new().with("a", 1i64).with("kernel", "rbf, linear"),
            best_fitness: fitness,
            elapsed_secs: 0.25,
        }
    }

    #[test]
    fn paths_follow_layout() {
        let out = Path::new("/out");
        assert_eq!(cell_artifact_path(out, &key()), PathBuf::from("/out/dehb/toy_4.csv"));
        assert_eq!(
            trial_log_path(Path::new("/logs"), "dehb", "toy", 3),
            PathBuf::from("/logs/dehb/toy_3.csv")
        );
    }

    #[test]
    fn report_orders_by_repeat() {
        let report = CellReport::new(key(), vec![result(1, 0.5), result(0, 0.9)]).unwrap();
        assert_eq!(report.results[0].repeat, 0);
        assert!(CellReport::new(key(), vec![result(0, 0.5), result(2, 0.9)]).is_err());
    }

    #[test]
    fn written_report_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = cell_artifact_path(dir.path(), &key());
        let report = CellReport::new(key(), vec![result(0, 0.75), result(1, 1.0)]).unwrap();
        report.write(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(!path.with_file_name(".toy_4.csv.tmp").exists());

        assert_eq!(CellReport::read(&path, key()).unwrap(), report);
        assert_eq!(inspect_artifact(&path, &key(), Some(2)), ArtifactStatus::Complete);
    }

    #[test]
    fn shape_mismatch_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = cell_artifact_path(dir.path(), &key());
        CellReport::new(key(), vec![result(0, 0.75)]).unwrap().write(&path).unwrap();

        assert!(matches!(
            inspect_artifact(&path, &key(), Some(3)),
            ArtifactStatus::Invalid(_)
        ));
        // Without validation any existing file counts as done.
        assert_eq!(inspect_artifact(&path, &key(), None), ArtifactStatus::Complete);
    }

    #[test]
    fn empty_file_is_missing_and_truncated_file_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("toy_4.csv");

        fs::write(&path, "").unwrap();
        assert_eq!(inspect_artifact(&path, &key(), Some(1)), ArtifactStatus::Missing);
        assert_eq!(inspect_artifact(&path, &key(), None), ArtifactStatus::Missing);

        fs::write(&path, "\"{\"\"a\"\":1}\"\n0.5\n").unwrap();
        assert!(matches!(inspect_artifact(&path, &key(), Some(1)), ArtifactStatus::Invalid(_)));

        assert_eq!(
            inspect_artifact(&dir.path().join("absent.csv"), &key(), Some(1)),
            ArtifactStatus::Missing
        );
    }
}
