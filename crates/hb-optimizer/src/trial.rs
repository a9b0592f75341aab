//! Append-only per-repeat trial log.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hb_types::{Assignment, HbError, HbResult};

pub const TRIAL_LOG_HEADER: [&str; 4] = ["iteration", "config", "value", "elapsed_time"];

/// One row of the trial log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub iteration: usize,
    /// The evaluated assignment as compact JSON.
    pub config: String,
    pub value: f64,
    /// Seconds since the optimization started.
    pub elapsed_time: f64,
}

/// Best-effort CSV logger owned by one optimizer run.
///
/// Write failures are reported once and switch the logger off; they never
/// reach the search loop.
#[derive(Debug)]
pub struct TrialLogger {
    path: Option<PathBuf>,
    writer: Option<csv::Writer<File>>,
    iteration: usize,
}

impl TrialLogger {
    /// A logger that records nothing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            writer: None,
            iteration: 0,
        }
    }

    /// Truncate `path` (creating parent directories) and write the header row.
    pub fn create<P: AsRef<Path>>(path: P) -> HbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| HbError::Csv(format!("{}: {e}", path.display())))?;
        writer
            .write_record(TRIAL_LOG_HEADER)
            .map_err(|e| HbError::Csv(e.to_string()))?;
        writer.flush()?;

        tracing::debug!("Trial logging started at {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            writer: Some(writer),
            iteration: 0,
        })
    }

    /// Like [`TrialLogger::create`], but degrades to a disabled logger on error.
    pub fn open_or_disabled(path: Option<&Path>) -> Self {
        match path {
            None => Self::disabled(),
            Some(path) => Self::create(path).unwrap_or_else(|e| {
                tracing::warn!("Trial logging disabled for {}: {}", path.display(), e);
                Self::disabled()
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of rows written so far.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    pub fn log(&mut self, assignment: &Assignment, value: f64, elapsed: Duration) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let record = TrialRecord {
            iteration: self.iteration,
            config: assignment.to_json(),
            value,
            elapsed_time: elapsed.as_secs_f64(),
        };
        let written = writer
            .serialize(&record)
            .map_err(|e| e.to_string())
            .and_then(|_| writer.flush().map_err(|e| e.to_string()));

        match written {
            Ok(()) => {
                tracing::trace!(
                    "Logged iteration {}: config={}, value={}",
                    record.iteration,
                    assignment,
                    value
                );
                self.iteration += 1;
            }
            Err(e) => {
                tracing::warn!("Trial log write failed, disabling logger: {}", e);
                self.writer = None;
            }
        }
    }
}
