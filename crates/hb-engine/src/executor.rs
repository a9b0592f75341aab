//! Worker pools that run repeats in isolation.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use hb_types::{HbResult, RunResult, WorkerError};

use crate::worker::{run_repeat, RepeatTask, WorkerReply};

/// Runs one repeat somewhere isolated from the coordinator and from other
/// repeats. Dropping the returned future must cancel the repeat.
#[async_trait]
pub trait RepeatExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, task: RepeatTask) -> HbResult<RunResult>;
}

/// Runs repeats on tokio's blocking pool inside the coordinating process.
///
/// Each repeat builds its own objective, strategy and RNG; only the read-only
/// table and space are shared.
#[derive(Debug, Clone, Default)]
pub struct InProcessExecutor;

#[async_trait]
impl RepeatExecutor for InProcessExecutor {
    fn name(&self) -> &str {
        "in-process"
    }

    async fn execute(&self, task: RepeatTask) -> HbResult<RunResult> {
        let repeat = task.repeat;
        tokio::task::spawn_blocking(move || run_repeat(&task))
            .await
            .map_err(|_| WorkerError::Panicked { repeat })?
    }
}

/// Runs each repeat in a child process speaking the `worker` protocol:
/// a [`RepeatTask`] as JSON on stdin, a [`WorkerReply`] as JSON on stdout.
#[derive(Debug, Clone)]
pub struct SubprocessExecutor {
    program: PathBuf,
}

impl SubprocessExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Re-executes the running binary.
    pub fn current_exe() -> HbResult<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }
}

#[async_trait]
impl RepeatExecutor for SubprocessExecutor {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn execute(&self, task: RepeatTask) -> HbResult<RunResult> {
        let repeat = task.repeat;
        let payload = serde_json::to_vec(&task)?;

        let mut child = Command::new(&self.program)
            .arg("worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Spawn {
                message: format!("{}: {e}", self.program.display()),
            })?;
        tracing::debug!("Spawned worker {:?} for repeat {} of {}", child.id(), repeat, task.key);

        let mut stdin = child.stdin.take().ok_or_else(|| WorkerError::Spawn {
            message: "worker stdin unavailable".to_string(),
        })?;
        stdin.write_all(&payload).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let output = child.wait_with_output().await?;
        match serde_json::from_slice::<WorkerReply>(&output.stdout) {
            Ok(WorkerReply::Completed { result }) => Ok(result),
            Ok(WorkerReply::Failed { message }) => Err(WorkerError::Failed { repeat, message }.into()),
            Err(_) if !output.status.success() => Err(WorkerError::Failed {
                repeat,
                message: format!("worker exited with {}", output.status),
            }
            .into()),
            Err(e) => Err(WorkerError::Protocol {
                repeat,
                message: e.to_string(),
            }
            .into()),
        }
    }
}
