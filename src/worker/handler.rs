//! Job handlers.
//!
//! A handler is invoked concurrently from up to `parallel` attempts, so it
//! must be `Send + Sync`. Returning an error schedules a retry or drops the
//! job once retries are exhausted.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Job;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, job: &Job) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        (self)(job.clone()).await
    }
}

/// Runs an executable per job.
///
/// The payload bytes are written to the child's stdin and the job metadata
/// is passed as `JOBQ_QUEUE`, `JOBQ_JOB_ID` and `JOBQ_RETRY_COUNT`. A
/// non-zero exit is a failure.
pub struct CommandHandler {
    command: PathBuf,
    queue: String,
}

impl CommandHandler {
    /// Relative paths are resolved against the current directory now, not
    /// at spawn time.
    pub fn new(command: &Path, queue: impl Into<String>) -> Result<Self> {
        let command = if command.is_relative() {
            std::env::current_dir()?.join(command)
        } else {
            command.to_path_buf()
        };
        Ok(Self {
            command,
            queue: queue.into(),
        })
    }

    pub fn command(&self) -> &Path {
        &self.command
    }
}

#[async_trait]
impl Handler for CommandHandler {
    async fn handle(&self, job: &Job) -> anyhow::Result<()> {
        debug!(
            job_id = %job.id,
            command = %self.command.display(),
            "running job command"
        );

        let mut child = Command::new(&self.command)
            .env("JOBQ_QUEUE", &self.queue)
            .env("JOBQ_JOB_ID", job.id.as_str())
            .env("JOBQ_RETRY_COUNT", job.retry_count.to_string())
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::from)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits without reading its input is not a failure.
            if let Err(e) = stdin.write_all(&job.payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(Error::from(e).into());
                }
            }
        }

        let status = child.wait().await.map_err(Error::from)?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Handler(format!(
                "{} exited with status {}",
                self.command.display(),
                status.code().unwrap_or(-1)
            ))
            .into())
        }
    }
}
