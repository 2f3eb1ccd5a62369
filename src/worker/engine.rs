//! Dispatch loop: bounded-concurrency fetch, handle, retry or drop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use opentelemetry::KeyValue;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, warn};

use super::handler::Handler;
use super::options::{Reporter, WorkerOptions};
use crate::error::{Error, Result};
use crate::model::{CounterField, Job, Outcome};
use crate::queue::Queue;
use crate::telemetry::job::{record_outcome, start_attempt_span};
use crate::telemetry::metrics;

/// Consumes one queue until cancelled.
pub struct Worker {
    queue: Queue,
    handler: Arc<dyn Handler>,
    options: Arc<WorkerOptions>,
}

impl Worker {
    pub fn new(queue: Queue, handler: impl Handler + 'static, options: WorkerOptions) -> Result<Self> {
        Self::with_handler(queue, Arc::new(handler), options)
    }

    /// Same as [`Worker::new`] for a handler that is already shared.
    pub fn with_handler(
        queue: Queue,
        handler: Arc<dyn Handler>,
        options: WorkerOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            queue,
            handler,
            options: Arc::new(options),
        })
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Run until `cancel` fires, then wait for in-flight attempts and
    /// scheduled retries before returning.
    pub async fn run(&self, cancel: CancellationToken) {
        let parallel = self.options.parallel;
        let semaphore = Arc::new(Semaphore::new(parallel));
        let retries = TaskTracker::new();

        info!(
            queue = %self.queue.name(),
            parallel,
            max_retry = self.options.max_retry,
            "worker started"
        );

        loop {
            if cancel.is_cancelled() {
                info!(queue = %self.queue.name(), "worker shutting down");
                break;
            }

            if let Some(ref reporter) = self.options.reporter {
                self.report_if_idle(reporter).await;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => continue,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let attempt = Attempt {
                queue: self.queue.clone(),
                handler: Arc::clone(&self.handler),
                options: Arc::clone(&self.options),
                retries: retries.clone(),
                cancel: cancel.clone(),
            };
            tokio::spawn(async move {
                let _permit = permit;
                attempt.run().await;
            });
        }

        // Every permit back means no attempt is still running. `validate`
        // bounds `parallel` to u32.
        let permits = u32::try_from(parallel).unwrap_or(u32::MAX);
        let _drained = semaphore.acquire_many(permits).await;
        retries.close();
        retries.wait().await;

        info!(queue = %self.queue.name(), "worker stopped");
    }

    /// Report and reset the counters once the queue has been quiet for the
    /// idle window. A reset queue reads as not running, so each idle period
    /// is reported once.
    async fn report_if_idle(&self, reporter: &Reporter) {
        let counter = self.queue.counter();
        let last_active = match counter.last_active_at().await {
            Ok(at) => at,
            Err(e) => {
                error!(queue = %self.queue.name(), error = %e, "failed to read activity marker");
                return;
            }
        };

        let idle_for = (Utc::now() - last_active).to_std().unwrap_or_default();
        if idle_for < self.options.idle {
            return;
        }

        let snapshot = match counter.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(queue = %self.queue.name(), error = %e, "failed to read counters");
                return;
            }
        };
        if !snapshot.is_running {
            return;
        }

        if let Err(e) = counter.reset().await {
            error!(queue = %self.queue.name(), error = %e, "failed to reset counters");
            return;
        }
        debug!(queue = %self.queue.name(), idle_secs = idle_for.as_secs(), "queue idle, reporting");
        reporter(&snapshot);
    }
}

/// Convenience wrapper: build a [`Worker`] and run it until cancelled.
pub async fn run_worker(
    queue: Queue,
    cancel: CancellationToken,
    handler: impl Handler + 'static,
    options: WorkerOptions,
) -> Result<()> {
    Worker::new(queue, handler, options)?.run(cancel).await;
    Ok(())
}

/// Everything one attempt needs, moved into its task.
struct Attempt {
    queue: Queue,
    handler: Arc<dyn Handler>,
    options: Arc<WorkerOptions>,
    retries: TaskTracker,
    cancel: CancellationToken,
}

impl Attempt {
    async fn run(self) {
        if self.cancel.is_cancelled() {
            return;
        }

        let job = match self.queue.fetch().await {
            Ok(job) => job,
            Err(Error::EmptyQueue) => {
                sleep(&self.cancel, self.options.interval).await;
                return;
            }
            Err(e) => {
                // Store outage or an envelope we could not parse; the latter
                // is already gone from the list.
                error!(queue = %self.queue.name(), error = %e, "failed to fetch job");
                sleep(&self.cancel, self.options.recover).await;
                return;
            }
        };

        self.count(CounterField::Processing).await;

        let span = start_attempt_span(self.queue.name(), &job);
        let start = Instant::now();
        let result = self.handler.handle(&job).instrument(span.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(()) => {
                self.count(CounterField::Succeeded).await;
                Outcome::Succeeded
            }
            Err(e) => {
                span.in_scope(|| error!(error = %e, duration_ms, "job failed"));
                self.count(CounterField::Failed).await;
                self.fail(job).await
            }
        };

        record_outcome(&span, outcome.as_str(), duration_ms);
        let labels = [
            KeyValue::new("queue", self.queue.name().to_string()),
            KeyValue::new("outcome", outcome.as_str()),
        ];
        metrics::job_outcomes().add(1, &labels);
        metrics::job_duration_ms().record(duration_ms as f64, &labels);
    }

    /// Drop the job if it is out of retries, otherwise schedule it to be
    /// re-published after a linear backoff.
    async fn fail(&self, mut job: Job) -> Outcome {
        if job.retry_count >= self.options.max_retry {
            warn!(
                queue = %self.queue.name(),
                job_id = %job.id,
                retry_count = job.retry_count,
                safe_drop = self.options.safe_drop,
                "retry limit exceeded, dropping job"
            );
            self.count(CounterField::Dropped).await;
            if self.options.safe_drop {
                self.queue.discard_to_dead_list(&job).await;
            }
            return Outcome::Dropped;
        }

        job.retry_count += 1;
        let delay = job.backoff();
        let queue = self.queue.clone();
        let cancel = self.cancel.clone();

        // The backoff runs off-permit so a sleeping retry never holds a slot.
        self.retries.spawn(async move {
            if !sleep(&cancel, delay).await {
                debug!(queue = %queue.name(), job_id = %job.id, "shutdown during backoff, requeueing now");
            }
            match queue.requeue(&job).await {
                Ok(()) => debug!(
                    queue = %queue.name(),
                    job_id = %job.id,
                    retry_count = job.retry_count,
                    "job requeued"
                ),
                Err(e) => error!(
                    queue = %queue.name(),
                    job_id = %job.id,
                    error = %e,
                    "failed to requeue job, it is lost"
                ),
            }
        });

        Outcome::RetryScheduled
    }

    async fn count(&self, field: CounterField) {
        if let Err(e) = self
            .queue
            .counter()
            .increment(field, self.options.counter_ttl)
            .await
        {
            error!(queue = %self.queue.name(), counter = %field, error = %e, "failed to update counter");
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns false on
/// cancellation.
async fn sleep(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
