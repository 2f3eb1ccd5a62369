//! Queue client: publish, fetch, requeue and drop against one named queue.

use std::sync::Arc;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::model::{Job, JobId, StatusSnapshot};
use crate::status::StatusCounter;
use crate::store::{Keys, Store};
use crate::telemetry::metrics;

/// Handle to one queue. Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct Queue {
    name: String,
    keys: Keys,
    store: Arc<dyn Store>,
    counter: StatusCounter,
}

impl Queue {
    pub fn new(name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        let name = name.into();
        Self {
            keys: Keys::new(&name),
            counter: StatusCounter::new(name.clone(), Arc::clone(&store)),
            name,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counter(&self) -> &StatusCounter {
        &self.counter
    }

    /// Publish a value to this queue. Returns the new job's ID.
    pub async fn publish<T: Serialize + ?Sized>(&self, value: &T) -> Result<JobId> {
        self.publish_to(&self.name, value).await
    }

    /// Publish a value to another queue on the same store.
    pub async fn publish_to<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<JobId> {
        let job = Job::new(value)?;
        let bytes = job.encode()?;
        self.store.push(&Keys::new(name).queue, bytes).await?;

        metrics::jobs_published().add(1, &[KeyValue::new("queue", name.to_string())]);
        debug!(queue = name, job_id = %job.id, "job published");
        Ok(job.id)
    }

    /// Pop the oldest job.
    ///
    /// The pop is destructive: if the bytes are not a valid envelope the
    /// [`Error::Decoding`] returned here is the only trace of them.
    pub async fn fetch(&self) -> Result<Job> {
        let popped = self.store.pop(&self.keys.queue).await?;
        self.record_operation(if popped.is_some() { "pop" } else { "pop_empty" });
        let bytes = popped.ok_or(Error::EmptyQueue)?;
        Job::decode(&bytes)
    }

    /// Put a job back on this queue unchanged. Callers bump `retry_count`
    /// before calling.
    pub async fn requeue(&self, job: &Job) -> Result<()> {
        self.store.push(&self.keys.queue, job.encode()?).await?;
        self.record_operation("requeue");
        Ok(())
    }

    /// Archive a job that exhausted its retries. Best effort: failures are
    /// logged and swallowed.
    pub async fn discard_to_dead_list(&self, job: &Job) {
        let result = match job.encode() {
            Ok(bytes) => self.store.push(&self.keys.dropped, bytes).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => self.record_operation("drop"),
            Err(e) => {
                error!(queue = %self.name, job_id = %job.id, error = %e, "failed to archive dropped job");
            }
        }
    }

    /// Take the oldest archived job off the dropped list.
    pub async fn pop_dropped(&self) -> Result<Option<Job>> {
        match self.store.pop(&self.keys.dropped).await? {
            Some(bytes) => Job::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Jobs waiting to be fetched.
    pub async fn pending(&self) -> Result<u64> {
        self.store.len(&self.keys.queue).await
    }

    /// Jobs held in the dropped list.
    pub async fn dropped_len(&self) -> Result<u64> {
        self.store.len(&self.keys.dropped).await
    }

    /// Current counters for this queue.
    pub async fn status(&self) -> Result<StatusSnapshot> {
        self.counter.snapshot().await
    }

    fn record_operation(&self, operation: &'static str) {
        metrics::store_operations().add(
            1,
            &[
                KeyValue::new("queue", self.name.clone()),
                KeyValue::new("operation", operation),
            ],
        );
    }
}
