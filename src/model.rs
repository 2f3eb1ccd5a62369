//! Core data model.
//!
//! A job is a serialized user payload plus the metadata the worker needs to
//! retry it: identity, publish time and how many times it has been retried.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// The unit of work stored in a queue list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Assigned at publish time, never changes across retries.
    pub id: JobId,

    pub published_at: DateTime<Utc>,

    /// Number of times this job has been re-published after a failure.
    pub retry_count: u32,

    /// The serialized user value. Never interpreted by the engine.
    pub payload: Vec<u8>,
}

impl Job {
    /// Wrap a user value in a fresh job.
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let payload = serde_json::to_vec(value)
            .map_err(|e| Error::Encoding(format!("payload cannot be serialized: {e}")))?;
        Ok(Self {
            id: JobId::new(),
            published_at: Utc::now(),
            retry_count: 0,
            payload,
        })
    }

    /// Deserialize the payload into the caller's type.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| Error::Decoding(format!("job {} payload: {e}", self.id)))
    }

    /// Serialize the envelope for storage.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Encoding(format!("job envelope: {e}")))
    }

    /// Parse an envelope popped from the store.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Decoding(format!("job envelope: {e}")))
    }

    /// Seconds to wait before re-publishing, given the already-incremented
    /// retry count.
    pub fn backoff(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.retry_count))
    }
}

/// Newtype for job IDs.
///
/// UUIDv7 in hyphenated form, so IDs sort lexically by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// A lifecycle counter kept in the queue's count hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    Processing,
    Succeeded,
    Failed,
    Dropped,
}

impl CounterField {
    pub const ALL: [CounterField; 4] = [
        CounterField::Processing,
        CounterField::Succeeded,
        CounterField::Failed,
        CounterField::Dropped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CounterField::Processing => "processing",
            CounterField::Succeeded => "succeeded",
            CounterField::Failed => "failed",
            CounterField::Dropped => "dropped",
        }
    }
}

impl std::fmt::Display for CounterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a queue's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// False only when no counter has been recorded since the last reset.
    pub is_running: bool,
    pub processing: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub dropped: u64,
    /// `succeeded + dropped`: jobs that reached a terminal state.
    pub total: u64,
}

impl StatusSnapshot {
    pub fn get(&self, field: CounterField) -> u64 {
        match field {
            CounterField::Processing => self.processing,
            CounterField::Succeeded => self.succeeded,
            CounterField::Failed => self.failed,
            CounterField::Dropped => self.dropped,
        }
    }

    pub(crate) fn get_mut(&mut self, field: CounterField) -> &mut u64 {
        match field {
            CounterField::Processing => &mut self.processing,
            CounterField::Succeeded => &mut self.succeeded,
            CounterField::Failed => &mut self.failed,
            CounterField::Dropped => &mut self.dropped,
        }
    }
}

impl std::fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processing={} succeeded={} failed={} dropped={} total={}",
            self.processing, self.succeeded, self.failed, self.dropped, self.total
        )
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// Handler failed and the job will be re-published.
    RetryScheduled,
    /// Handler failed with retries exhausted.
    Dropped,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::RetryScheduled => "retry_scheduled",
            Outcome::Dropped => "dropped",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_survives_encode_decode() {
        let value = json!({"to": "user@example.com", "n": [1, 2, 3]});
        let mut job = Job::new(&value).unwrap();
        job.retry_count = 2;

        let decoded = Job::decode(&job.encode().unwrap()).unwrap();
        assert_eq!(decoded, job);
        assert_eq!(decoded.payload::<serde_json::Value>().unwrap(), value);
    }

    #[test]
    fn envelope_uses_camel_case_keys() {
        let job = Job::new("hello").unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&job.encode().unwrap()).unwrap();
        assert!(raw.get("publishedAt").is_some());
        assert_eq!(raw["retryCount"], 0);
        assert_eq!(raw["id"], job.id.as_str());
    }

    #[test]
    fn garbage_is_a_decoding_error() {
        let err = Job::decode(b"not a job").unwrap_err();
        assert!(matches!(err, Error::Decoding(_)), "got {err:?}");
    }

    #[test]
    fn payload_type_mismatch_is_a_decoding_error() {
        let job = Job::new(&json!({"a": 1})).unwrap();
        assert!(matches!(job.payload::<Vec<u32>>(), Err(Error::Decoding(_))));
    }

    #[test]
    fn ids_sort_by_creation() {
        let first = JobId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = JobId::new();
        assert!(first < second);
    }

    #[test]
    fn snapshot_fields_are_addressable_by_counter() {
        let mut snapshot = StatusSnapshot::default();
        for (n, field) in CounterField::ALL.into_iter().enumerate() {
            *snapshot.get_mut(field) = n as u64 + 1;
        }
        assert_eq!(snapshot.processing, 1);
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 3);
        assert_eq!(snapshot.dropped, 4);
        for field in CounterField::ALL {
            assert!(snapshot.get(field) > 0, "{field} not set");
        }
    }

    #[test]
    fn backoff_is_linear_in_retry_count() {
        let mut job = Job::new(&1).unwrap();
        job.retry_count = 3;
        assert_eq!(job.backoff(), std::time::Duration::from_secs(3));
    }
}
