//! Worker tuning knobs.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::StatusSnapshot;

/// Called from the control loop with the counters of a queue that has gone
/// idle, just before they are reset. Runs inline, so it must return quickly.
pub type Reporter = Arc<dyn Fn(&StatusSnapshot) + Send + Sync>;

/// Options for [`Worker`](super::Worker). All fields have defaults.
#[derive(Clone)]
pub struct WorkerOptions {
    /// Re-publish attempts before a failing job is dropped.
    pub max_retry: u32,
    /// Attempts allowed in flight at once.
    pub parallel: usize,
    /// Pause after finding the queue empty.
    pub interval: Duration,
    /// Inactivity window after which counters are reported and reset.
    pub idle: Duration,
    /// Pause after a store error or an undecodable envelope.
    pub recover: Duration,
    /// Expiry refreshed on the counter keys by every increment. Must exceed
    /// `idle` or counters vanish before they can be reported.
    pub counter_ttl: Duration,
    /// Keep jobs that exhausted their retries in `<queue>:dropped`.
    pub safe_drop: bool,
    pub reporter: Option<Reporter>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_retry: 3,
            parallel: 2,
            interval: Duration::from_secs(3),
            idle: Duration::from_secs(3 * 60),
            recover: Duration::from_secs(60),
            counter_ttl: Duration::from_secs(24 * 60 * 60),
            safe_drop: false,
            reporter: None,
        }
    }
}

impl std::fmt::Debug for WorkerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerOptions")
            .field("max_retry", &self.max_retry)
            .field("parallel", &self.parallel)
            .field("interval", &self.interval)
            .field("idle", &self.idle)
            .field("recover", &self.recover)
            .field("counter_ttl", &self.counter_ttl)
            .field("safe_drop", &self.safe_drop)
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

impl WorkerOptions {
    pub fn max_retry(mut self, n: u32) -> Self {
        self.max_retry = n;
        self
    }

    pub fn parallel(mut self, n: usize) -> Self {
        self.parallel = n;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn recover(mut self, recover: Duration) -> Self {
        self.recover = recover;
        self
    }

    pub fn counter_ttl(mut self, ttl: Duration) -> Self {
        self.counter_ttl = ttl;
        self
    }

    pub fn safe_drop(mut self, safe_drop: bool) -> Self {
        self.safe_drop = safe_drop;
        self
    }

    pub fn reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.parallel == 0 {
            return Err(Error::Config("parallel must be at least 1".to_string()));
        }
        let max_parallel = tokio::sync::Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        if self.parallel > max_parallel {
            return Err(Error::Config(format!(
                "parallel must not exceed {max_parallel}"
            )));
        }
        if self.counter_ttl <= self.idle {
            return Err(Error::Config(format!(
                "counter_ttl ({:?}) must be longer than idle ({:?})",
                self.counter_ttl, self.idle
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = WorkerOptions::default();
        assert_eq!(options.max_retry, 3);
        assert_eq!(options.parallel, 2);
        assert!(!options.safe_drop);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn zero_parallel_is_rejected() {
        let err = WorkerOptions::default().parallel(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn parallel_beyond_u32_is_rejected() {
        let options = WorkerOptions::default().parallel(u32::MAX as usize + 1);
        assert!(matches!(options.validate(), Err(Error::Config(_))));

        let options = WorkerOptions::default().parallel(u32::MAX as usize);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn counters_must_outlive_idle_window() {
        let options = WorkerOptions::default()
            .idle(Duration::from_secs(60))
            .counter_ttl(Duration::from_secs(30));
        assert!(options.validate().is_err());
    }

    #[test]
    fn debug_hides_reporter_body() {
        let options = WorkerOptions::default().reporter(|_| {});
        assert!(format!("{options:?}").contains("reporter: true"));
    }
}
