//! Job attempt span helpers.

use tracing::Span;

use crate::model::Job;

/// Start a span covering one attempt at a job.
///
/// `job.outcome` is declared empty and filled by [`record_outcome`].
pub fn start_attempt_span(queue: &str, job: &Job) -> Span {
    tracing::info_span!(
        "job.attempt",
        "job.queue" = queue,
        "job.id" = %job.id,
        "job.retry_count" = job.retry_count,
        "job.outcome" = tracing::field::Empty,
    )
}

/// Record how the attempt ended, on the span and as an event inside it.
pub fn record_outcome(span: &Span, outcome: &str, duration_ms: u64) {
    span.record("job.outcome", outcome);
    span.in_scope(|| {
        tracing::info!(outcome, duration_ms, "attempt finished");
    });
}
