//! Metric instrument factories for jobq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("jobq")
}

/// Counter: jobs published.
/// Labels: `queue`.
pub fn jobs_published() -> Counter<u64> {
    meter()
        .u64_counter("jobq.jobs.published")
        .with_description("Number of jobs published")
        .build()
}

/// Counter: attempt outcomes.
/// Labels: `queue`, `outcome` ("succeeded" | "retry_scheduled" | "dropped").
pub fn job_outcomes() -> Counter<u64> {
    meter()
        .u64_counter("jobq.jobs.outcomes")
        .with_description("Number of job attempts by outcome")
        .build()
}

/// Counter: queue-level store operations (pop, pop_empty, requeue, drop).
/// Labels: `queue`, `operation`.
pub fn store_operations() -> Counter<u64> {
    meter()
        .u64_counter("jobq.store.operations")
        .with_description("Number of queue store operations")
        .build()
}

/// Histogram: handler duration in milliseconds.
/// Labels: `queue`, `outcome`.
pub fn job_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("jobq.job.duration_ms")
        .with_description("Handler duration in milliseconds")
        .with_unit("ms")
        .build()
}
