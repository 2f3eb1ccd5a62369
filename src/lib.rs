//! # jobq
//!
//! A durable job queue on Redis lists.
//!
//! Producers publish serialized jobs with [`Queue::publish`]. A [`Worker`]
//! pops them with bounded concurrency, runs a [`Handler`], retries failures
//! with a linear backoff and drops jobs that run out of retries. Per-queue
//! counters are kept in the store and reported after the queue goes idle.
//!
//! Delivery is at-least-once: a fetched job is removed from the list, so a
//! process that dies mid-handler loses it.

pub mod config;
pub mod error;
pub mod model;
pub mod queue;
pub mod status;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use error::{Error, Result};
pub use model::{CounterField, Job, JobId, Outcome, StatusSnapshot};
pub use queue::Queue;
pub use status::StatusCounter;
pub use store::{MemoryStore, RedisStore, Store};
pub use worker::{CommandHandler, Handler, Worker, WorkerOptions, run_worker};
