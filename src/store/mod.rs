//! Backing-store abstraction and the per-queue keyspace.
//!
//! The queue only needs a handful of list, hash and scalar primitives plus
//! an all-or-nothing batch. Redis provides them natively; the in-memory
//! store mirrors the same semantics for tests.

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// One command inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// `HINCRBY key field by`
    HashIncr {
        key: String,
        field: String,
        by: i64,
    },
    /// `EXPIRE key ttl`
    Expire { key: String, ttl: Duration },
    /// `SET key value EX ttl`
    SetEx {
        key: String,
        value: String,
        ttl: Duration,
    },
}

/// Store primitives the queue is built on. Implementations must be safe for
/// concurrent use; the worker shares one handle across all attempts.
#[async_trait]
pub trait Store: Send + Sync {
    /// Push to the head of a list.
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Pop from the tail of a list. `None` when the list is empty.
    async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Length of a list; zero when absent.
    async fn len(&self, key: &str) -> Result<u64>;

    /// Read a scalar.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// All fields of a hash; empty when the hash does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Delete keys. Missing keys are ignored.
    async fn delete(&self, keys: &[&str]) -> Result<()>;

    /// Run every op or none of them.
    async fn atomic(&self, ops: Vec<Op>) -> Result<()>;
}

/// Key names for one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    pub queue: String,
    pub dropped: String,
    pub count: String,
    pub active: String,
}

impl Keys {
    pub fn new(name: &str) -> Self {
        Self {
            queue: format!("{name}:queue"),
            dropped: format!("{name}:dropped"),
            count: format!("{name}:count"),
            active: format!("{name}:active"),
        }
    }
}
