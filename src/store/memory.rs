//! In-memory store with Redis-like list, hash and expiry semantics.
//!
//! Used by the test suite and for running a worker without a server. An
//! offline switch makes every call fail with a backend error so outage
//! handling can be exercised.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Op, Store};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    hashes: HashMap<String, HashMap<String, i64>>,
    /// Raw hash values written by [`MemoryStore::set_hash_field`]; lets tests
    /// plant non-numeric counters.
    raw_fields: HashMap<String, HashMap<String, String>>,
    scalars: HashMap<String, String>,
    expires_at: HashMap<String, Instant>,
}

impl Inner {
    /// Drop a key whose deadline has passed.
    fn evict_if_expired(&mut self, key: &str) {
        let expired = self
            .expires_at
            .get(key)
            .is_some_and(|deadline| *deadline <= Instant::now());
        if expired {
            self.remove(key);
        }
    }

    fn remove(&mut self, key: &str) {
        self.lists.remove(key);
        self.hashes.remove(key);
        self.raw_fields.remove(key);
        self.scalars.remove(key);
        self.expires_at.remove(key);
    }

    fn exists(&self, key: &str) -> bool {
        self.lists.contains_key(key)
            || self.hashes.contains_key(key)
            || self.raw_fields.contains_key(key)
            || self.scalars.contains_key(key)
    }

    /// Reject a batch that would fail part way. Only an increment of a
    /// non-integer field can fail.
    fn check(&mut self, ops: &[Op]) -> Result<()> {
        for op in ops {
            if let Op::HashIncr { key, field, .. } = op {
                self.evict_if_expired(key);
                if let Some(raw) = self.raw_fields.get(key).and_then(|f| f.get(field)) {
                    return Err(Error::Backend(format!(
                        "hash value {raw:?} at {key}.{field} is not an integer"
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: Op) {
        match op {
            Op::HashIncr { key, field, by } => {
                self.evict_if_expired(&key);
                *self
                    .hashes
                    .entry(key)
                    .or_default()
                    .entry(field)
                    .or_insert(0) += by;
            }
            Op::Expire { key, ttl } => {
                self.evict_if_expired(&key);
                if self.exists(&key) {
                    self.expires_at.insert(key, Instant::now() + ttl);
                }
            }
            Op::SetEx { key, value, ttl } => {
                self.remove(&key);
                self.expires_at.insert(key.clone(), Instant::now() + ttl);
                self.scalars.insert(key, value);
            }
        }
    }
}

/// Shared in-process store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, every operation fails with [`Error::Backend`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Write a hash field verbatim, bypassing integer semantics.
    pub async fn set_hash_field(&self, key: &str, field: &str, value: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .raw_fields
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    /// Copy of a list, head first.
    pub async fn list(&self, key: &str) -> Vec<Vec<u8>> {
        let mut inner = self.inner.lock().await;
        inner.evict_if_expired(key);
        inner
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::Backend("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.evict_if_expired(key);
        inner
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value);
        Ok(())
    }

    async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.evict_if_expired(key);
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(None);
        };
        let value = list.pop_back();
        if list.is_empty() {
            inner.remove(key);
        }
        Ok(value)
    }

    async fn len(&self, key: &str) -> Result<u64> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.evict_if_expired(key);
        Ok(inner.lists.get(key).map_or(0, |list| list.len() as u64))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.evict_if_expired(key);
        Ok(inner.scalars.get(key).cloned())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.evict_if_expired(key);
        let mut fields: HashMap<String, String> = inner
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.to_string())).collect())
            .unwrap_or_default();
        if let Some(raw) = inner.raw_fields.get(key) {
            fields.extend(raw.iter().map(|(f, v)| (f.clone(), v.clone())));
        }
        Ok(fields)
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        for key in keys {
            inner.remove(key);
        }
        Ok(())
    }

    async fn atomic(&self, ops: Vec<Op>) -> Result<()> {
        self.check_online()?;
        let mut inner = self.inner.lock().await;
        inner.check(&ops)?;
        for op in ops {
            inner.apply(op);
        }
        Ok(())
    }
}
