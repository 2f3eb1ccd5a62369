//! Per-queue lifecycle counters and last-activity tracking.
//!
//! Counters live in `<queue>:count`, the activity marker in `<queue>:active`.
//! Every increment refreshes both in one atomic batch so a queue that goes
//! quiet expires on its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{CounterField, StatusSnapshot};
use crate::store::{Keys, Op, Store};

/// Counter bookkeeping for one queue.
#[derive(Clone)]
pub struct StatusCounter {
    name: String,
    keys: Keys,
    store: Arc<dyn Store>,
}

impl StatusCounter {
    pub fn new(name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        let name = name.into();
        Self {
            keys: Keys::new(&name),
            name,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bump `field` by one, refresh the hash expiry to `idle_ttl` and stamp
    /// the activity marker, all or nothing.
    pub async fn increment(&self, field: CounterField, idle_ttl: Duration) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.store
            .atomic(vec![
                Op::HashIncr {
                    key: self.keys.count.clone(),
                    field: field.as_str().to_string(),
                    by: 1,
                },
                Op::Expire {
                    key: self.keys.count.clone(),
                    ttl: idle_ttl,
                },
                Op::SetEx {
                    key: self.keys.active.clone(),
                    value: now,
                    ttl: idle_ttl,
                },
            ])
            .await
    }

    /// Read all counters. Missing fields count as zero; a field that is not
    /// a number is reported, not repaired.
    pub async fn snapshot(&self) -> Result<StatusSnapshot> {
        let fields = self.store.hash_get_all(&self.keys.count).await?;
        if fields.is_empty() {
            return Ok(StatusSnapshot::default());
        }

        let mut snapshot = StatusSnapshot {
            is_running: true,
            ..StatusSnapshot::default()
        };
        for field in CounterField::ALL {
            let Some(raw) = fields.get(field.as_str()) else {
                continue;
            };
            *snapshot.get_mut(field) = raw.trim().parse().map_err(|_| Error::CorruptCounter {
                field: field.as_str().to_string(),
                value: raw.clone(),
            })?;
        }
        snapshot.total = snapshot.succeeded + snapshot.dropped;
        Ok(snapshot)
    }

    /// When the queue last recorded a counter. A missing marker reads as now
    /// so a fresh queue is never reported idle.
    pub async fn last_active_at(&self) -> Result<DateTime<Utc>> {
        let Some(raw) = self.store.get(&self.keys.active).await? else {
            return Ok(Utc::now());
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Ok(at.with_timezone(&Utc)),
            Err(e) => {
                warn!(queue = %self.name, value = %raw, error = %e, "unreadable activity marker");
                Ok(Utc::now())
            }
        }
    }

    /// Clear counters and the activity marker. Idempotent.
    pub async fn reset(&self) -> Result<()> {
        self.store
            .delete(&[self.keys.count.as_str(), self.keys.active.as_str()])
            .await
    }
}
