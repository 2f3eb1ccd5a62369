//! Worker options from a TOML file.
//!
//! Every key is optional; anything left out keeps the
//! [`WorkerOptions::default`] value.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::worker::WorkerOptions;

/// Top-level TOML wrapper.
#[derive(Debug, Default, Deserialize)]
struct WorkerFile {
    #[serde(default)]
    worker: WorkerSettings,
}

/// The `[worker]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerSettings {
    pub max_retry: Option<u32>,
    pub parallel: Option<usize>,
    pub interval_ms: Option<u64>,
    pub idle_secs: Option<u64>,
    pub recover_secs: Option<u64>,
    pub counter_ttl_secs: Option<u64>,
    pub safe_drop: Option<bool>,
}

impl WorkerSettings {
    /// Load the `[worker]` table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read worker config {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("bad worker config {}: {e}", path.display())))
    }

    /// Parse the `[worker]` table from TOML text.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        let file: WorkerFile = toml::from_str(content)?;
        Ok(file.worker)
    }

    /// Overlay these settings on `base`.
    pub fn apply(&self, mut base: WorkerOptions) -> WorkerOptions {
        if let Some(n) = self.max_retry {
            base.max_retry = n;
        }
        if let Some(n) = self.parallel {
            base.parallel = n;
        }
        if let Some(ms) = self.interval_ms {
            base.interval = Duration::from_millis(ms);
        }
        if let Some(secs) = self.idle_secs {
            base.idle = Duration::from_secs(secs);
        }
        if let Some(secs) = self.recover_secs {
            base.recover = Duration::from_secs(secs);
        }
        if let Some(secs) = self.counter_ttl_secs {
            base.counter_ttl = Duration::from_secs(secs);
        }
        if let Some(safe_drop) = self.safe_drop {
            base.safe_drop = safe_drop;
        }
        base
    }
}
