//! Namespaced, time-bounded cache over a [`KeyValueStore`].

use super::store::KeyValueStore;
use crate::clock::Clock;
use crate::error::CacheError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The persisted form of one cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    /// Milliseconds since the Unix epoch.
    pub written_at: i64,
}

/// A cache whose entries expire `ttl` after they were written.
///
/// Failures of the underlying store are logged and behave like a miss on
/// read and a no-op on write.
pub struct TtlCache {
    store: Box<dyn KeyValueStore>,
    namespace: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(
        store: Box<dyn KeyValueStore>,
        namespace: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
            clock,
        }
    }

    /// Store `data` under `key`, replacing any previous entry.
    pub fn write<T: Serialize>(&self, key: &str, data: &T) {
        if let Err(e) = self.try_write(key, data) {
            warn!("Cache write for '{}' skipped: {}", key, e);
        }
    }

    /// Read the value under `key` if present, parseable and younger than the TTL.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cache read for '{}' treated as miss: {}", key, e);
                None
            }
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn try_write<T: Serialize>(&self, key: &str, data: &T) -> Result<(), CacheError> {
        let entry = CacheEntry {
            key: key.to_string(),
            data: serde_json::to_value(data)?,
            written_at: self.clock.now().timestamp_millis(),
        };
        let raw = serde_json::to_string(&entry)?;
        self.store.set(&self.namespaced(key), &raw)?;
        debug!("Cached '{}'", key);
        Ok(())
    }

    fn try_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(raw) = self.store.get(&self.namespaced(key))? else {
            debug!("Cache miss for '{}'", key);
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_str(&raw)?;
        let age_ms = self.clock.now().timestamp_millis() - entry.written_at;
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if age_ms >= ttl_ms {
            debug!("Cache entry for '{}' expired ({} ms old)", key, age_ms);
            return Ok(None);
        }

        let value = serde_json::from_value(entry.data)?;
        debug!("Cache hit for '{}' ({} ms old)", key, age_ms);
        Ok(Some(value))
    }
}
