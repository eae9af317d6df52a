//! Time-bounded cache over a [`KeyValueStore`].
//!
//! Entries are stored as JSON `{timestamp, data}` envelopes. Expiry is lazy:
//! a stale or unreadable entry is deleted the next time it is read.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::store::KeyValueStore;
use weda_core::StoreError;

/// Default freshness window: 30 minutes.
pub const FRESHNESS_WINDOW_MS: i64 = 30 * 60 * 1000;

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Stored envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Write time in epoch milliseconds
    pub timestamp: i64,
    pub data: Value,
}

pub struct TimeBoundedCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl std::fmt::Debug for TimeBoundedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeBoundedCache")
            .field("ttl_ms", &self.ttl_ms)
            .finish_non_exhaustive()
    }
}

impl TimeBoundedCache {
    /// Cache with the wall clock and the default freshness window
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl_ms: FRESHNESS_WINDOW_MS,
        }
    }

    /// Shorten the freshness window. Values above [`FRESHNESS_WINDOW_MS`] are capped.
    pub fn with_ttl(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms.clamp(0, FRESHNESS_WINDOW_MS);
        self
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Fresh data stored under `key`, or `None`.
    ///
    /// Stale and malformed entries are removed. Store failures count as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Discarding malformed cache entry {}: {}", key, e);
                self.purge(key);
                return None;
            }
        };

        let age = self.clock.now_millis().saturating_sub(entry.timestamp);
        if age > self.ttl_ms {
            tracing::debug!("Cache entry {} expired ({} ms old)", key, age);
            self.purge(key);
            return None;
        }

        Some(entry.data)
    }

    /// Store `data` under `key` with the current time, replacing any entry
    pub fn set(&self, key: &str, data: Value) -> Result<(), StoreError> {
        let entry = CacheEntry {
            timestamp: self.clock.now_millis(),
            data,
        };
        let raw =
            serde_json::to_string(&entry).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.store.set(key, raw)
    }

    /// Remove `key`; no-op when absent
    pub fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.store.remove(key)
    }

    /// Typed [`get`](Self::get); data that no longer decodes as `T` is removed
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.get(key)?;
        match serde_json::from_value(data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding cache entry {} with unexpected shape: {}", key, e);
                self.purge(key);
                None
            }
        }
    }

    /// Typed [`set`](Self::set)
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let data = serde_json::to_value(value).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.set(key, data)
    }

    fn purge(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!("Failed to remove cache entry {}: {}", key, e);
        }
    }
}
