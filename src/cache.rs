//! TTL + LRU cache of completed analysis results
//!
//! Entries are keyed by a SHA-256 fingerprint of the canonical request and
//! expire `ttl` after insertion. Capacity overflow evicts the least recently
//! accessed entry.

use crate::clock::Clock;
use crate::metrics;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TTL_SECS: u64 = 600;
pub const DEFAULT_CAPACITY: usize = 50;

/// Hex SHA-256 of the canonical JSON form of `params`.
///
/// Object keys are emitted in sorted order, so two values that serialize to
/// the same fields produce the same fingerprint regardless of field order.
pub fn fingerprint<T: Serialize>(params: &T) -> Result<String, serde_json::Error> {
    // serde_json::Value maps are ordered by key
    let canonical = serde_json::to_string(&serde_json::to_value(params)?)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    created_at_ms: i64,
    payload: V,
}

/// Shared result cache.
///
/// All operations take one internal lock; handlers share the cache through
/// an `Arc`.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entries are returned and promoted to most recently used;
    /// expired entries are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ts_millis();
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let mut entries = self.entries.lock();

        let fresh = match entries.get(key) {
            Some(entry) if now - entry.created_at_ms < ttl_ms => Some(entry.payload.clone()),
            Some(_) => None,
            None => {
                metrics::record_cache_lookup("miss");
                return None;
            }
        };

        match fresh {
            Some(payload) => {
                debug!(key = %key, "Cache hit");
                metrics::record_cache_lookup("hit");
                Some(payload)
            }
            None => {
                entries.pop(key);
                debug!(key = %key, "Cache entry expired");
                metrics::record_cache_lookup("expired");
                None
            }
        }
    }

    /// Insert or overwrite, stamping the entry with the current clock time.
    pub fn put(&self, key: String, payload: V) {
        let entry = CacheEntry {
            created_at_ms: self.clock.now_ts_millis(),
            payload,
        };
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(key = %evicted, "Evicted least recently used entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
