//! Memoization of analysis results.
//!
//! Results are keyed by a BLAKE3 digest of the analyzed text and the string
//! form of its context. The cache is bounded (least-recently-used eviction)
//! and can expire entries after a maximum age measured on an injectable
//! [`Clock`].
//!
//! An entry is inserted in one locked step holding a fully built result, so an
//! analysis cancelled mid-flight leaves either no entry or a complete one.
//! Concurrent misses on the same key may both compute; the last write wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::pipeline::AnalysisResult;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Time source for entry expiry.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Time elapsed since a fixed, clock-specific origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Cache sizing and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries. `0` disables caching.
    pub capacity: usize,
    /// Entries older than this are treated as absent. `None` never expires.
    pub max_age_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_age_secs: None,
        }
    }
}

/// Cache key for an analysis of `text` under `context`.
pub fn cache_key(text: &str, context: Option<&serde_json::Value>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(text.as_bytes());
    hasher.update(&[0x1f]);
    if let Some(ctx) = context {
        hasher.update(ctx.to_string().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug)]
struct Entry {
    result: Arc<AnalysisResult>,
    inserted_at: Duration,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    tick: u64,
}

/// Bounded LRU cache of analysis results.
#[derive(Debug)]
pub struct AnalysisCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl AnalysisCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn is_expired(&self, entry: &Entry, now: Duration) -> bool {
        self.config
            .max_age_secs
            .is_some_and(|max| now.saturating_sub(entry.inserted_at) > Duration::from_secs(max))
    }

    /// Look up `key`, refreshing its recency. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<Arc<AnalysisResult>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("analysis cache lock poisoned");
        inner.tick += 1;
        let tick = inner.tick;

        let entry = inner.entries.get_mut(key)?;
        if !self.is_expired(entry, now) {
            entry.last_used = tick;
            return Some(Arc::clone(&entry.result));
        }
        inner.entries.remove(key);
        tracing::debug!(key, "cache entry expired");
        None
    }

    /// Store a result, evicting least-recently-used entries beyond capacity.
    pub fn insert(&self, key: String, result: Arc<AnalysisResult>) {
        if self.config.capacity == 0 {
            return;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("analysis cache lock poisoned");
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.insert(
            key,
            Entry {
                result,
                inserted_at: now,
                last_used: tick,
            },
        );

        while inner.entries.len() > self.config.capacity {
            let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            inner.entries.remove(&oldest);
            tracing::debug!(key = %oldest, "cache entry evicted");
        }
    }

    /// Every live (unexpired) result.
    pub fn snapshot(&self) -> Vec<Arc<AnalysisResult>> {
        let now = self.clock.now();
        let inner = self.inner.lock().expect("analysis cache lock poisoned");
        inner
            .entries
            .values()
            .filter(|e| !self.is_expired(e, now))
            .map(|e| Arc::clone(&e.result))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("analysis cache lock poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("analysis cache lock poisoned")
            .entries
            .clear();
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
