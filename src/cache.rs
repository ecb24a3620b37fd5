//! # Parsed-data cache
//! Process-wide TTL map from cache key (one per date) to aggregated
//! [`ParsedData`]. Built once at startup and shared by reference.
//!
//! Expiry is absolute (no sliding refresh). An expired entry is dropped on the
//! lookup that notices it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::{counter, gauge};
use serde::Serialize;

use crate::aggregate::ParsedData;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Millisecond wall clock, injectable for tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Hand-driven clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Cache key for a date.
pub fn key_for_date(date: &str) -> String {
    format!("data-{date}")
}

#[derive(Debug, Clone)]
struct Entry {
    data: Arc<ParsedData>,
    stored_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Thread-safe TTL cache.
pub struct ParsedCache<C: Clock = SystemClock> {
    inner: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    clock: C,
}

impl ParsedCache<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> ParsedCache<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        gauge!("parsed_cache_ttl_secs").set(ttl.as_secs_f64());
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Fresh entry for `key`, or `None` (expired entries are removed).
    pub fn get(&self, key: &str) -> Option<Arc<ParsedData>> {
        let now = self.clock.now_ms();
        let ttl_ms = self.ttl.as_millis() as u64;
        let mut map = self.lock();

        let expired = match map.get(key) {
            None => {
                counter!("parsed_cache_misses_total").increment(1);
                return None;
            }
            Some(e) => now.saturating_sub(e.stored_at_ms) > ttl_ms,
        };
        if expired {
            map.remove(key);
            counter!("parsed_cache_misses_total").increment(1);
            tracing::debug!(target: "cache", key, "entry expired");
            return None;
        }
        counter!("parsed_cache_hits_total").increment(1);
        map.get(key).map(|e| Arc::clone(&e.data))
    }

    pub fn set(&self, key: impl Into<String>, data: ParsedData) -> Arc<ParsedData> {
        let data = Arc::new(data);
        let entry = Entry {
            data: Arc::clone(&data),
            stored_at_ms: self.clock.now_ms(),
        };
        self.lock().insert(key.into(), entry);
        data
    }

    /// Drop every entry; returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut map = self.lock();
        let n = map.len();
        map.clear();
        n
    }

    pub fn stats(&self) -> CacheStats {
        let map = self.lock();
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: map.len(),
            keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;

    fn sample(date: &str) -> ParsedData {
        aggregate(date, &[("forum.txt".into(), "[Blind] a (긍정)".into())])
    }

    #[test]
    fn entry_lives_exactly_ttl() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = ParsedCache::with_clock(Duration::from_secs(300), Arc::clone(&clock));
        cache.set("data-2025-10-16", sample("2025-10-16"));

        clock.advance(Duration::from_secs(300));
        assert!(cache.get("data-2025-10-16").is_some(), "boundary is inclusive");

        clock.advance(Duration::from_millis(1));
        assert!(cache.get("data-2025-10-16").is_none());
        assert_eq!(cache.stats().size, 0, "expired entry removed on lookup");
    }

    #[test]
    fn clear_reports_removed_count() {
        let cache = ParsedCache::with_clock(DEFAULT_CACHE_TTL, ManualClock::new(0));
        cache.set("a", sample("2025-10-15"));
        cache.set("b", sample("2025-10-16"));
        assert_eq!(cache.stats().keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().size, 0);
    }
}
