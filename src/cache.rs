//! TTL-bounded response cache with access-frequency eviction.
//!
//! Keys are fingerprints of `(user_id, normalized query)` so the same words
//! with different casing or spacing hit the same entry, while two users never
//! share entries. Entries written by the specialist path carry a longer TTL
//! than fallback entries.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::types::ResponsePayload;

struct CacheEntry {
    payload: ResponsePayload,
    created_at: Instant,
    ttl: Duration,
    access_count: u64,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Process-wide response cache. Interior mutability via a std `Mutex`;
/// every operation is a short critical section with no await inside.
pub struct RequestCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
}

/// Cache statistics for the health report.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Hit percentage over all lookups, rounded to two decimals.
    pub hit_rate: f64,
    pub total_entries: usize,
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
}

impl RequestCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_size,
        }
    }

    /// Look up a cached payload. A stale entry is removed and counted as a
    /// plain miss.
    pub fn get(&self, key: &str) -> Option<ResponsePayload> {
        let mut inner = self.lock();

        match inner.entries.get_mut(key) {
            Some(entry) if entry.is_fresh() => {
                entry.access_count += 1;
                let payload = entry.payload.clone();
                inner.hits += 1;
                Some(payload)
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert a payload with the given TTL, evicting the least-accessed entry
    /// when at capacity.
    pub fn set(&self, key: String, payload: ResponsePayload, ttl: Duration) {
        let mut inner = self.lock();

        if inner.entries.len() >= self.max_size && !inner.entries.contains_key(&key) {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.access_count)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                inner.entries.remove(&victim);
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: Instant::now(),
                ttl,
                access_count: 0,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let total = inner.hits + inner.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            (inner.hits as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        CacheStats {
            hit_rate,
            total_entries: inner.entries.len(),
            total_requests: total,
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // A poisoned cache lock only means a panicking thread died mid-insert;
        // the map itself stays structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn force_expire(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.ttl = Duration::ZERO;
        }
    }
}

/// Fingerprint a `(user, query)` pair into a cache key.
///
/// The query is trimmed, lowercased and whitespace-collapsed first, so
/// `"  Apple   STOCK "` and `"apple stock"` map to the same key.
pub fn fingerprint(user_id: &str, query: &str) -> String {
    let normalized = query
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    normalized.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
