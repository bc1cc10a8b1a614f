//! AI response cache with TTL and capacity-based eviction
//!
//! Constructed and injected explicitly so services can own independent
//! instances and tests stay isolated. Expired entries are treated as
//! absent on read, so the periodic sweep is housekeeping only.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

/// Recognized TTL tiers for cached AI results
pub struct CacheTtl;

impl CacheTtl {
    pub const SHORT: Duration = Duration::from_secs(5 * 60);
    pub const MEDIUM: Duration = Duration::from_secs(30 * 60);
    pub const LONG: Duration = Duration::from_secs(60 * 60);
    pub const VERY_LONG: Duration = Duration::from_secs(24 * 60 * 60);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: serde_json::Value,
    expires_at: DateTime<Utc>,
    hits: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_hits: u64,
    pub total_misses: u64,
}

/// In-memory TTL cache keyed by call signature
pub struct AiCache {
    state: RwLock<CacheState>,
    max_entries: usize,
    default_ttl: Duration,
}

impl AiCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries: config.max_entries,
            default_ttl: Duration::from_secs(config.default_ttl_secs),
        }
    }

    /// Cache key from namespace and ordered argument list
    ///
    /// Collisions are an accepted extremely-low-probability risk.
    fn generate_key<A: Serialize>(namespace: &str, args: &A) -> String {
        let encoded = serde_json::to_string(args).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("{}:{}", namespace, &digest[..16])
    }

    /// Get a cached value, treating expired entries as absent
    pub fn get<T: DeserializeOwned, A: Serialize>(&self, namespace: &str, args: &A) -> Option<T> {
        let key = Self::generate_key(namespace, args);
        let mut state = self.state.write();

        let expired = match state.entries.get(&key) {
            None => {
                state.misses += 1;
                return None;
            }
            Some(entry) => Utc::now() > entry.expires_at,
        };

        if expired {
            state.entries.remove(&key);
            state.misses += 1;
            return None;
        }

        let entry = state.entries.get_mut(&key).expect("entry present");
        entry.hits += 1;
        let data = entry.data.clone();
        state.hits += 1;

        match serde_json::from_value(data) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Cache entry for {} failed to decode: {}", namespace, e);
                None
            }
        }
    }

    /// Store a value under the namespace + args key
    pub fn set<T: Serialize, A: Serialize>(
        &self,
        namespace: &str,
        args: &A,
        value: &T,
        ttl: Option<Duration>,
    ) {
        let data = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!("Refusing to cache unencodable value: {}", e);
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at =
            Utc::now() + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(0));

        let mut state = self.state.write();
        if state.entries.len() >= self.max_entries {
            Self::evict(&mut state, self.max_entries);
        }

        let key = Self::generate_key(namespace, args);
        state.entries.insert(
            key,
            CacheEntry {
                data,
                expires_at,
                hits: 0,
            },
        );
    }

    /// Evict 10% of entries, least-hit then soonest-to-expire first
    fn evict(state: &mut CacheState, max_entries: usize) {
        let mut ranked: Vec<(String, u64, DateTime<Utc>)> = state
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.hits, e.expires_at))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        let to_remove = max_entries.div_ceil(10);
        for (key, _, _) in ranked.into_iter().take(to_remove) {
            state.entries.remove(&key);
        }
    }

    /// Drop every entry under a namespace; returns the removed count
    pub fn invalidate(&self, namespace: &str) -> usize {
        let prefix = format!("{}:", namespace);
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|k, _| !k.starts_with(&prefix));
        before - state.entries.len()
    }

    /// Clear the cache and reset statistics
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    /// Remove expired entries; returns the removed count
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|_, e| e.expires_at >= now);
        before - state.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            total_entries: state.entries.len(),
            total_hits: state.hits,
            total_misses: state.misses,
        }
    }
}

impl Default for AiCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

/// Handle for the periodic cache sweep
///
/// Owned by the process lifecycle: spawn on init, `shutdown` on exit.
/// The task is aborted when the handle drops, so no free-running timer
/// outlives its owner.
pub struct CacheMaintenance {
    handle: tokio::task::JoinHandle<()>,
}

impl CacheMaintenance {
    /// Spawn a sweep over `cache` every `interval`
    pub fn spawn(cache: Arc<AiCache>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.cleanup();
                if removed > 0 {
                    tracing::debug!("Cache sweep removed {} expired entries", removed);
                }
            }
        });
        Self { handle }
    }

    /// Stop the sweep task
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for CacheMaintenance {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(max_entries: usize) -> AiCache {
        AiCache::new(&CacheConfig {
            max_entries,
            default_ttl_secs: 3600,
        })
    }

    #[test]
    fn get_returns_stored_value() {
        let cache = cache_with(10);
        cache.set("ns", &["arg1"], &42u32, None);
        assert_eq!(cache.get::<u32, _>("ns", &["arg1"]), Some(42));
        assert_eq!(cache.get::<u32, _>("ns", &["arg2"]), None);
        assert_eq!(cache.get::<u32, _>("other", &["arg1"]), None);
    }

    #[test]
    fn expired_entries_are_absent() {
        let cache = cache_with(10);
        cache.set("ns", &["k"], &"v", Some(Duration::from_secs(0)));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get::<String, _>("ns", &["k"]), None);
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_misses, 1);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = cache_with(10);
        cache.set("ns", &["k"], &1u8, None);
        cache.get::<u8, _>("ns", &["k"]);
        cache.get::<u8, _>("ns", &["k"]);
        cache.get::<u8, _>("ns", &["missing"]);

        let stats = cache.stats();
        assert_eq!(stats.total_hits, 2);
        assert_eq!(stats.total_misses, 1);
    }

    #[test]
    fn eviction_prefers_least_hit_entries() {
        let cache = cache_with(10);
        for i in 0..10 {
            cache.set("ns", &[i], &i, None);
        }
        // Touch everything except entry 3
        for i in 0..10 {
            if i != 3 {
                cache.get::<i32, _>("ns", &[i]);
            }
        }
        // Insert at capacity: eviction removes the least-hit entry
        cache.set("ns", &[99], &99, None);
        assert_eq!(cache.get::<i32, _>("ns", &[3]), None);
        assert_eq!(cache.get::<i32, _>("ns", &[99]), Some(99));
    }

    #[test]
    fn invalidate_removes_namespace_only() {
        let cache = cache_with(10);
        cache.set("a", &["x"], &1u8, None);
        cache.set("a", &["y"], &2u8, None);
        cache.set("b", &["x"], &3u8, None);

        assert_eq!(cache.invalidate("a"), 2);
        assert_eq!(cache.get::<u8, _>("a", &["x"]), None);
        assert_eq!(cache.get::<u8, _>("b", &["x"]), Some(3));
    }

    #[test]
    fn cleanup_removes_only_expired() {
        let cache = cache_with(10);
        cache.set("ns", &["stale"], &1u8, Some(Duration::from_secs(0)));
        cache.set("ns", &["fresh"], &2u8, Some(Duration::from_secs(600)));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.get::<u8, _>("ns", &["fresh"]), Some(2));
    }

    #[tokio::test]
    async fn maintenance_task_sweeps_and_stops() {
        let cache = Arc::new(cache_with(10));
        cache.set("ns", &["k"], &1u8, Some(Duration::from_secs(0)));

        let task = CacheMaintenance::spawn(Arc::clone(&cache), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.stats().total_entries, 0);
        task.shutdown();
    }
}
