pub mod perf;

use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{self, SharedClock};

struct Entry {
    value: Value,
    expires_at: u64,
    tags: Vec<String>,
}

impl Entry {
    fn expired(&self, now: u64) -> bool {
        now > self.expires_at
    }
}

/// Process-local TTL cache whose entries can be dropped in bulk by tag.
///
/// Values are kept as JSON so one instance can hold every response type.
/// Entries are advisory: a miss always falls through to the store.
pub struct TaggedCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: SharedClock,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// TTL and tags applied by [`TaggedCache::memoize`].
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub tags: Vec<&'static str>,
}

impl CachePolicy {
    pub fn new(ttl: Duration, tags: &[&'static str]) -> Self {
        Self {
            ttl,
            tags: tags.to_vec(),
        }
    }
}

impl TaggedCache {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, tags: &[&str]) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Cache serialization failed for {key}: {e}");
                return;
            }
        };

        let expires_at = clock::deadline(self.clock.now_ms(), ttl);
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    /// Returns `None` on a miss or an expired entry. Expired entries are
    /// removed on read.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();

        let entry = entries.get(key)?;
        if entry.expired(now) {
            entries.remove(key);
            return None;
        }

        match serde_json::from_value(entry.value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Cache entry {key} has an unexpected shape: {e}");
                entries.remove(key);
                None
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every entry carrying `tag`. Returns how many were removed.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        before - entries.len()
    }

    pub fn invalidate_tags(&self, tags: &[&str]) {
        for tag in tags {
            let removed = self.invalidate_by_tag(tag);
            tracing::debug!("Invalidated {removed} cache entries tagged {tag}");
        }
    }

    /// Remove expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: entries.len(),
            keys,
        }
    }

    /// Return the cached value for `key`, or run `loader` and cache its
    /// `Ok` result under `policy`. Errors are never cached.
    pub async fn memoize<T, E, F, Fut>(
        &self,
        key: &str,
        policy: &CachePolicy,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            return Ok(hit);
        }

        let value = loader().await?;
        self.set(key, &value, policy.ttl, &policy.tags);
        Ok(value)
    }
}

/// Cache key generators
pub mod keys {
    use std::collections::BTreeMap;

    /// Key for a single gig
    pub fn gig(id: &str) -> String {
        format!("gig:{id}")
    }

    /// Key for a gig listing; filters are sorted by name so equal filter
    /// sets share an entry.
    pub fn gigs<K: Ord + std::fmt::Display, V: std::fmt::Display>(
        filters: impl IntoIterator<Item = (K, V)>,
    ) -> String {
        let sorted: BTreeMap<K, V> = filters.into_iter().collect();
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join("|");
        format!("gigs:{joined}")
    }

    pub fn profile(id: &str) -> String {
        format!("profile:{id}")
    }

    pub fn categories() -> String {
        "categories:all".to_string()
    }

    pub fn category(id: &str) -> String {
        format!("category:{id}")
    }

    pub fn applications(user_id: &str, role: &str) -> String {
        format!("applications:{user_id}:{role}")
    }

    pub fn stats(kind: &str) -> String {
        format!("stats:{kind}")
    }
}

/// Tags used for bulk invalidation.
pub mod tags {
    pub const GIGS: &str = "gigs";
    pub const CATEGORIES: &str = "categories";
    pub const PROFILES: &str = "profiles";
    pub const APPLICATIONS: &str = "applications";
    pub const STATS: &str = "stats";
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub gig_list_ttl: Duration,
    pub gig_ttl: Duration,
    pub category_ttl: Duration,
    pub profile_ttl: Duration,
    pub applications_ttl: Duration,
    pub stats_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            gig_list_ttl: Duration::from_secs(120),   // 2 minutes
            gig_ttl: Duration::from_secs(300),        // 5 minutes
            category_ttl: Duration::from_secs(3600),  // 1 hour
            profile_ttl: Duration::from_secs(600),    // 10 minutes
            applications_ttl: Duration::from_secs(60), // 1 minute
            stats_ttl: Duration::from_secs(300),      // 5 minutes
            sweep_interval: Duration::from_secs(600), // 10 minutes
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            gig_list_ttl: parse_duration_secs("CACHE_TTL_GIGS", 120),
            gig_ttl: parse_duration_secs("CACHE_TTL_GIG_DETAIL", 300),
            category_ttl: parse_duration_secs("CACHE_TTL_CATEGORIES", 3600),
            profile_ttl: parse_duration_secs("CACHE_TTL_PROFILES", 600),
            applications_ttl: parse_duration_secs("CACHE_TTL_APPLICATIONS", 60),
            stats_ttl: parse_duration_secs("CACHE_TTL_STATS", 300),
            sweep_interval: parse_duration_secs("CACHE_SWEEP_INTERVAL_SECS", 600),
        }
    }

    pub fn gig_list(&self) -> CachePolicy {
        CachePolicy::new(self.gig_list_ttl, &[tags::GIGS])
    }

    pub fn gig(&self) -> CachePolicy {
        CachePolicy::new(self.gig_ttl, &[tags::GIGS])
    }

    pub fn categories(&self) -> CachePolicy {
        CachePolicy::new(self.category_ttl, &[tags::CATEGORIES])
    }

    pub fn profile(&self) -> CachePolicy {
        CachePolicy::new(self.profile_ttl, &[tags::PROFILES])
    }

    pub fn applications(&self) -> CachePolicy {
        CachePolicy::new(self.applications_ttl, &[tags::APPLICATIONS])
    }

    pub fn stats(&self) -> CachePolicy {
        CachePolicy::new(self.stats_ttl, &[tags::STATS])
    }
}

pub(crate) fn parse_duration_secs(env_var: &str, default: u64) -> Duration {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

/// Wrapper type for Actix-web app data
pub type CacheData = Arc<TaggedCache>;
