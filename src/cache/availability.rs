//! The Availability Gate: a TTL-cached probe result per registry that lets
//! the orchestrator short-circuit requests to a registry already known to
//! be unavailable, instead of letting every in-flight operation rediscover
//! the outage on its own.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::cache::entry::CacheEntry;
use crate::model::AvailabilityStatus;

/// A point-in-time snapshot of a cache's hit/miss/entry counters, exposed
/// via [`crate::client::RegistryClient::cache_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently stored.
    pub entries: usize,
    /// Number of lookups that found a valid, unexpired entry.
    pub hits: u64,
    /// Number of lookups that found no entry, or an expired one.
    pub misses: u64,
}

struct Counters {
    hits: u64,
    misses: u64,
}

/// Caches the outcome of probing a registry's `/availability` endpoint.
pub struct AvailabilityGate {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<AvailabilityStatus>>>,
    counters: Mutex<Counters>,
}

impl AvailabilityGate {
    /// Builds a gate that caches probe results for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()), counters: Mutex::new(Counters { hits: 0, misses: 0 }) }
    }

    /// Returns the cached status for `registry_url`, if a still-valid
    /// entry exists.
    #[must_use]
    pub fn cached_status(&self, registry_url: &str) -> Option<AvailabilityStatus> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(registry_url).filter(|e| e.is_valid(self.ttl)) {
            Some(entry) => {
                counters.hits += 1;
                debug!("availability gate hit for {registry_url}");
                Some(entry.get())
            }
            None => {
                counters.misses += 1;
                None
            }
        }
    }

    /// Records a freshly observed status for `registry_url`.
    pub fn record(&self, registry_url: &str, status: AvailabilityStatus) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(registry_url.to_string(), CacheEntry::new(status));
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.hits = 0;
        counters.misses = 0;
    }

    /// A snapshot of this gate's hit/miss/entry counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats { entries: entries.len(), hits: counters.hits, misses: counters.misses }
    }
}
