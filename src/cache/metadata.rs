//! The Metadata Cache: TTL-cached package and per-version metadata, keyed
//! by registry URL and package identity so the same package resolved
//! against two different registries never collides.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::cache::availability::CacheStats;
use crate::cache::entry::CacheEntry;
use crate::model::{PackageMetadata, PackageVersionMetadata};

fn package_key(registry_url: &str, scope: &str, name: &str) -> String {
    format!("{registry_url}|{scope}|{name}")
}

fn version_key(registry_url: &str, scope: &str, name: &str, version: &str) -> String {
    format!("{registry_url}|{scope}|{name}|{version}")
}

struct Counters {
    hits: u64,
    misses: u64,
}

/// Caches both `get_package_metadata` and `get_version_metadata` results.
pub struct MetadataCache {
    ttl: Duration,
    packages: Mutex<HashMap<String, CacheEntry<PackageMetadata>>>,
    versions: Mutex<HashMap<String, CacheEntry<PackageVersionMetadata>>>,
    counters: Mutex<Counters>,
}

impl MetadataCache {
    /// Builds a cache that serves entries for up to `ttl` after they were
    /// stored.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            packages: Mutex::new(HashMap::new()),
            versions: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters { hits: 0, misses: 0 }),
        }
    }

    /// Looks up cached package metadata for `(registry_url, scope, name)`.
    #[must_use]
    pub fn get_package(&self, registry_url: &str, scope: &str, name: &str) -> Option<PackageMetadata> {
        let key = package_key(registry_url, scope, name);
        let packages = self.packages.lock().unwrap_or_else(|e| e.into_inner());
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        match packages.get(&key).filter(|e| e.is_valid(self.ttl)) {
            Some(entry) => {
                counters.hits += 1;
                debug!("metadata cache hit for package {key}");
                Some(entry.get())
            }
            None => {
                counters.misses += 1;
                None
            }
        }
    }

    /// Stores `metadata` for `(registry_url, scope, name)`.
    pub fn put_package(&self, registry_url: &str, scope: &str, name: &str, metadata: PackageMetadata) {
        let key = package_key(registry_url, scope, name);
        self.packages.lock().unwrap_or_else(|e| e.into_inner()).insert(key, CacheEntry::new(metadata));
    }

    /// Looks up cached version metadata for
    /// `(registry_url, scope, name, version)`.
    #[must_use]
    pub fn get_version(
        &self,
        registry_url: &str,
        scope: &str,
        name: &str,
        version: &str,
    ) -> Option<PackageVersionMetadata> {
        let key = version_key(registry_url, scope, name, version);
        let versions = self.versions.lock().unwrap_or_else(|e| e.into_inner());
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        match versions.get(&key).filter(|e| e.is_valid(self.ttl)) {
            Some(entry) => {
                counters.hits += 1;
                debug!("metadata cache hit for version {key}");
                Some(entry.get())
            }
            None => {
                counters.misses += 1;
                None
            }
        }
    }

    /// Stores `metadata` for `(registry_url, scope, name, version)`.
    pub fn put_version(
        &self,
        registry_url: &str,
        scope: &str,
        name: &str,
        version: &str,
        metadata: PackageVersionMetadata,
    ) {
        let key = version_key(registry_url, scope, name, version);
        self.versions.lock().unwrap_or_else(|e| e.into_inner()).insert(key, CacheEntry::new(metadata));
    }

    /// Drops every cached entry in both maps.
    pub fn clear(&self) {
        self.packages.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.versions.lock().unwrap_or_else(|e| e.into_inner()).clear();
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.hits = 0;
        counters.misses = 0;
    }

    /// A combined snapshot of both maps' hit/miss/entry counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let packages = self.packages.lock().unwrap_or_else(|e| e.into_inner());
        let versions = self.versions.lock().unwrap_or_else(|e| e.into_inner());
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats { entries: packages.len() + versions.len(), hits: counters.hits, misses: counters.misses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> PackageMetadata {
        PackageMetadata { registry: "https://example.com".into(), versions: vec![], alternate_locations: vec![], next_page: None }
    }

    #[test]
    fn round_trips_package_metadata() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        assert!(cache.get_package("https://example.com", "mona", "LinkedList").is_none());
        cache.put_package("https://example.com", "mona", "LinkedList", sample_package());
        assert!(cache.get_package("https://example.com", "mona", "LinkedList").is_some());
    }

    #[test]
    fn distinguishes_registries() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        cache.put_package("https://a.example.com", "mona", "LinkedList", sample_package());
        assert!(cache.get_package("https://b.example.com", "mona", "LinkedList").is_none());
    }

    #[test]
    fn expired_entries_are_not_served() {
        let cache = MetadataCache::new(Duration::from_millis(1));
        cache.put_package("https://example.com", "mona", "LinkedList", sample_package());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_package("https://example.com", "mona", "LinkedList").is_none());
    }

    #[test]
    fn clear_drops_both_maps() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        cache.put_package("https://example.com", "mona", "LinkedList", sample_package());
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
