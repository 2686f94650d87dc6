//! Persisted collaborators for trust-on-first-use checksums and
//! signing-entity history.
//!
//! Default in-memory implementations back these traits with a plain
//! `Arc<Mutex<HashMap<..>>>`; they exist for tests and for callers that
//! don't need fingerprints to survive a process restart. Production
//! callers inject a file- or database-backed implementation instead.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::warn;

use crate::model::{Fingerprint, FingerprintKey, SigningEntity};

/// Persists the pinned checksum fingerprints [`crate::trust::ChecksumTofu`]
/// compares new downloads against.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Returns the pinned fingerprint for `key`, if one has been recorded.
    async fn get(&self, key: &FingerprintKey) -> Option<Fingerprint>;

    /// Records `fingerprint`, replacing any prior value for its key.
    async fn put(&self, fingerprint: Fingerprint);
}

/// The default [`FingerprintStore`]: an in-memory map, lost on process
/// exit.
#[derive(Debug, Default)]
pub struct InMemoryFingerprintStore {
    entries: Mutex<HashMap<FingerprintKey, Fingerprint>>,
}

#[async_trait]
impl FingerprintStore for InMemoryFingerprintStore {
    async fn get(&self, key: &FingerprintKey) -> Option<Fingerprint> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    async fn put(&self, fingerprint: Fingerprint) {
        let key: FingerprintKey =
            (fingerprint.package.clone(), fingerprint.version.clone(), fingerprint.kind.clone(), fingerprint.registry_url.clone());
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).insert(key, fingerprint);
    }
}

/// Persists the signing entity recognized for each `(package, version)`,
/// so [`crate::trust::SigningEntityStore`] can compare a newly observed
/// entity against both the prior value for the same release and the
/// package's broader history.
#[async_trait]
pub trait SigningEntityRecordStore: Send + Sync {
    /// Returns the signing entity previously recorded for
    /// `package`@`version` on `registry_url`, if any.
    async fn get(&self, package: &str, version: &str, registry_url: &str) -> Option<SigningEntity>;

    /// Records `entity` as the signing entity for `package`@`version` on
    /// `registry_url`, appending to that package's history.
    async fn put(&self, package: &str, version: &str, registry_url: &str, entity: SigningEntity);

    /// Returns every `(version, entity)` pair recorded for `package` on
    /// `registry_url`, in the order they were recorded.
    async fn history(&self, package: &str, registry_url: &str) -> Vec<(String, SigningEntity)>;

    /// Administratively overwrites the entity recorded for
    /// `package`@`version`, bypassing the history consistency checks a
    /// normal `put` is paired with at the call site. `origin` tags the
    /// record with who or what requested the override, for implementations
    /// that persist it alongside the entity.
    ///
    /// The default implementation just logs `origin` and delegates to
    /// [`Self::put`]; a store with an audit trail overrides this to persist
    /// the tag.
    async fn overwrite(&self, package: &str, version: &str, registry_url: &str, entity: SigningEntity, origin: &str) {
        warn!("administratively overwriting signing entity for {package}@{version} (origin: {origin})");
        self.put(package, version, registry_url, entity).await;
    }
}

/// The default [`SigningEntityRecordStore`]: an in-memory map, lost on
/// process exit.
#[derive(Debug, Default)]
pub struct InMemorySigningEntityRecordStore {
    entries: Mutex<HashMap<String, Vec<(String, SigningEntity)>>>,
}

fn package_registry_key(package: &str, registry_url: &str) -> String {
    format!("{registry_url}|{package}")
}

#[async_trait]
impl SigningEntityRecordStore for InMemorySigningEntityRecordStore {
    async fn get(&self, package: &str, version: &str, registry_url: &str) -> Option<SigningEntity> {
        let key = package_registry_key(package, registry_url);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&key)?.iter().rev().find(|(v, _)| v == version).map(|(_, entity)| entity.clone())
    }

    async fn put(&self, package: &str, version: &str, registry_url: &str, entity: SigningEntity) {
        let key = package_registry_key(package, registry_url);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let history = entries.entry(key).or_default();
        history.retain(|(v, _)| v != version);
        history.push((version.to_string(), entity));
    }

    async fn history(&self, package: &str, registry_url: &str) -> Vec<(String, SigningEntity)> {
        let key = package_registry_key(package, registry_url);
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(&key).cloned().unwrap_or_default()
    }
}
