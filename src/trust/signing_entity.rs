//! Signing-entity change detection across a package's version history.
//!
//! Two independent checks run on every newly observed signing entity:
//! whether it differs from what was previously recorded for this exact
//! release (re-signing with a different identity), and whether it differs
//! from the most recently recorded entity for the package as a whole
//! (the package's signer changing hands). Both are TOFU-shaped: the first
//! entity seen for a key is trusted and recorded without complaint.

use std::sync::Arc;

use log::warn;
use semver::Version;

use crate::error::{RegistryClientError, RegistryResult};
use crate::identity::PackageIdentity;
use crate::model::{PolicyMode, SigningEntity};
use crate::storage::SigningEntityRecordStore;

/// Detects and records changes in a package's signing entity across
/// versions.
pub struct SigningEntityStore {
    store: Arc<dyn SigningEntityRecordStore>,
    policy: PolicyMode,
}

impl SigningEntityStore {
    /// Builds a change detector backed by `store`, enforcing mismatches
    /// according to `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn SigningEntityRecordStore>, policy: PolicyMode) -> Self {
        Self { store, policy }
    }

    /// Validates `entity` against prior history for `package`@`version`
    /// and for `package` generally, then records it.
    ///
    /// # Errors
    ///
    /// - [`RegistryClientError::SigningEntityForReleaseChanged`] under
    ///   [`PolicyMode::Strict`] if this exact release was previously
    ///   recorded with a different entity.
    /// - [`RegistryClientError::SigningEntityForPackageChanged`] under
    ///   [`PolicyMode::Strict`] if the package's most recently recorded
    ///   entity (for any other version) differs from `entity`.
    ///
    /// Under [`PolicyMode::Warn`] both mismatches are logged instead of
    /// rejected, and `entity` is recorded regardless.
    pub async fn validate_and_record(
        &self,
        package: &PackageIdentity,
        version: &str,
        registry_url: &str,
        entity: SigningEntity,
    ) -> RegistryResult<()> {
        let key = package.to_string();

        if let Some(prior) = self.store.get(&key, version, registry_url).await {
            if prior != entity && matches!(prior, SigningEntity::Recognized { .. }) {
                match self.policy {
                    PolicyMode::Strict => {
                        return Err(RegistryClientError::SigningEntityForReleaseChanged {
                            package: package.clone(),
                            version: version.to_string(),
                        })
                    }
                    PolicyMode::Warn => {
                        warn!("signing entity for {package}@{version} changed; continuing under warn policy");
                    }
                }
            }
        }

        let history = self.store.history(&key, registry_url).await;
        if let Some((_, last_entity)) = history.last() {
            if last_entity != &entity && matches!(last_entity, SigningEntity::Recognized { .. }) {
                match self.policy {
                    PolicyMode::Strict => {
                        return Err(RegistryClientError::SigningEntityForPackageChanged { package: package.clone() })
                    }
                    PolicyMode::Warn => {
                        warn!("signing entity for package {package} changed; continuing under warn policy");
                    }
                }
            }
        }

        self.store.put(&key, version, registry_url, entity).await;
        Ok(())
    }

    /// Administratively overwrites the signing entity recorded for
    /// `package`@`version`, bypassing the release- and package-level
    /// change-detection checks [`Self::validate_and_record`] enforces.
    /// `origin` tags the record with who or what requested the override
    /// (e.g. `"admin:alice"`), for storage implementations that persist it.
    pub async fn change_signing_entity(&self, package: &PackageIdentity, version: &str, registry_url: &str, entity: SigningEntity, origin: &str) {
        self.store.overwrite(&package.to_string(), version, registry_url, entity, origin).await;
    }

    /// Returns the recorded `(version, entity)` history for `package`,
    /// versions that failed to parse as semver are skipped rather than
    /// failing the whole lookup.
    pub async fn history(&self, package: &PackageIdentity, registry_url: &str) -> Vec<(Version, SigningEntity)> {
        self.store
            .history(&package.to_string(), registry_url)
            .await
            .into_iter()
            .filter_map(|(v, entity)| Version::parse(&v).ok().map(|version| (version, entity)))
            .collect()
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySigningEntityRecordStore;

    fn recognized(name: &str) -> SigningEntity {
        SigningEntity::Recognized {
            certificate_type: "adp".into(),
            name: name.into(),
            organizational_unit: "Engineering".into(),
            organization: "Octo Corp".into(),
        }
    }

    #[tokio::test]
    async fn first_observation_is_recorded_without_error() {
        let detector = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Strict);
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        detector.validate_and_record(&package, "1.0.0", "https://example.com", recognized("Mona")).await.unwrap();
    }

    #[tokio::test]
    async fn strict_policy_rejects_package_level_change() {
        let detector = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Strict);
        let package = PackageIdentity::registry_form("mona", "LinkedList");

        detector.validate_and_record(&package, "1.0.0", "https://example.com", recognized("Mona")).await.unwrap();

        let err = detector
            .validate_and_record(&package, "2.0.0", "https://example.com", recognized("Eve"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryClientError::SigningEntityForPackageChanged { .. }));
    }

    #[tokio::test]
    async fn strict_policy_rejects_release_level_change() {
        let detector = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Strict);
        let package = PackageIdentity::registry_form("mona", "LinkedList");

        detector.validate_and_record(&package, "1.0.0", "https://example.com", recognized("Mona")).await.unwrap();

        // Force a release-level record without going through put()'s version-replace
        // semantics by recording the same version again with a different entity.
        let err = detector
            .validate_and_record(&package, "1.0.0", "https://example.com", recognized("Eve"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryClientError::SigningEntityForReleaseChanged { .. }));
    }

    #[tokio::test]
    async fn unrecognized_signer_changing_is_not_a_package_level_violation() {
        // Only a prior *recognized* signer locks in package identity; two
        // different unrecognized signers across versions is unremarkable.
        let detector = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Strict);
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let unrecognized_a = SigningEntity::Unrecognized { name: Some("A".into()), email: None, organization: None };
        let unrecognized_b = SigningEntity::Unrecognized { name: Some("B".into()), email: None, organization: None };

        detector.validate_and_record(&package, "1.0.0", "https://example.com", unrecognized_a).await.unwrap();
        detector.validate_and_record(&package, "2.0.0", "https://example.com", unrecognized_b).await.unwrap();
    }

    #[tokio::test]
    async fn change_signing_entity_overwrites_without_consistency_checks() {
        let detector = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Strict);
        let package = PackageIdentity::registry_form("mona", "LinkedList");

        detector.validate_and_record(&package, "1.0.0", "https://example.com", recognized("Mona")).await.unwrap();
        detector.change_signing_entity(&package, "1.0.0", "https://example.com", recognized("Eve"), "admin:alice").await;

        let history = detector.history(&package, "https://example.com").await;
        assert_eq!(history.last().unwrap().1, recognized("Eve"));
    }

    #[tokio::test]
    async fn warn_policy_tolerates_changes_and_records_history() {
        let detector = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Warn);
        let package = PackageIdentity::registry_form("mona", "LinkedList");

        detector.validate_and_record(&package, "1.0.0", "https://example.com", recognized("Mona")).await.unwrap();
        detector.validate_and_record(&package, "2.0.0", "https://example.com", recognized("Eve")).await.unwrap();

        let history = detector.history(&package, "https://example.com").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].1, recognized("Eve"));
    }
}
