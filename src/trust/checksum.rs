//! Checksum trust-on-first-use: the first checksum observed for a
//! `(package, version, kind, registry)` is pinned; every later observation
//! is compared against the pin instead of blindly trusted.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::{RegistryClientError, RegistryResult};
use crate::hash::ChecksumHasher;
use crate::identity::PackageIdentity;
use crate::model::{Fingerprint, FingerprintKind, PolicyMode};
use crate::storage::FingerprintStore;

/// Validates downloaded content against a pinned checksum, computing and
/// pinning one on first sight.
pub struct ChecksumTofu {
    hasher: Arc<dyn ChecksumHasher>,
    store: Arc<dyn FingerprintStore>,
    policy: PolicyMode,
}

impl ChecksumTofu {
    /// Builds a validator backed by `hasher` and `store`, enforcing
    /// mismatches according to `policy`.
    #[must_use]
    pub fn new(hasher: Arc<dyn ChecksumHasher>, store: Arc<dyn FingerprintStore>, policy: PolicyMode) -> Self {
        Self { hasher, store, policy }
    }

    /// Validates `bytes` against the registry-published `checksum` and
    /// against any pinned fingerprint, pinning `checksum` if this is the
    /// first time this `(package, version, kind, registry)` was observed.
    ///
    /// # Errors
    ///
    /// - [`RegistryClientError::InvalidChecksum`] if `bytes`'s digest does
    ///   not match the registry-published `checksum`. This check always
    ///   applies, regardless of policy — a registry lying about its own
    ///   published checksum is never acceptable.
    /// - [`RegistryClientError::ChecksumChanged`] under
    ///   [`PolicyMode::Strict`] if a prior pin exists and disagrees with
    ///   `checksum`. Under [`PolicyMode::Warn`], the mismatch is logged
    ///   and the pin is updated to `checksum` instead of failing.
    pub async fn validate(
        &self,
        package: &PackageIdentity,
        version: &str,
        registry_url: &str,
        kind: FingerprintKind,
        bytes: &[u8],
        published_checksum: &str,
    ) -> RegistryResult<()> {
        let observed = self.hasher.digest(bytes);
        if observed != published_checksum {
            return Err(RegistryClientError::InvalidChecksum {
                package: package.clone(),
                version: version.to_string(),
                reason: format!("content digest '{observed}' does not match published checksum '{published_checksum}'"),
            });
        }

        let key = (package.to_string(), version.to_string(), kind.clone(), registry_url.to_string());
        match self.store.get(&key).await {
            None => {
                debug!("pinning checksum for {package}@{version}");
                self.pin(package, version, registry_url, kind, observed).await;
                Ok(())
            }
            Some(pinned) if pinned.checksum == observed => Ok(()),
            Some(pinned) => match self.policy {
                PolicyMode::Strict => Err(RegistryClientError::ChecksumChanged {
                    package: package.clone(),
                    version: version.to_string(),
                    latest: observed,
                    previous: pinned.checksum,
                }),
                PolicyMode::Warn => {
                    warn!(
                        "checksum for {package}@{version} changed from '{}' to '{observed}'; continuing under warn policy",
                        pinned.checksum
                    );
                    self.pin(package, version, registry_url, kind, observed).await;
                    Ok(())
                }
            },
        }
    }

    async fn pin(&self, package: &PackageIdentity, version: &str, registry_url: &str, kind: FingerprintKind, checksum: String) {
        self.store
            .put(Fingerprint {
                package: package.to_string(),
                version: version.to_string(),
                kind,
                registry_url: registry_url.to_string(),
                checksum,
            })
            .await;
    }
}
