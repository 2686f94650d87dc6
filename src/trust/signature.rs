//! The Signature Validator: verifies detached signatures, gates unsigned
//! or untrusted content behind a [`ConsentDelegate`], and hands recognized
//! entities off to [`SigningEntityStore`] for change detection.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{RegistryClientError, RegistryResult};
use crate::identity::PackageIdentity;
use crate::model::{SigningEntity, SigningInfo};
use crate::trust::delegate::ConsentDelegate;
use crate::trust::signing_entity::SigningEntityStore;

/// Cryptographically verifies a detached signature and resolves the
/// signer's identity.
///
/// Signature formats are registry-specific; no default implementation
/// ships.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature_base64` (in `signature_format`) over `content`,
    /// returning the signer's resolved identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::InvalidSignature`] if the signature
    /// does not verify, [`RegistryClientError::InvalidSigningCertificate`]
    /// if the embedded certificate is malformed, or
    /// [`RegistryClientError::UnknownSignatureFormat`] if `signature_format`
    /// is not supported by this implementation.
    async fn verify(&self, content: &[u8], signature_base64: &str, signature_format: &str) -> RegistryResult<SigningEntity>;
}

/// Which piece of release content a signature check concerns, used only
/// to select the right "not signed" error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedContentKind {
    /// The release's source archive.
    SourceArchive,
    /// A manifest.
    Manifest,
}

/// Runs the full trust pipeline over a piece of signed (or unsigned)
/// release content.
pub struct SignatureValidator {
    verifier: Arc<dyn SignatureVerifier>,
    consent: Arc<dyn ConsentDelegate>,
    entity_store: SigningEntityStore,
    skip_signature_validation: bool,
}

impl SignatureValidator {
    /// Builds a validator from its collaborators. `skip_signature_validation`
    /// mirrors [`crate::config::RegistryClientConfig::skip_signature_validation`]:
    /// when set, [`Self::validate`] returns `Ok(None)` immediately without
    /// verifying or prompting for consent.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        consent: Arc<dyn ConsentDelegate>,
        entity_store: SigningEntityStore,
        skip_signature_validation: bool,
    ) -> Self {
        Self { verifier, consent, entity_store, skip_signature_validation }
    }

    /// Administratively overwrites the signing entity recorded for
    /// `package`@`version`, bypassing the change-detection checks
    /// [`Self::validate`] enforces.
    pub async fn change_signing_entity(
        &self,
        package: &PackageIdentity,
        version: &str,
        registry_url: &str,
        entity: SigningEntity,
        origin: &str,
    ) {
        self.entity_store.change_signing_entity(package, version, registry_url, entity, origin).await;
    }

    /// Verifies `signing` over `content` and returns the resolved signing
    /// entity, without consulting consent or recording trust history. Used
    /// to populate [`crate::model::Resource::signing_entity`] for display
    /// purposes even when the caller isn't otherwise exercising the trust
    /// pipeline (e.g. `get_version_metadata`).
    ///
    /// # Errors
    ///
    /// Propagates whatever [`SignatureVerifier::verify`] returns.
    pub async fn extract_entity(&self, content: &[u8], signing: &SigningInfo) -> RegistryResult<SigningEntity> {
        self.verifier.verify(content, &signing.signature_base64, &signing.signature_format).await
    }

    /// Runs the full validation pipeline: consent for unsigned content,
    /// signature verification, consent for untrusted signers, and
    /// signing-entity change-detection recording.
    ///
    /// Returns `Ok(None)` when content is unsigned and the consent
    /// delegate allowed it; `Ok(Some(entity))` when a signature was
    /// verified and trusted (either because it was already recognized, or
    /// because the consent delegate allowed an unrecognized/changed
    /// entity).
    ///
    /// # Errors
    ///
    /// - [`RegistryClientError::SourceArchiveNotSigned`] /
    ///   [`RegistryClientError::ManifestNotSigned`] if unsigned and the
    ///   consent delegate denied it.
    /// - [`RegistryClientError::SignerNotTrusted`] if the delegate denied
    ///   an unrecognized signer.
    /// - Whatever [`SignatureVerifier::verify`] or
    ///   [`SigningEntityStore::validate_and_record`] return otherwise.
    pub async fn validate(
        &self,
        package: &PackageIdentity,
        version: &str,
        registry_url: &str,
        content_kind: SignedContentKind,
        content: &[u8],
        signing: Option<&SigningInfo>,
    ) -> RegistryResult<Option<SigningEntity>> {
        if self.skip_signature_validation {
            return Ok(None);
        }

        let not_signed_error = || match content_kind {
            SignedContentKind::SourceArchive => {
                RegistryClientError::SourceArchiveNotSigned { package: package.clone(), version: version.to_string() }
            }
            SignedContentKind::Manifest => RegistryClientError::ManifestNotSigned { package: package.clone(), version: version.to_string() },
        };

        let Some(signing) = signing else {
            // A package that has ever had a recognized signer can't suddenly
            // publish an unsigned release — consent never even gets asked.
            let has_prior_recognized_signer =
                self.entity_store.history(package, registry_url).await.iter().any(|(_, e)| matches!(e, SigningEntity::Recognized { .. }));
            if has_prior_recognized_signer {
                return Err(not_signed_error());
            }

            return if self.consent.on_unsigned(registry_url, package, version).await { Ok(None) } else { Err(not_signed_error()) };
        };

        let entity = self.extract_entity(content, signing).await?;

        if !matches!(entity, SigningEntity::Recognized { .. })
            && !self.consent.on_untrusted(registry_url, package, version, &entity).await
        {
            return Err(RegistryClientError::SignerNotTrusted { package: package.clone(), version: version.to_string() });
        }

        self.entity_store.validate_and_record(package, version, registry_url, entity.clone()).await?;

        Ok(Some(entity))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySigningEntityRecordStore;
    use crate::trust::delegate::DenyAll;
    use crate::model::PolicyMode;

    struct AlwaysRecognized;

    #[async_trait]
    impl SignatureVerifier for AlwaysRecognized {
        async fn verify(&self, _content: &[u8], _signature_base64: &str, _signature_format: &str) -> RegistryResult<SigningEntity> {
            Ok(SigningEntity::Recognized {
                certificate_type: "adp".into(),
                name: "Mona".into(),
                organizational_unit: "Engineering".into(),
                organization: "Octo Corp".into(),
            })
        }
    }

    struct AllowAll;

    #[async_trait]
    impl ConsentDelegate for AllowAll {
        async fn on_unsigned(&self, _registry: &str, _package: &PackageIdentity, _version: &str) -> bool {
            true
        }
        async fn on_untrusted(&self, _registry: &str, _package: &PackageIdentity, _version: &str, _entity: &SigningEntity) -> bool {
            true
        }
    }

    fn validator(consent: Arc<dyn ConsentDelegate>, verifier: Arc<dyn SignatureVerifier>) -> SignatureValidator {
        let entity_store = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Strict);
        SignatureValidator::new(verifier, consent, entity_store, false)
    }

    #[tokio::test]
    async fn unsigned_content_denied_by_default_delegate() {
        let validator = validator(Arc::new(DenyAll), Arc::new(AlwaysRecognized));
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let err = validator
            .validate(&package, "1.0.0", "https://example.com", SignedContentKind::SourceArchive, b"bytes", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryClientError::SourceArchiveNotSigned { .. }));
    }

    #[tokio::test]
    async fn unsigned_content_allowed_by_permissive_delegate() {
        let validator = validator(Arc::new(AllowAll), Arc::new(AlwaysRecognized));
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let result = validator
            .validate(&package, "1.0.0", "https://example.com", SignedContentKind::Manifest, b"bytes", None)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn unsigned_content_is_rejected_outright_once_a_recognized_signer_exists() {
        let record_store = Arc::new(InMemorySigningEntityRecordStore::default());
        let entity_store = SigningEntityStore::new(record_store, PolicyMode::Strict);
        // AllowAll would normally grant consent for unsigned content — but a
        // prior recognized signer must short-circuit straight to failure.
        let validator = SignatureValidator::new(Arc::new(AlwaysRecognized), Arc::new(AllowAll), entity_store, false);
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let signing = SigningInfo { signature_base64: "c2ln".into(), signature_format: "cms-1.0.0".into() };

        validator
            .validate(&package, "1.0.0", "https://example.com", SignedContentKind::SourceArchive, b"bytes", Some(&signing))
            .await
            .unwrap();

        let err = validator
            .validate(&package, "2.0.0", "https://example.com", SignedContentKind::SourceArchive, b"bytes", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryClientError::SourceArchiveNotSigned { .. }));
    }

    #[tokio::test]
    async fn skip_signature_validation_short_circuits_to_none() {
        let entity_store = SigningEntityStore::new(Arc::new(InMemorySigningEntityRecordStore::default()), PolicyMode::Strict);
        let validator = SignatureValidator::new(Arc::new(AlwaysRecognized), Arc::new(DenyAll), entity_store, true);
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let signing = SigningInfo { signature_base64: "c2ln".into(), signature_format: "cms-1.0.0".into() };

        let result = validator
            .validate(&package, "1.0.0", "https://example.com", SignedContentKind::SourceArchive, b"bytes", Some(&signing))
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn signed_and_recognized_content_does_not_need_consent() {
        let validator = validator(Arc::new(DenyAll), Arc::new(AlwaysRecognized));
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let signing = SigningInfo { signature_base64: "c2ln".into(), signature_format: "cms-1.0.0".into() };
        let result = validator
            .validate(&package, "1.0.0", "https://example.com", SignedContentKind::SourceArchive, b"bytes", Some(&signing))
            .await
            .unwrap();
        assert!(matches!(result, Some(SigningEntity::Recognized { .. })));
    }
}
