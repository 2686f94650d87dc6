//! Error handling for swift-registry-client.
//!
//! This module defines the single closed error taxonomy used throughout the
//! crate: one `thiserror` enum, one variant per failure kind, each carrying
//! the context (registry, package, version, underlying cause) needed to act
//! on it without re-deriving state the caller already had.

use thiserror::Error;

use crate::identity::PackageIdentity;

/// Result type alias used by every public operation in this crate.
pub type RegistryResult<T> = Result<T, RegistryClientError>;

/// The complete set of failures a registry operation can produce.
///
/// Variants are grouped by concern: configuration, protocol, per-operation
/// retrieval, trust, TOFU, filesystem/archive, and publish. `Cancelled`
/// stands apart: it is never produced by `#[from]`
/// wrapping, and retrieval errors must never wrap it — see
/// [`RegistryClientError::wrap_retrieval`].
#[derive(Debug, Error)]
pub enum RegistryClientError {
    // --- Configuration --------------------------------------------------
    /// No registry is configured for the requested package's scope.
    #[error("no registry configured for scope '{scope}'")]
    RegistryNotConfigured {
        /// The scope that has no associated registry.
        scope: String,
    },

    /// A package identity could not be resolved to a registry-qualified
    /// `(scope, name)` pair.
    #[error("invalid package identity: {reason}")]
    InvalidPackageIdentity {
        /// Human-readable reason the identity was rejected.
        reason: String,
    },

    /// A URL could not be constructed or parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parse failure reason.
        reason: String,
    },

    /// A detached signature's format was not recognized.
    #[error("unknown signature format '{format}'")]
    UnknownSignatureFormat {
        /// The unrecognized format string.
        format: String,
    },

    /// A signature was supplied without a format, or vice versa.
    #[error("missing signature format")]
    MissingSignatureFormat,

    // --- Protocol ---------------------------------------------------------
    /// The server responded with a status code not valid for this operation.
    #[error("invalid response status for {registry}: expected {expected}, got {actual}")]
    InvalidResponseStatus {
        /// Registry that produced the response.
        registry: String,
        /// Status expected by the calling operation.
        expected: String,
        /// Status actually observed.
        actual: u16,
    },

    /// The `Content-Version` header was missing or did not equal `"1"`.
    #[error("invalid Content-Version header from {registry}: {actual:?}")]
    InvalidContentVersion {
        /// Registry that produced the response.
        registry: String,
        /// The header value actually observed, if any.
        actual: Option<String>,
    },

    /// The `Content-Type` header did not match the expected media type.
    #[error("invalid Content-Type from {registry}: expected '{expected}', got '{actual}'")]
    InvalidContentType {
        /// Registry that produced the response.
        registry: String,
        /// Media type expected by the calling operation.
        expected: String,
        /// Media type actually observed.
        actual: String,
    },

    /// A response body could not be decoded as the expected shape.
    #[error("invalid response body from {registry}: {reason}")]
    InvalidResponse {
        /// Registry that produced the response.
        registry: String,
        /// Decoding failure reason.
        reason: String,
    },

    /// The registry rejected the request's credentials (401).
    #[error("unauthorized for registry {registry}")]
    Unauthorized {
        /// Registry URL.
        registry: String,
    },

    /// The registry refused the request despite valid credentials (403).
    #[error("forbidden by registry {registry}")]
    Forbidden {
        /// Registry URL.
        registry: String,
    },

    /// The registry does not support the configured authentication kind
    /// (501).
    #[error("authentication method not supported by registry {registry}")]
    AuthenticationMethodNotSupported {
        /// Registry URL.
        registry: String,
    },

    /// A 4xx status not covered by a more specific variant.
    #[error("client error {code} from {registry}: {body}")]
    ClientError {
        /// Registry URL.
        registry: String,
        /// HTTP status code.
        code: u16,
        /// Response body (or `detail` from a `problem+json` envelope).
        body: String,
    },

    /// A 5xx status.
    #[error("server error {code} from {registry}: {body}")]
    ServerError {
        /// Registry URL.
        registry: String,
        /// HTTP status code.
        code: u16,
        /// Response body (or `detail` from a `problem+json` envelope).
        body: String,
    },

    // --- Per-operation retrieval -------------------------------------------
    /// `get_package_metadata` failed.
    #[error("failed retrieving releases for {package}: {source}")]
    FailedRetrievingReleases {
        /// Package whose releases could not be retrieved.
        package: PackageIdentity,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// `get_version_metadata` failed.
    #[error("failed retrieving release info for {package}@{version}: {source}")]
    FailedRetrievingReleaseInfo {
        /// Package whose release info could not be retrieved.
        package: PackageIdentity,
        /// Requested version.
        version: String,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// `get_available_manifests`/`get_manifest_content` failed.
    #[error("failed retrieving manifest for {package}@{version}: {source}")]
    FailedRetrievingManifest {
        /// Package whose manifest could not be retrieved.
        package: PackageIdentity,
        /// Requested version.
        version: String,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// `download_source_archive` failed during the network phase.
    #[error("failed downloading source archive for {package}@{version}: {source}")]
    FailedDownloadingSourceArchive {
        /// Package whose archive could not be downloaded.
        package: PackageIdentity,
        /// Requested version.
        version: String,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// `lookup_identities` failed.
    #[error("failed identity lookup for {scm_url}: {source}")]
    FailedIdentityLookup {
        /// SCM URL that was looked up.
        scm_url: String,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// `check_availability` failed to complete (as distinct from returning
    /// `AvailabilityStatus::Error`).
    #[error("availability check failed for {registry}: {source}")]
    AvailabilityCheckFailed {
        /// Registry URL.
        registry: String,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// `login` failed.
    #[error("login failed for {url}: {source}")]
    LoginFailed {
        /// Login URL.
        url: String,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// The Availability Gate short-circuited the call.
    #[error("registry {registry} is not available")]
    RegistryNotAvailable {
        /// Registry URL.
        registry: String,
    },

    // --- Trust --------------------------------------------------------------
    /// The source archive has no signature and the package has prior
    /// recognized signers, or the consent delegate denied it.
    #[error("source archive for {package}@{version} is not signed")]
    SourceArchiveNotSigned {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
    },

    /// The manifest has no signature and the package has prior recognized
    /// signers, or the consent delegate denied it.
    #[error("manifest for {package}@{version} is not signed")]
    ManifestNotSigned {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
    },

    /// The signer was not recognized/trusted and the consent delegate
    /// denied it.
    #[error("signer not trusted for {package}@{version}")]
    SignerNotTrusted {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
    },

    /// A detached signature failed to verify or was malformed.
    #[error("invalid signature for {package}@{version}: {reason}")]
    InvalidSignature {
        /// Package identity, when known (publish-time validation has none).
        package: Option<PackageIdentity>,
        /// Version, when known.
        version: Option<String>,
        /// Reason the signature was rejected.
        reason: String,
    },

    /// The signing certificate embedded in a signature was invalid.
    #[error("invalid signing certificate for {package}@{version}: {reason}")]
    InvalidSigningCertificate {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
        /// Reason the certificate was rejected.
        reason: String,
    },

    /// The signature verifier collaborator itself failed (distinct from
    /// rejecting the signature as invalid).
    #[error("failed to validate signature for {package}@{version}: {reason}")]
    FailedToValidateSignature {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
        /// Underlying failure reason.
        reason: String,
    },

    /// The signing entity for this specific release changed from a prior
    /// recognized value.
    #[error("signing entity for {package}@{version} changed")]
    SigningEntityForReleaseChanged {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
    },

    /// The signing entity changed across the package's version history.
    #[error("signing entity for package {package} changed")]
    SigningEntityForPackageChanged {
        /// Package identity.
        package: PackageIdentity,
    },

    // --- TOFU -----------------------------------------------------------
    /// A fingerprint mismatched the previously pinned value under strict
    /// policy.
    #[error("checksum changed for {package}@{version}: latest={latest}, previous={previous}")]
    ChecksumChanged {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
        /// Newly observed checksum.
        latest: String,
        /// Previously pinned checksum.
        previous: String,
    },

    /// A checksum could not be parsed/decoded.
    #[error("invalid checksum for {package}@{version}: {reason}")]
    InvalidChecksum {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
        /// Reason the checksum was rejected.
        reason: String,
    },

    /// The source archive resource carried no checksum to validate against.
    #[error("source archive for {package}@{version} is missing a checksum")]
    SourceArchiveMissingChecksum {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
    },

    // --- Filesystem / archive --------------------------------------------
    /// The destination path already existed before extraction began.
    #[error("path already exists: {path}")]
    PathAlreadyExists {
        /// Offending path.
        path: String,
    },

    /// The downloaded archive could not be opened/read.
    #[error("failed loading package archive for {package}@{version}: {reason}")]
    FailedLoadingPackageArchive {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
        /// Underlying reason.
        reason: String,
    },

    /// The `registry-release-metadata` sidecar could not be read or
    /// written.
    #[error("failed loading package metadata: {reason}")]
    FailedLoadingPackageMetadata {
        /// Underlying reason.
        reason: String,
    },

    /// The archive contained path traversal entries, a top-level-directory
    /// collision, or another structural violation.
    #[error("invalid source archive for {package}@{version}: {reason}")]
    InvalidSourceArchive {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
        /// Reason the archive was rejected.
        reason: String,
    },

    // --- Publish ----------------------------------------------------------
    /// The publish request failed with a non-201/202 status.
    #[error("failed publishing {package}@{version}: {source}")]
    FailedPublishing {
        /// Package identity.
        package: PackageIdentity,
        /// Version.
        version: String,
        /// Underlying cause.
        #[source]
        source: Box<RegistryClientError>,
    },

    /// The registry accepted a publish (202) but did not supply a
    /// `Location` header.
    #[error("missing publishing location header from {registry}")]
    MissingPublishingLocation {
        /// Registry URL.
        registry: String,
    },

    // --- Cross-cutting ----------------------------------------------------
    /// The operation was cancelled before it completed. Never produced by
    /// `#[from]`; never wrapped by a retrieval variant.
    #[error("operation cancelled")]
    Cancelled,

    /// The underlying HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body could not be parsed as JSON.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ZIP archiver failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl RegistryClientError {
    /// Wraps a non-cancellation error into a retrieval-operation variant
    /// using `ctor`. A [`RegistryClientError::Cancelled`] is returned
    /// unwrapped rather than nested, so a cancelled call is always
    /// recognizable by a plain `matches!(err, Cancelled)` regardless of
    /// which operation was in flight.
    pub(crate) fn wrap_retrieval(
        self,
        ctor: impl FnOnce(Box<RegistryClientError>) -> RegistryClientError,
    ) -> RegistryClientError {
        if matches!(self, RegistryClientError::Cancelled) {
            self
        } else {
            ctor(Box::new(self))
        }
    }

    /// `true` for any of the TOFU/signing-entity mismatch variants that a
    /// warn-mode policy may downgrade to a diagnostic instead of a hard
    /// failure.
    #[must_use]
    pub fn is_recoverable_under_warn_policy(&self) -> bool {
        matches!(
            self,
            Self::ChecksumChanged { .. }
                | Self::SigningEntityForReleaseChanged { .. }
                | Self::SigningEntityForPackageChanged { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_retrieval_passes_cancellation_through_unwrapped() {
        let err = RegistryClientError::Cancelled;
        let wrapped = err.wrap_retrieval(|source| RegistryClientError::FailedRetrievingReleases {
            package: PackageIdentity::registry_form("mona", "LinkedList"),
            source,
        });
        assert!(matches!(wrapped, RegistryClientError::Cancelled));
    }

    #[test]
    fn wrap_retrieval_wraps_non_cancellation_errors() {
        let err = RegistryClientError::RegistryNotAvailable { registry: "https://example.com".into() };
        let wrapped = err.wrap_retrieval(|source| RegistryClientError::FailedRetrievingReleases {
            package: PackageIdentity::registry_form("mona", "LinkedList"),
            source,
        });
        assert!(matches!(wrapped, RegistryClientError::FailedRetrievingReleases { .. }));
    }

    #[test]
    fn warn_policy_recoverability() {
        let checksum_changed = RegistryClientError::ChecksumChanged {
            package: PackageIdentity::registry_form("mona", "LinkedList"),
            version: "1.0.0".into(),
            latest: "abc".into(),
            previous: "def".into(),
        };
        assert!(checksum_changed.is_recoverable_under_warn_policy());

        let unauthorized = RegistryClientError::Unauthorized { registry: "https://example.com".into() };
        assert!(!unauthorized.is_recoverable_under_warn_policy());
    }
}
