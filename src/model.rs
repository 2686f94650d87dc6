//! Core data types returned by and passed to registry operations: plain
//! data structs describing a registry response, generalized to the richer
//! resource/signing model a SwiftPM registry client needs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

/// An immutable record describing one configured registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    /// Base URL of the registry, with no trailing slash.
    pub url: String,
    /// Whether this registry implements the `/availability` probe.
    pub supports_availability: bool,
    /// The authentication kind to use for requests to this registry.
    pub authentication_kind: AuthenticationKind,
}

impl Registry {
    /// Builds a registry record with no authentication.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            supports_availability: true,
            authentication_kind: AuthenticationKind::None,
        }
    }

    /// Sets whether this registry supports the availability probe.
    #[must_use]
    pub fn with_availability_support(mut self, supports: bool) -> Self {
        self.supports_availability = supports;
        self
    }

    /// Sets the authentication kind used for requests to this registry.
    #[must_use]
    pub fn with_authentication(mut self, kind: AuthenticationKind) -> Self {
        self.authentication_kind = kind;
        self
    }
}

/// How requests to a registry are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationKind {
    /// No `Authorization` header is sent.
    None,
    /// HTTP Basic auth: `Authorization: Basic base64(user:pass)`.
    Basic {
        /// Basic auth username.
        username: String,
        /// Basic auth password.
        password: String,
    },
    /// Bearer token auth: `Authorization: Bearer {token}`.
    Token {
        /// The bearer token.
        token: String,
    },
}

/// Package metadata returned by `get_package_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// The registry this metadata was retrieved from.
    pub registry: String,
    /// Released versions, sorted strictly descending with no duplicates.
    pub versions: Vec<Version>,
    /// Alternate source locations for this package, if any.
    pub alternate_locations: Vec<String>,
    /// The next page URL, when the caller paginates manually. Always
    /// `None` in the value returned by `get_package_metadata`, which
    /// follows pagination to completion itself; present on the raw,
    /// unsorted intermediate page values.
    pub next_page: Option<String>,
}

/// Version-specific metadata returned by `get_version_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVersionMetadata {
    /// The registry this metadata was retrieved from.
    pub registry: String,
    /// URL of the license text, if published.
    pub license_url: Option<String>,
    /// URL of the README, if published.
    pub readme_url: Option<String>,
    /// Source control URLs associated with this release.
    pub repository_urls: Option<Vec<String>>,
    /// Resources attached to this release (the source archive, among
    /// others).
    pub resources: Vec<Resource>,
    /// The release author, if published.
    pub author: Option<String>,
    /// A human-readable description of the release.
    pub description: Option<String>,
    /// When the release was published.
    pub published_at: Option<DateTime<Utc>>,
}

impl PackageVersionMetadata {
    /// The resource named `"source-archive"`, if present.
    #[must_use]
    pub fn source_archive(&self) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == "source-archive")
    }

    /// The resource describing the unspecialized manifest (`Package.swift`),
    /// if the registry published one alongside the source archive.
    #[must_use]
    pub fn manifest(&self) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == "Package.swift")
    }
}

/// A named artifact attached to a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name, e.g. `"source-archive"`.
    pub name: String,
    /// Resource media type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Checksum of the resource's content, when published.
    pub checksum: Option<String>,
    /// Detached signature over the resource's content, when published.
    pub signing: Option<SigningInfo>,
    /// The resolved signing entity, filled in after signature validation.
    /// `None` either because the resource is unsigned or because
    /// validation has not yet run.
    pub signing_entity: Option<SigningEntity>,
}

/// A detached signature attached to a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningInfo {
    /// Base64-encoded signature bytes.
    pub signature_base64: String,
    /// Signature format identifier (e.g. `"cms-1.0.0"`).
    pub signature_format: String,
}

/// The identity behind a verified or unverified signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningEntity {
    /// A signer whose certificate chains to a recognized authority.
    Recognized {
        /// Certificate type, e.g. `"adp"` (Apple Developer Program) or a
        /// registry-specific equivalent.
        certificate_type: String,
        /// Signer common name.
        name: String,
        /// Organizational unit.
        organizational_unit: String,
        /// Organization name.
        organization: String,
    },
    /// A signer whose certificate does not chain to a recognized
    /// authority, described only by the fields the certificate itself
    /// supplied.
    Unrecognized {
        /// Signer name, if present in the certificate.
        name: Option<String>,
        /// Signer email, if present in the certificate.
        email: Option<String>,
        /// Organization, if present in the certificate.
        organization: Option<String>,
    },
}

/// The kind of content a [`Fingerprint`] was computed over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerprintKind {
    /// The release's source archive.
    SourceArchive,
    /// A manifest, optionally specialized to a tools-version suffix
    /// (`Package@swift-5.9.swift`).
    Manifest {
        /// The tools-version suffix, when the manifest is specialized.
        tools_version: Option<String>,
    },
}

/// A pinned checksum for trust-on-first-use validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// The package this fingerprint belongs to.
    pub package: String,
    /// The version this fingerprint belongs to.
    pub version: String,
    /// What kind of content the checksum covers.
    pub kind: FingerprintKind,
    /// The registry the fingerprint was observed against.
    pub registry_url: String,
    /// The pinned checksum value.
    pub checksum: String,
}

/// The key under which a [`Fingerprint`] or signing-entity record is
/// stored: `(package, version, kind, registry)`.
pub type FingerprintKey = (String, String, FingerprintKind, String);

/// The result of probing a registry's `/availability` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityStatus {
    /// The registry is reachable and reports itself available.
    Available,
    /// The registry reported itself unavailable (404/501).
    Unavailable,
    /// Probing the registry failed for another reason.
    Error(String),
}

/// How a mismatch between an observed and a pinned value is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyMode {
    /// Mismatches are fatal errors.
    #[default]
    Strict,
    /// Mismatches are logged as diagnostics and the operation proceeds.
    Warn,
}

/// Dist-tag-style mapping of manifest filename to its parsed content,
/// returned by `get_available_manifests`.
pub type ManifestListing = HashMap<String, (String, Option<String>)>;

/// The record written as the `registry-release-metadata` sidecar at the
/// root of an extracted source archive, so later tooling (or a second
/// process reading the same checkout) can recover a release's provenance
/// without re-fetching it from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetadataSidecar {
    /// The registry the release was downloaded from.
    pub source_url: String,
    /// The release author, if published.
    pub author: Option<String>,
    /// A human-readable description of the release.
    pub description: Option<String>,
    /// URL of the license text, if published.
    pub license_url: Option<String>,
    /// URL of the README, if published.
    pub readme_url: Option<String>,
    /// Source control URLs associated with this release.
    pub repository_urls: Option<Vec<String>>,
    /// The signing entity resolved for the source archive, if any.
    pub signing_entity: Option<SigningEntity>,
    /// The source archive's own detached signature, carried through
    /// verbatim so a later reader doesn't need network access to re-derive
    /// what was already verified once.
    pub signing: Option<SigningInfo>,
}

impl ReleaseMetadataSidecar {
    /// Builds a sidecar record from the version metadata fetched during
    /// download and the signing entity the trust pipeline resolved for the
    /// source archive, if any.
    #[must_use]
    pub fn new(version_metadata: &PackageVersionMetadata, signing_entity: Option<SigningEntity>) -> Self {
        let signing = version_metadata.source_archive().and_then(|resource| resource.signing.clone());
        Self {
            source_url: version_metadata.registry.clone(),
            author: version_metadata.author.clone(),
            description: version_metadata.description.clone(),
            license_url: version_metadata.license_url.clone(),
            readme_url: version_metadata.readme_url.clone(),
            repository_urls: version_metadata.repository_urls.clone(),
            signing_entity,
            signing,
        }
    }
}

/// The sidecar's filename, written at the root of every extracted source
/// archive tree.
pub const RELEASE_METADATA_SIDECAR_FILENAME: &str = "registry-release-metadata.json";
