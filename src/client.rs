//! The Request Orchestrator: the `RegistryClient` facade that wires the
//! URL builder, header parser, response classifier, caches, and trust
//! pipeline into the registry's public operations.

use std::collections::HashMap;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use semver::Version;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::archive::{SourceArchiver, ZipArchiver};
use crate::cache::{AvailabilityGate, CacheStats, MetadataCache};
use crate::config::RegistryClientConfig;
use crate::error::{RegistryClientError, RegistryResult};
use crate::hash::{ChecksumHasher, Sha256Hasher};
use crate::http::{
    classify_response, parse_content_type, parse_content_version, parse_content_version_optional, parse_link_header, parse_link_header_all,
    LinkRelation, UrlBuilder,
};
use crate::identity::PackageIdentity;
use crate::model::{
    AuthenticationKind, AvailabilityStatus, FingerprintKind, ManifestListing, PackageMetadata, PackageVersionMetadata,
    Registry, ReleaseMetadataSidecar, Resource, SigningEntity, SigningInfo,
};
use crate::progress::DownloadProgress;
use crate::publish::{build_envelope, PublishRequest, PublishResult};
use crate::sidecar;
use crate::storage::{FingerprintStore, InMemoryFingerprintStore, InMemorySigningEntityRecordStore, SigningEntityRecordStore};
use crate::trust::{
    ChecksumTofu, ConsentDelegate, DenyAll, MemoizingConsentDelegate, SignatureValidator, SignatureVerifier, SignedContentKind,
    SigningEntityStore,
};

const SWIFT_JSON: &str = "application/vnd.swift.registry.v1+json";
const SWIFT_ZIP: &str = "application/vnd.swift.registry.v1+zip";
const SWIFT_SWIFT: &str = "application/vnd.swift.registry.v1+swift";

/// A signature verifier that rejects every signed payload. Used internally
/// as the fallback when a caller does not inject a real verifier, so the
/// client remains buildable without one while still honoring consent for
/// unsigned content.
struct UnsupportedVerifier;

#[async_trait::async_trait]
impl SignatureVerifier for UnsupportedVerifier {
    async fn verify(&self, _content: &[u8], _signature_base64: &str, signature_format: &str) -> RegistryResult<SigningEntity> {
        Err(RegistryClientError::UnknownSignatureFormat { format: signature_format.to_string() })
    }
}

/// Builds a [`RegistryClient`].
pub struct RegistryClientBuilder {
    registries: HashMap<String, Registry>,
    config: RegistryClientConfig,
    checksum_hasher: Arc<dyn ChecksumHasher>,
    signature_verifier: Arc<dyn SignatureVerifier>,
    archiver: Arc<dyn SourceArchiver>,
    fingerprint_store: Arc<dyn FingerprintStore>,
    signing_entity_store: Arc<dyn SigningEntityRecordStore>,
    consent: Arc<dyn ConsentDelegate>,
}

impl RegistryClientBuilder {
    /// Starts a builder with every collaborator at its default
    /// implementation and an empty registry map.
    #[must_use]
    pub fn new(config: RegistryClientConfig) -> Self {
        Self {
            registries: HashMap::new(),
            config,
            checksum_hasher: Arc::new(Sha256Hasher),
            signature_verifier: Arc::new(UnsupportedVerifier),
            archiver: Arc::new(ZipArchiver),
            fingerprint_store: Arc::new(InMemoryFingerprintStore::default()),
            signing_entity_store: Arc::new(InMemorySigningEntityRecordStore::default()),
            consent: Arc::new(DenyAll),
        }
    }

    /// Registers `registry` as the destination for packages scoped under
    /// `scope`.
    #[must_use]
    pub fn with_registry(mut self, scope: impl Into<String>, registry: Registry) -> Self {
        self.registries.insert(scope.into(), registry);
        self
    }

    /// Overrides the checksum hasher.
    #[must_use]
    pub fn with_checksum_hasher(mut self, hasher: Arc<dyn ChecksumHasher>) -> Self {
        self.checksum_hasher = hasher;
        self
    }

    /// Supplies a real signature verifier. Without one, signed content is
    /// always rejected as [`RegistryClientError::UnknownSignatureFormat`]
    /// while unsigned content still goes through the consent delegate
    /// normally.
    #[must_use]
    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.signature_verifier = verifier;
        self
    }

    /// Overrides the source archiver.
    #[must_use]
    pub fn with_archiver(mut self, archiver: Arc<dyn SourceArchiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Overrides the fingerprint store.
    #[must_use]
    pub fn with_fingerprint_store(mut self, store: Arc<dyn FingerprintStore>) -> Self {
        self.fingerprint_store = store;
        self
    }

    /// Overrides the signing-entity record store.
    #[must_use]
    pub fn with_signing_entity_store(mut self, store: Arc<dyn SigningEntityRecordStore>) -> Self {
        self.signing_entity_store = store;
        self
    }

    /// Overrides the consent delegate.
    #[must_use]
    pub fn with_consent_delegate(mut self, delegate: Arc<dyn ConsentDelegate>) -> Self {
        self.consent = delegate;
        self
    }

    /// Finishes construction.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::Transport`] if the underlying HTTP
    /// client could not be built (e.g. TLS backend initialization failed).
    pub fn build(self) -> RegistryResult<RegistryClient> {
        let http = reqwest::Client::builder().timeout(self.config.request_timeout).build()?;

        let entity_store = SigningEntityStore::new(self.signing_entity_store, self.config.mismatch_policy);
        let memoizing_consent: Arc<dyn ConsentDelegate> = Arc::new(MemoizingConsentDelegate::new(Arc::clone(&self.consent)));
        let signature_validator =
            SignatureValidator::new(self.signature_verifier, memoizing_consent, entity_store, self.config.skip_signature_validation);
        let checksum_tofu = ChecksumTofu::new(self.checksum_hasher, self.fingerprint_store, self.config.mismatch_policy);

        Ok(RegistryClient {
            http,
            registries: self.registries,
            availability_gate: AvailabilityGate::new(self.config.availability_ttl),
            metadata_cache: MetadataCache::new(self.config.metadata_ttl),
            checksum_tofu,
            signature_validator,
            consent: self.consent,
            archiver: self.archiver,
            config: self.config,
            cancellation: CancellationToken::new(),
        })
    }
}

/// The registry client: the crate's single public entry point, mediating
/// every request between a Swift package manager and one or more
/// registries.
pub struct RegistryClient {
    http: reqwest::Client,
    registries: HashMap<String, Registry>,
    availability_gate: AvailabilityGate,
    metadata_cache: MetadataCache,
    checksum_tofu: ChecksumTofu,
    signature_validator: SignatureValidator,
    consent: Arc<dyn ConsentDelegate>,
    archiver: Arc<dyn SourceArchiver>,
    config: RegistryClientConfig,
    cancellation: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    releases: HashMap<String, ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    #[serde(default)]
    problem: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadataResponse {
    #[serde(default)]
    metadata: Option<VersionMetadataBody>,
}

#[derive(Debug, Deserialize, Default)]
struct VersionMetadataBody {
    #[serde(default)]
    author: Option<AuthorBody>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "licenseURL")]
    license_url: Option<String>,
    #[serde(default, rename = "readmeURL")]
    readme_url: Option<String>,
    #[serde(default, rename = "repositoryURLs")]
    repository_urls: Option<Vec<String>>,
    #[serde(default, rename = "originalPublicationTime")]
    original_publication_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    resources: Vec<ResourceBody>,
}

#[derive(Debug, Deserialize)]
struct AuthorBody {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceBody {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    signing: Option<SigningInfoBody>,
}

#[derive(Debug, Deserialize)]
struct SigningInfoBody {
    signature: String,
    #[serde(rename = "signatureFormat")]
    signature_format: String,
}

#[derive(Debug, Deserialize)]
struct IdentifiersResponse {
    identifiers: Vec<String>,
}

impl RegistryClient {
    /// Starts building a client for the default configuration.
    #[must_use]
    pub fn builder(config: RegistryClientConfig) -> RegistryClientBuilder {
        RegistryClientBuilder::new(config)
    }

    fn registry_for_scope(&self, scope: &str) -> RegistryResult<&Registry> {
        self.registries.get(scope).ok_or_else(|| RegistryClientError::RegistryNotConfigured { scope: scope.to_string() })
    }

    fn auth_header(registry: &Registry) -> Option<HeaderValue> {
        match &registry.authentication_kind {
            AuthenticationKind::None => None,
            AuthenticationKind::Token { token } => HeaderValue::from_str(&format!("Bearer {token}")).ok(),
            AuthenticationKind::Basic { username, password } => {
                use base64::engine::general_purpose::STANDARD as BASE64;
                use base64::Engine;
                let encoded = BASE64.encode(format!("{username}:{password}"));
                HeaderValue::from_str(&format!("Basic {encoded}")).ok()
            }
        }
    }

    fn request_headers(registry: &Registry, accept: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::ACCEPT, HeaderValue::from_str(accept).unwrap_or(HeaderValue::from_static("*/*")));
        if let Some(auth) = Self::auth_header(registry) {
            headers.insert(AUTHORIZATION, auth);
        }
        headers
    }

    async fn guarded<T, F>(&self, fut: F) -> RegistryResult<T>
    where
        F: Future<Output = RegistryResult<T>>,
    {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(RegistryClientError::Cancelled),
            res = fut => res,
        }
    }

    /// Cancels every current and future operation on this client. Once
    /// cancelled, a client stays cancelled for the rest of its lifetime —
    /// build a new one to resume making requests.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// A snapshot of the availability gate's and metadata cache's
    /// hit/miss/entry counters.
    #[must_use]
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.availability_gate.stats(), self.metadata_cache.stats())
    }

    /// Drops every entry in both in-process TTL caches. Persisted
    /// fingerprint and signing-entity stores are untouched.
    pub fn clear_caches(&self) {
        self.availability_gate.clear();
        self.metadata_cache.clear();
    }

    /// Probes a registry's `/availability` endpoint, caching the result
    /// for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::AvailabilityCheckFailed`] if the
    /// probe itself could not be completed (distinct from the probe
    /// succeeding and reporting the registry unavailable, which is
    /// returned as `Ok(AvailabilityStatus::Unavailable)`).
    pub async fn check_availability(&self, registry_url: &str) -> RegistryResult<AvailabilityStatus> {
        self.guarded(self.check_availability_inner(registry_url)).await
    }

    async fn check_availability_inner(&self, registry_url: &str) -> RegistryResult<AvailabilityStatus> {
        if let Some(cached) = self.availability_gate.cached_status(registry_url) {
            return Ok(cached);
        }

        let builder = UrlBuilder::new(registry_url)?;
        let result: RegistryResult<AvailabilityStatus> = async {
            let response = self.http.get(builder.availability()).send().await?;
            Ok(match response.status() {
                StatusCode::OK => AvailabilityStatus::Available,
                StatusCode::NOT_FOUND | StatusCode::NOT_IMPLEMENTED => AvailabilityStatus::Unavailable,
                other => AvailabilityStatus::Error(format!("unexpected status {other}")),
            })
        }
        .await;

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                let status = AvailabilityStatus::Error(e.to_string());
                self.availability_gate.record(registry_url, status.clone());
                return Err(RegistryClientError::AvailabilityCheckFailed {
                    registry: registry_url.to_string(),
                    source: Box::new(e),
                });
            }
        };

        self.availability_gate.record(registry_url, status.clone());
        Ok(status)
    }

    /// Fails fast with [`RegistryClientError::RegistryNotAvailable`] if
    /// `registry` is known to be down. A cache hit is served as-is; a miss
    /// or expired entry triggers a fresh `/availability` probe rather than
    /// silently letting the caller through.
    async fn ensure_registry_available(&self, registry: &Registry) -> RegistryResult<()> {
        if !registry.supports_availability {
            return Ok(());
        }
        let status = match self.availability_gate.cached_status(&registry.url) {
            Some(status) => status,
            None => self.check_availability_inner(&registry.url).await?,
        };
        if matches!(status, AvailabilityStatus::Unavailable) {
            return Err(RegistryClientError::RegistryNotAvailable { registry: registry.url.clone() });
        }
        Ok(())
    }

    /// Lists every released version of `package`, following pagination to
    /// completion and merging alternate locations across pages.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::FailedRetrievingReleases`] wrapping
    /// the underlying cause.
    pub async fn get_package_metadata(&self, package: &PackageIdentity) -> RegistryResult<PackageMetadata> {
        self.guarded(self.get_package_metadata_inner(package)).await
    }

    async fn get_package_metadata_inner(&self, package: &PackageIdentity) -> RegistryResult<PackageMetadata> {
        let wrap = |source| RegistryClientError::FailedRetrievingReleases { package: package.clone(), source };
        self.get_package_metadata_uncached(package).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn get_package_metadata_uncached(&self, package: &PackageIdentity) -> RegistryResult<PackageMetadata> {
        let (scope, name) = package.resolve()?;
        let registry = self.registry_for_scope(scope)?;
        self.ensure_registry_available(registry).await?;

        if let Some(cached) = self.metadata_cache.get_package(&registry.url, scope, name) {
            debug!("metadata cache hit for {package}");
            return Ok(cached);
        }

        let builder = UrlBuilder::new(&registry.url)?;
        let mut url = builder.package_releases(scope, name);
        let mut versions: Vec<Version> = Vec::new();
        let mut alternate_locations: Vec<String> = Vec::new();
        let mut pages_followed = 0usize;

        loop {
            let headers = Self::request_headers(registry, SWIFT_JSON);
            let response = self.http.get(&url).headers(headers).send().await?;
            let status = response.status();
            let response_headers = response.headers().clone();
            let body = response.text().await?;

            classify_response(status, &body, &registry.url, &[StatusCode::OK])?;
            parse_content_version(&response_headers, &registry.url)?;
            parse_content_type(&response_headers, &registry.url, SWIFT_JSON)?;

            if let Some(alternate) = parse_link_header(&response_headers, LinkRelation::Alternate) {
                alternate_locations.push(alternate);
            }

            let parsed: ReleasesResponse = serde_json::from_str(&body)
                .map_err(|e| RegistryClientError::InvalidResponse { registry: registry.url.clone(), reason: e.to_string() })?;

            for (raw_version, entry) in parsed.releases {
                if entry.problem.is_some() {
                    warn!("skipping {package}@{raw_version}: registry reported a problem");
                    continue;
                }
                match Version::parse(&raw_version) {
                    Ok(version) => versions.push(version),
                    Err(e) => warn!("skipping unparsable version '{raw_version}' for {package}: {e}"),
                }
            }

            match parse_link_header(&response_headers, LinkRelation::Next) {
                Some(next) if pages_followed < self.config.max_pagination_pages => {
                    url = next;
                    pages_followed += 1;
                }
                Some(_) => {
                    warn!("stopped following pagination for {package}: exceeded max_pagination_pages");
                    break;
                }
                None => break,
            }
        }

        versions.sort();
        versions.dedup();
        versions.reverse();

        let metadata = PackageMetadata { registry: registry.url.clone(), versions, alternate_locations, next_page: None };
        self.metadata_cache.put_package(&registry.url, scope, name, metadata.clone());
        Ok(metadata)
    }

    /// Fetches metadata for a single release, resolving each resource's
    /// signing entity when signed (without gating on consent — this is a
    /// read, not a trust decision).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::FailedRetrievingReleaseInfo`]
    /// wrapping the underlying cause.
    pub async fn get_version_metadata(&self, package: &PackageIdentity, version: &str) -> RegistryResult<PackageVersionMetadata> {
        self.guarded(self.get_version_metadata_inner(package, version)).await
    }

    async fn get_version_metadata_inner(&self, package: &PackageIdentity, version: &str) -> RegistryResult<PackageVersionMetadata> {
        let wrap = |source| RegistryClientError::FailedRetrievingReleaseInfo { package: package.clone(), version: version.to_string(), source };
        self.get_version_metadata_uncached(package, version).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn get_version_metadata_uncached(&self, package: &PackageIdentity, version: &str) -> RegistryResult<PackageVersionMetadata> {
        let (scope, name) = package.resolve()?;
        let registry = self.registry_for_scope(scope)?;
        self.ensure_registry_available(registry).await?;

        if let Some(cached) = self.metadata_cache.get_version(&registry.url, scope, name, version) {
            debug!("metadata cache hit for {package}@{version}");
            return Ok(cached);
        }

        let builder = UrlBuilder::new(&registry.url)?;
        let url = builder.release_metadata(scope, name, version);
        let headers = Self::request_headers(registry, SWIFT_JSON);
        let response = self.http.get(&url).headers(headers).send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        classify_response(status, &body, &registry.url, &[StatusCode::OK])?;
        parse_content_version(&response_headers, &registry.url)?;
        parse_content_type(&response_headers, &registry.url, SWIFT_JSON)?;

        let parsed: VersionMetadataResponse = serde_json::from_str(&body)
            .map_err(|e| RegistryClientError::InvalidResponse { registry: registry.url.clone(), reason: e.to_string() })?;
        let body_metadata = parsed.metadata.unwrap_or_default();

        let mut resources = Vec::with_capacity(body_metadata.resources.len());
        for resource in body_metadata.resources {
            let signing_info = resource.signing.map(|s| SigningInfo { signature_base64: s.signature, signature_format: s.signature_format });

            // Entity-only extraction: no consent prompt, and a verification
            // failure degrades to `None` rather than failing the whole read.
            // The archive itself isn't fetched here, so the signature is
            // checked against the published checksum rather than content
            // bytes this call never downloads; the full trust pipeline
            // re-verifies against the real bytes during download.
            let signing_entity = match &signing_info {
                Some(signing) => self.signature_validator.extract_entity(resource.checksum.as_deref().unwrap_or_default().as_bytes(), signing).await.ok(),
                None => None,
            };

            resources.push(Resource { name: resource.name, kind: resource.kind, checksum: resource.checksum, signing: signing_info, signing_entity });
        }

        let metadata = PackageVersionMetadata {
            registry: registry.url.clone(),
            license_url: body_metadata.license_url,
            readme_url: body_metadata.readme_url,
            repository_urls: body_metadata.repository_urls,
            resources,
            author: body_metadata.author.and_then(|a| a.name),
            description: body_metadata.description,
            published_at: body_metadata.original_publication_time,
        };

        self.metadata_cache.put_version(&registry.url, scope, name, version, metadata.clone());
        Ok(metadata)
    }

    /// Lists the manifests available for a release (the unspecialized
    /// `Package.swift` plus any tools-version-specialized variants), along
    /// with each one's declared Swift tools version when the registry
    /// supplies it via `Link: rel="..."` metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::FailedRetrievingManifest`] wrapping
    /// the underlying cause.
    pub async fn get_available_manifests(&self, package: &PackageIdentity, version: &str) -> RegistryResult<ManifestListing> {
        self.guarded(self.get_available_manifests_inner(package, version)).await
    }

    async fn get_available_manifests_inner(&self, package: &PackageIdentity, version: &str) -> RegistryResult<ManifestListing> {
        let wrap = |source| RegistryClientError::FailedRetrievingManifest { package: package.clone(), version: version.to_string(), source };
        self.get_available_manifests_uncached(package, version).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn get_available_manifests_uncached(&self, package: &PackageIdentity, version: &str) -> RegistryResult<ManifestListing> {
        let (scope, name) = package.resolve()?;
        let registry = self.registry_for_scope(scope)?;
        self.ensure_registry_available(registry).await?;

        let version_metadata = self.get_version_metadata_uncached(package, version).await?;

        let builder = UrlBuilder::new(&registry.url)?;
        let url = builder.manifest(scope, name, version, None);
        let headers = Self::request_headers(registry, SWIFT_SWIFT);
        let response = self.http.get(&url).headers(headers).send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        classify_response(status, &body, &registry.url, &[StatusCode::OK])?;
        parse_content_version(&response_headers, &registry.url)?;
        parse_content_type(&response_headers, &registry.url, "text/x-swift")?;

        if let Some(manifest_resource) = version_metadata.manifest() {
            self.signature_validator
                .validate(package, version, &registry.url, SignedContentKind::Manifest, body.as_bytes(), manifest_resource.signing.as_ref())
                .await?;
            if let Some(checksum) = &manifest_resource.checksum {
                self.checksum_tofu
                    .validate(package, version, &registry.url, FingerprintKind::Manifest { tools_version: None }, body.as_bytes(), checksum)
                    .await?;
            }
        }

        let primary_tools_version = parse_primary_tools_version(&body);

        let mut listing = ManifestListing::new();
        listing.insert("Package.swift".to_string(), (body, primary_tools_version));

        for alternate in parse_link_header_all(&response_headers, LinkRelation::Alternate) {
            let Some(filename) = alternate.params.get("filename").cloned() else { continue };
            let Some(tools_version) = tools_version_from_filename(&filename) else { continue };

            let alt_url = builder.manifest(scope, name, version, Some(&tools_version));
            let alt_headers = Self::request_headers(registry, SWIFT_SWIFT);
            let alt_response = self.http.get(&alt_url).headers(alt_headers).send().await?;
            let alt_status = alt_response.status();
            let alt_body = alt_response.text().await?;
            classify_response(alt_status, &alt_body, &registry.url, &[StatusCode::OK])?;
            listing.insert(filename, (alt_body, Some(tools_version)));
        }

        Ok(listing)
    }

    /// Fetches the content of a single manifest, optionally the variant
    /// specialized to `tools_version`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::FailedRetrievingManifest`] wrapping
    /// the underlying cause.
    pub async fn get_manifest_content(&self, package: &PackageIdentity, version: &str, tools_version: Option<&str>) -> RegistryResult<String> {
        self.guarded(self.get_manifest_content_inner(package, version, tools_version)).await
    }

    async fn get_manifest_content_inner(&self, package: &PackageIdentity, version: &str, tools_version: Option<&str>) -> RegistryResult<String> {
        let wrap = |source| RegistryClientError::FailedRetrievingManifest { package: package.clone(), version: version.to_string(), source };
        self.get_manifest_content_uncached(package, version, tools_version).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn get_manifest_content_uncached(&self, package: &PackageIdentity, version: &str, tools_version: Option<&str>) -> RegistryResult<String> {
        let (scope, name) = package.resolve()?;
        let registry = self.registry_for_scope(scope)?;
        self.ensure_registry_available(registry).await?;

        let builder = UrlBuilder::new(&registry.url)?;
        let url = builder.manifest(scope, name, version, tools_version);
        let headers = Self::request_headers(registry, SWIFT_SWIFT);
        let response = self.http.get(&url).headers(headers).send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        classify_response(status, &body, &registry.url, &[StatusCode::OK])?;
        parse_content_version_optional(&response_headers, &registry.url)?;

        Ok(body)
    }

    /// Downloads, checksum-validates, signature-validates, and extracts a
    /// release's source archive to `destination`. The archive itself is
    /// streamed to `destination` with a `.zip` extension rather than
    /// buffered whole in memory, reporting each chunk to `progress` when
    /// supplied; the on-disk archive is deleted once extraction finishes,
    /// regardless of outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::FailedDownloadingSourceArchive`]
    /// wrapping the underlying cause.
    pub async fn download_source_archive(
        &self,
        package: &PackageIdentity,
        version: &str,
        destination: &Path,
        progress: Option<&dyn DownloadProgress>,
    ) -> RegistryResult<()> {
        self.guarded(self.download_source_archive_inner(package, version, destination, progress)).await
    }

    async fn download_source_archive_inner(
        &self,
        package: &PackageIdentity,
        version: &str,
        destination: &Path,
        progress: Option<&dyn DownloadProgress>,
    ) -> RegistryResult<()> {
        let wrap = |source| RegistryClientError::FailedDownloadingSourceArchive { package: package.clone(), version: version.to_string(), source };
        self.download_source_archive_uncached(package, version, destination, progress).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn download_source_archive_uncached(
        &self,
        package: &PackageIdentity,
        version: &str,
        destination: &Path,
        progress: Option<&dyn DownloadProgress>,
    ) -> RegistryResult<()> {
        let (scope, name) = package.resolve()?;
        let registry = self.registry_for_scope(scope)?;
        self.ensure_registry_available(registry).await?;

        if destination.exists() {
            return Err(RegistryClientError::PathAlreadyExists { path: destination.display().to_string() });
        }

        let version_metadata = self.get_version_metadata_uncached(package, version).await?;
        let resource = version_metadata
            .source_archive()
            .ok_or_else(|| RegistryClientError::SourceArchiveMissingChecksum { package: package.clone(), version: version.to_string() })?;
        let checksum = resource
            .checksum
            .clone()
            .ok_or_else(|| RegistryClientError::SourceArchiveMissingChecksum { package: package.clone(), version: version.to_string() })?;

        let builder = UrlBuilder::new(&registry.url)?;
        let url = builder.source_archive(scope, name, version);
        let headers = Self::request_headers(registry, SWIFT_ZIP);
        let response = self.http.get(&url).headers(headers).send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();

        let archive_path = archive_path_for(destination);
        let result = stream_to_file(response, &archive_path, progress).await;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = std::fs::remove_file(&archive_path);
                return Err(e);
            }
        };

        let outcome = async {
            classify_response(status, &String::from_utf8_lossy(&bytes), &registry.url, &[StatusCode::OK])?;
            parse_content_version_optional(&response_headers, &registry.url)?;

            let signing_entity = self
                .signature_validator
                .validate(package, version, &registry.url, SignedContentKind::SourceArchive, &bytes, resource.signing.as_ref())
                .await?;

            self.checksum_tofu
                .validate(package, version, &registry.url, FingerprintKind::SourceArchive, &bytes, &checksum)
                .await?;

            self.archiver.extract(&bytes, destination)?;

            let release_sidecar = ReleaseMetadataSidecar::new(&version_metadata, signing_entity);
            if let Err(e) = sidecar::write(destination, &release_sidecar) {
                let _ = std::fs::remove_dir_all(destination);
                return Err(e);
            }

            Ok(())
        }
        .await;

        let _ = std::fs::remove_file(&archive_path);
        outcome?;

        info!("downloaded and extracted source archive for {package}@{version}");
        Ok(())
    }

    /// Administratively overwrites the signing entity recorded for
    /// `package`@`version`, bypassing the change-detection checks that a
    /// normal download run enforces.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::Cancelled`] if the client has been
    /// cancelled.
    pub async fn change_signing_entity(
        &self,
        package: &PackageIdentity,
        version: &str,
        registry_url: &str,
        entity: SigningEntity,
        origin: &str,
    ) -> RegistryResult<()> {
        self.guarded(async {
            self.signature_validator.change_signing_entity(package, version, registry_url, entity, origin).await;
            Ok(())
        })
        .await
    }

    /// Looks up the package identities published under `scm_url`. Returns
    /// an empty vector (not an error) when the registry has no matching
    /// package.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::FailedIdentityLookup`] wrapping the
    /// underlying cause.
    pub async fn lookup_identities(&self, registry_url: &str, scm_url: &str) -> RegistryResult<Vec<PackageIdentity>> {
        self.guarded(self.lookup_identities_inner(registry_url, scm_url)).await
    }

    async fn lookup_identities_inner(&self, registry_url: &str, scm_url: &str) -> RegistryResult<Vec<PackageIdentity>> {
        let wrap = |source| RegistryClientError::FailedIdentityLookup { scm_url: scm_url.to_string(), source };
        self.lookup_identities_uncached(registry_url, scm_url).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn lookup_identities_uncached(&self, registry_url: &str, scm_url: &str) -> RegistryResult<Vec<PackageIdentity>> {
        let builder = UrlBuilder::new(registry_url)?;
        let url = builder.identifiers(scm_url);
        let response = self.http.get(&url).header(reqwest::header::ACCEPT, SWIFT_JSON).send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        classify_response(status, &body, registry_url, &[StatusCode::OK])?;
        parse_content_version(&response_headers, registry_url)?;

        let parsed: IdentifiersResponse =
            serde_json::from_str(&body).map_err(|e| RegistryClientError::InvalidResponse { registry: registry_url.to_string(), reason: e.to_string() })?;

        Ok(parsed
            .identifiers
            .into_iter()
            .filter_map(|id| {
                let (scope, name) = id.split_once('.')?;
                Some(PackageIdentity::registry_form(scope, name))
            })
            .collect())
    }

    /// Performs the registry's login handshake, validating that the
    /// configured credentials for `registry_url`'s scope are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::LoginFailed`] wrapping the
    /// underlying cause.
    pub async fn login(&self, scope: &str) -> RegistryResult<()> {
        self.guarded(self.login_inner(scope)).await
    }

    async fn login_inner(&self, scope: &str) -> RegistryResult<()> {
        let registry = self.registry_for_scope(scope)?.clone();
        let wrap = |source| RegistryClientError::LoginFailed { url: registry.url.clone(), source };
        self.login_uncached(&registry).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn login_uncached(&self, registry: &Registry) -> RegistryResult<()> {
        let builder = UrlBuilder::new(&registry.url)?;
        let headers = Self::request_headers(registry, SWIFT_JSON);
        let response = self.http.post(builder.login()).headers(headers).send().await?;
        let status = response.status();
        let body = response.text().await?;
        classify_response(status, &body, &registry.url, &[StatusCode::OK])
    }

    /// Publishes a release, returning whether the registry processed it
    /// synchronously or queued it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::FailedPublishing`] wrapping the
    /// underlying cause.
    pub async fn publish(&self, package: &PackageIdentity, version: &str, request: PublishRequest) -> RegistryResult<PublishResult> {
        self.guarded(self.publish_inner(package, version, request)).await
    }

    async fn publish_inner(&self, package: &PackageIdentity, version: &str, request: PublishRequest) -> RegistryResult<PublishResult> {
        let wrap = |source| RegistryClientError::FailedPublishing { package: package.clone(), version: version.to_string(), source };
        self.publish_uncached(package, version, request).await.map_err(|e| e.wrap_retrieval(wrap))
    }

    async fn publish_uncached(&self, package: &PackageIdentity, version: &str, request: PublishRequest) -> RegistryResult<PublishResult> {
        let (scope, name) = package.resolve()?;
        let registry = self.registry_for_scope(scope)?;
        self.ensure_registry_available(registry).await?;

        // A release is either fully signed or fully unsigned: signing only the
        // source archive (or only the metadata) would let a verifier trust one
        // half of the release without the other.
        if request.source_archive_signature.is_some() != request.metadata_signature.is_some() {
            return Err(RegistryClientError::MissingSignatureFormat);
        }

        let envelope = build_envelope(&request)?;

        let builder = UrlBuilder::new(&registry.url)?;
        let url = builder.publish(scope, name, version);
        let mut headers = Self::request_headers(registry, SWIFT_JSON);
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(&envelope.content_type).map_err(|e| RegistryClientError::InvalidUrl { url: url.clone(), reason: e.to_string() })?);

        let response = self.http.put(&url).headers(headers).body(envelope.body).send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        classify_response(status, &body, &registry.url, &[StatusCode::CREATED, StatusCode::ACCEPTED])?;

        let location = response_headers.get(reqwest::header::LOCATION).and_then(|v| v.to_str().ok()).map(str::to_string);

        info!("published {package}@{version} to {}", registry.url);

        match status {
            StatusCode::CREATED => Ok(PublishResult::Published { location }),
            StatusCode::ACCEPTED => location
                .map(|status_url| PublishResult::Processing { status_url })
                .ok_or_else(|| RegistryClientError::MissingPublishingLocation { registry: registry.url.clone() }),
            _ => unreachable!("classify_response only allows CREATED or ACCEPTED through"),
        }
    }
}

fn tools_version_from_filename(filename: &str) -> Option<String> {
    filename.strip_prefix("Package@swift-")?.strip_suffix(".swift").map(str::to_string)
}

/// The on-disk path the source archive is streamed to before extraction:
/// `destination` with a `.zip` extension appended, built via `OsString` to
/// stay correct for non-UTF8 paths.
fn archive_path_for(destination: &Path) -> PathBuf {
    let mut archive_name = OsString::from(destination.as_os_str());
    archive_name.push(".zip");
    PathBuf::from(archive_name)
}

/// Streams `response`'s body to `archive_path`, reporting cumulative bytes
/// to `progress` per chunk, and returns the body bytes accumulated along
/// the way (the downstream signature/checksum/extract APIs are byte-slice
/// based, so the bytes are kept in memory in addition to being written to
/// disk rather than read back afterward).
async fn stream_to_file(response: reqwest::Response, archive_path: &Path, progress: Option<&dyn DownloadProgress>) -> RegistryResult<bytes::Bytes> {
    let total = response.content_length();
    let mut downloaded = 0u64;
    let mut buffer = Vec::new();
    let mut file = tokio::fs::File::create(archive_path).await?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        buffer.extend_from_slice(&chunk);
        downloaded += chunk.len() as u64;
        if let Some(progress) = progress {
            progress.on_progress(downloaded, total);
        }
    }
    file.flush().await?;

    Ok(bytes::Bytes::from(buffer))
}

/// Extracts the tools-version declared by a manifest's leading
/// `// swift-tools-version:X.Y` comment, the only line `swift-package-
/// manager` itself requires to appear first in a `Package.swift`.
fn parse_primary_tools_version(manifest_content: &str) -> Option<String> {
    let first_line = manifest_content.lines().next()?;
    first_line.strip_prefix("// swift-tools-version:").map(|rest| rest.trim().to_string())
}

#[allow(clippy::unwrap_used)]
#[allow(clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RegistryClientConfig {
        RegistryClientConfig { availability_ttl: Duration::from_secs(60), metadata_ttl: Duration::from_secs(60), ..RegistryClientConfig::default() }
    }

    #[test]
    fn builder_requires_explicit_registry_registration() {
        let client = RegistryClientBuilder::new(test_config()).build().unwrap();
        let err = client.registry_for_scope("mona").unwrap_err();
        assert!(matches!(err, RegistryClientError::RegistryNotConfigured { .. }));
    }

    #[test]
    fn auth_header_is_none_without_credentials() {
        let registry = Registry::new("https://example.com");
        assert!(RegistryClient::auth_header(&registry).is_none());
    }

    #[test]
    fn auth_header_builds_bearer_token() {
        let registry = Registry::new("https://example.com").with_authentication(AuthenticationKind::Token { token: "abc".into() });
        let header = RegistryClient::auth_header(&registry).unwrap();
        assert_eq!(header.to_str().unwrap(), "Bearer abc");
    }

    #[test]
    fn tools_version_extraction() {
        assert_eq!(tools_version_from_filename("Package@swift-5.9.swift").as_deref(), Some("5.9"));
        assert_eq!(tools_version_from_filename("Package.swift"), None);
    }

    #[test]
    fn primary_tools_version_extraction() {
        assert_eq!(parse_primary_tools_version("// swift-tools-version:5.9\nimport PackageDescription").as_deref(), Some("5.9"));
        assert_eq!(parse_primary_tools_version("import PackageDescription"), None);
    }

    #[tokio::test]
    async fn cancel_fails_subsequent_operations() {
        let client = RegistryClientBuilder::new(test_config())
            .with_registry("mona", Registry::new("https://example.com"))
            .build()
            .unwrap();
        client.cancel();
        let err = client.check_availability("https://example.com").await.unwrap_err();
        assert!(matches!(err, RegistryClientError::Cancelled));
    }

    #[tokio::test]
    async fn publish_rejects_a_half_signed_release() {
        let client = RegistryClientBuilder::new(test_config())
            .with_registry("mona", Registry::new("https://example.com"))
            .build()
            .unwrap();
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let request = PublishRequest {
            source_archive: b"zip bytes".to_vec(),
            source_archive_signature: Some(SigningInfo { signature_base64: "c2ln".into(), signature_format: "cms-1.0.0".into() }),
            metadata_json: Some("{}".into()),
            metadata_signature: None,
        };

        let err = client.publish(&package, "1.0.0", request).await.unwrap_err();
        match err {
            RegistryClientError::FailedPublishing { source, .. } => {
                assert!(matches!(*source, RegistryClientError::MissingSignatureFormat));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
