//! Reads and writes the `registry-release-metadata` sidecar that
//! [`crate::client::RegistryClient::download_source_archive`] leaves at
//! the root of every extracted source archive.

use std::fs;
use std::path::Path;

use crate::error::{RegistryClientError, RegistryResult};
use crate::model::{ReleaseMetadataSidecar, RELEASE_METADATA_SIDECAR_FILENAME};

/// Serializes `sidecar` as pretty JSON under `destination`.
///
/// # Errors
///
/// Returns [`RegistryClientError::FailedLoadingPackageMetadata`] if the
/// value cannot be serialized or the file cannot be written.
pub fn write(destination: &Path, sidecar: &ReleaseMetadataSidecar) -> RegistryResult<()> {
    let body = serde_json::to_string_pretty(sidecar)
        .map_err(|e| RegistryClientError::FailedLoadingPackageMetadata { reason: e.to_string() })?;
    fs::write(destination.join(RELEASE_METADATA_SIDECAR_FILENAME), body)
        .map_err(|e| RegistryClientError::FailedLoadingPackageMetadata { reason: e.to_string() })
}

/// Reads and deserializes the sidecar previously written under
/// `source_tree` by [`write`].
///
/// # Errors
///
/// Returns [`RegistryClientError::FailedLoadingPackageMetadata`] if the
/// file is missing, unreadable, or not valid JSON matching
/// [`ReleaseMetadataSidecar`].
pub fn read(source_tree: &Path) -> RegistryResult<ReleaseMetadataSidecar> {
    let body = fs::read_to_string(source_tree.join(RELEASE_METADATA_SIDECAR_FILENAME))
        .map_err(|e| RegistryClientError::FailedLoadingPackageMetadata { reason: e.to_string() })?;
    serde_json::from_str(&body).map_err(|e| RegistryClientError::FailedLoadingPackageMetadata { reason: e.to_string() })
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::model::{PackageVersionMetadata, SigningEntity};

    fn sample() -> ReleaseMetadataSidecar {
        let version_metadata = PackageVersionMetadata {
            registry: "https://example.com".into(),
            license_url: Some("https://example.com/LICENSE".into()),
            readme_url: None,
            repository_urls: Some(vec!["https://github.com/mona/LinkedList".into()]),
            resources: Vec::new(),
            author: Some("Mona".into()),
            description: Some("A linked list".into()),
            published_at: None,
        };
        ReleaseMetadataSidecar::new(
            &version_metadata,
            Some(SigningEntity::Recognized {
                certificate_type: "adp".into(),
                name: "Mona".into(),
                organizational_unit: "Engineering".into(),
                organization: "Octo Corp".into(),
            }),
        )
    }

    #[test]
    fn recognized_entity_round_trips() {
        let dir = tempdir().unwrap();
        let sidecar = sample();

        write(dir.path(), &sidecar).unwrap();
        let read_back = read(dir.path()).unwrap();

        assert_eq!(read_back, sidecar);
    }

    #[test]
    fn unrecognized_entity_round_trips() {
        let dir = tempdir().unwrap();
        let version_metadata = PackageVersionMetadata {
            registry: "https://example.com".into(),
            license_url: None,
            readme_url: None,
            repository_urls: None,
            resources: Vec::new(),
            author: None,
            description: None,
            published_at: None,
        };
        let sidecar = ReleaseMetadataSidecar::new(
            &version_metadata,
            Some(SigningEntity::Unrecognized { name: Some("Eve".into()), email: None, organization: None }),
        );

        write(dir.path(), &sidecar).unwrap();
        let read_back = read(dir.path()).unwrap();

        assert_eq!(read_back, sidecar);
    }

    #[test]
    fn missing_sidecar_is_a_typed_error() {
        let dir = tempdir().unwrap();
        let err = read(dir.path()).unwrap_err();
        assert!(matches!(err, RegistryClientError::FailedLoadingPackageMetadata { .. }));
    }
}
