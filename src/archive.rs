//! Source archive extraction, injectable so the ZIP implementation itself
//! stays out of the core while still shipping a concrete default, the way
//! a registry client downloading `.tgz`/`.zip` archives ships a concrete
//! extractor inline rather than leaving extraction fully abstract.

use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use crate::error::{RegistryClientError, RegistryResult};

/// Extracts a downloaded source archive onto the filesystem.
pub trait SourceArchiver: Send + Sync {
    /// Extracts `bytes` (a complete archive) into `destination`, which
    /// must not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::PathAlreadyExists`] if `destination`
    /// exists, or [`RegistryClientError::InvalidSourceArchive`] if the
    /// archive contains path traversal entries or fails to decode.
    fn extract(&self, bytes: &[u8], destination: &Path) -> RegistryResult<()>;
}

/// The default [`SourceArchiver`]: a plain ZIP extractor.
///
/// Swift package registry source archives wrap their content in a single
/// top-level directory (`{scope}.{name}/`); that wrapper is stripped so
/// `destination` directly contains the package's `Package.swift` and
/// sources, matching `swift-package-manager`'s own archive layout
/// convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl SourceArchiver for ZipArchiver {
    fn extract(&self, bytes: &[u8], destination: &Path) -> RegistryResult<()> {
        if destination.exists() {
            return Err(RegistryClientError::PathAlreadyExists { path: destination.display().to_string() });
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

        let top_level_dir = detect_top_level_dir(&mut archive)?;

        fs::create_dir_all(destination)?;

        let mut visited: HashSet<PathBuf> = HashSet::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let Some(raw_path) = entry.enclosed_name() else {
                return Err(RegistryClientError::InvalidSourceArchive {
                    package: crate::identity::PackageIdentity::plain("<unknown>"),
                    version: "<unknown>".to_string(),
                    reason: format!("archive entry '{}' has an unsafe path", entry.name()),
                });
            };

            let relative = match &top_level_dir {
                Some(prefix) => match raw_path.strip_prefix(prefix) {
                    Ok(stripped) => stripped.to_path_buf(),
                    Err(_) => raw_path,
                },
                None => raw_path,
            };

            if relative.as_os_str().is_empty() {
                continue;
            }

            reject_traversal(&relative)?;

            let out_path: PathBuf = destination.join(&relative);

            if !entry.is_dir() && !visited.insert(out_path.clone()) {
                return Err(RegistryClientError::InvalidSourceArchive {
                    package: crate::identity::PackageIdentity::plain("<unknown>"),
                    version: "<unknown>".to_string(),
                    reason: format!("archive entry '{}' collides with a previously extracted path", entry.name()),
                });
            }

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
            } else {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out_file = fs::File::create(&out_path)?;
                std::io::copy(&mut entry, &mut out_file)?;
            }
        }

        Ok(())
    }
}

fn reject_traversal(path: &Path) -> RegistryResult<()> {
    if path.components().any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))) {
        return Err(RegistryClientError::InvalidSourceArchive {
            package: crate::identity::PackageIdentity::plain("<unknown>"),
            version: "<unknown>".to_string(),
            reason: format!("archive entry '{}' escapes the destination directory", path.display()),
        });
    }
    Ok(())
}

/// Returns the archive's single shared top-level directory component, if
/// every entry is nested under one.
fn detect_top_level_dir(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> RegistryResult<Option<PathBuf>> {
    let mut shared_prefix: Option<PathBuf> = None;

    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let Some(path) = entry.enclosed_name() else {
            continue;
        };
        let Some(Component::Normal(first)) = path.components().next() else {
            return Ok(None);
        };
        let first = PathBuf::from(first);
        match &shared_prefix {
            None => shared_prefix = Some(first),
            Some(existing) if existing == &first => {}
            Some(_) => return Ok(None),
        }
    }

    Ok(shared_prefix)
}
