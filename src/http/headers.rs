//! Parsing of the registry's three load-bearing response headers:
//! `Content-Version`, `Content-Type`, and `Link`.

use reqwest::header::HeaderMap;

use crate::error::{RegistryClientError, RegistryResult};

/// The registry's required protocol version. Every JSON response must
/// carry `Content-Version: 1`.
pub const SUPPORTED_CONTENT_VERSION: &str = "1";

/// Validates the `Content-Version` header against
/// [`SUPPORTED_CONTENT_VERSION`].
///
/// # Errors
///
/// Returns [`RegistryClientError::InvalidContentVersion`] if the header is
/// absent, not valid UTF-8, or not equal to `"1"`.
pub fn parse_content_version(headers: &HeaderMap, registry: &str) -> RegistryResult<()> {
    let actual = headers
        .get("Content-Version")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if actual.as_deref() == Some(SUPPORTED_CONTENT_VERSION) {
        Ok(())
    } else {
        Err(RegistryClientError::InvalidContentVersion { registry: registry.to_string(), actual })
    }
}

/// Validates the `Content-Version` header against
/// [`SUPPORTED_CONTENT_VERSION`] only when present; an absent header is
/// not an error. Used on the manifest-content and source-archive
/// responses, where `spec.md` marks the header optional rather than
/// required.
///
/// # Errors
///
/// Returns [`RegistryClientError::InvalidContentVersion`] if the header
/// is present but not valid UTF-8 or not equal to `"1"`.
pub fn parse_content_version_optional(headers: &HeaderMap, registry: &str) -> RegistryResult<()> {
    match headers.get("Content-Version") {
        None => Ok(()),
        Some(_) => parse_content_version(headers, registry),
    }
}

/// Validates the `Content-Type` header equals `expected`, ignoring
/// parameters (e.g. `; charset=utf-8`).
///
/// # Errors
///
/// Returns [`RegistryClientError::InvalidContentType`] if the header is
/// absent or its media type (before any `;`) does not match `expected`.
pub fn parse_content_type(headers: &HeaderMap, registry: &str, expected: &str) -> RegistryResult<()> {
    let actual = headers.get(reqwest::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    let media_type = actual.split(';').next().unwrap_or("").trim();
    if media_type == expected {
        Ok(())
    } else {
        Err(RegistryClientError::InvalidContentType {
            registry: registry.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// A relation named in a `Link` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRelation {
    /// `rel="next"` — the next page of a paginated listing.
    Next,
    /// `rel="latest-version"` — the latest release of a package.
    LatestVersion,
    /// `rel="successor-version"` — the release that deprecates this one.
    SuccessorVersion,
    /// `rel="canonical"` — the canonical location of this resource.
    Canonical,
    /// `rel="alternate"` — an alternate source location for this package.
    Alternate,
}

impl LinkRelation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "next" => Some(Self::Next),
            "latest-version" => Some(Self::LatestVersion),
            "successor-version" => Some(Self::SuccessorVersion),
            "canonical" => Some(Self::Canonical),
            "alternate" => Some(Self::Alternate),
            _ => None,
        }
    }
}

/// A single parsed `Link` header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    /// The entry's target URL.
    pub url: String,
    /// Any parameters beyond `rel`, e.g. `filename` or
    /// `swift-tools-version`, keyed by parameter name.
    pub params: std::collections::HashMap<String, String>,
}

fn parse_link_entries(headers: &HeaderMap) -> Vec<(LinkRelation, LinkEntry)> {
    let Some(raw) = headers.get(reqwest::header::LINK).and_then(|v| v.to_str().ok()) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for entry in raw.split(',') {
        let mut parts = entry.split(';');
        let Some(url_part) = parts.next().map(str::trim) else { continue };
        let Some(url) = url_part.strip_prefix('<').and_then(|s| s.strip_suffix('>')) else { continue };

        let mut relation = None;
        let mut params = std::collections::HashMap::new();
        for param in parts {
            let Some((key, value)) = param.trim().split_once('=') else { continue };
            let value = value.trim_matches('"');
            if key == "rel" {
                relation = LinkRelation::parse(value);
            } else {
                params.insert(key.to_string(), value.to_string());
            }
        }

        if let Some(relation) = relation {
            entries.push((relation, LinkEntry { url: url.to_string(), params }));
        }
    }
    entries
}

/// Parses a `Link` header's comma-separated `<url>; rel="..."` entries,
/// returning the URL registered for `relation`, if any.
///
/// Unknown relations and malformed entries are ignored rather than
/// rejected, since a registry may legally include relations this client
/// does not act on. When more than one entry uses the same relation (as
/// `alternate` commonly does), use [`parse_link_header_all`] instead.
#[must_use]
pub fn parse_link_header(headers: &HeaderMap, relation: LinkRelation) -> Option<String> {
    parse_link_entries(headers).into_iter().find(|(r, _)| *r == relation).map(|(_, entry)| entry.url)
}

/// Parses every `Link` header entry registered for `relation`, preserving
/// each entry's additional parameters (`filename`, `swift-tools-version`,
/// etc.).
#[must_use]
pub fn parse_link_header_all(headers: &HeaderMap, relation: LinkRelation) -> Vec<LinkEntry> {
    parse_link_entries(headers).into_iter().filter(|(r, _)| *r == relation).map(|(_, entry)| entry).collect()
}
