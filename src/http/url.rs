//! URL construction for the registry's fixed endpoint shapes.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{RegistryClientError, RegistryResult};

/// Characters that must be percent-encoded within a single path segment,
/// beyond the base `CONTROLS` set: the path separator itself plus the
/// reserved/unsafe characters RFC 3986 §3.3 excludes from `pchar`.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Builds registry request URLs from a base URL and path components.
///
/// Mirrors the SwiftPM registry API's endpoint layout: every path is rooted
/// at the registry base URL with no trailing slash, and scope/name/version
/// segments are percent-encoded individually rather than joined and encoded
/// as a whole, so a literal `/` in a version string can never be mistaken
/// for a path separator.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base_url: String,
}

impl UrlBuilder {
    /// Builds a `UrlBuilder` rooted at `base_url`, stripping any trailing
    /// slash.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::InvalidUrl`] if `base_url` is not a
    /// valid absolute URL.
    pub fn new(base_url: &str) -> RegistryResult<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| RegistryClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !parsed.scheme().starts_with("http") {
            return Err(RegistryClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let trimmed = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url: trimmed })
    }

    /// The registry's base URL, with no trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn segment(raw: &str) -> String {
        utf8_percent_encode(raw, PATH_SEGMENT).to_string()
    }

    /// `GET /{scope}/{name}` — list package releases.
    #[must_use]
    pub fn package_releases(&self, scope: &str, name: &str) -> String {
        format!("{}/{}/{}", self.base_url, Self::segment(scope), Self::segment(name))
    }

    /// `GET /{scope}/{name}/{version}` — release metadata.
    #[must_use]
    pub fn release_metadata(&self, scope: &str, name: &str, version: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            Self::segment(scope),
            Self::segment(name),
            Self::segment(version)
        )
    }

    /// `GET /{scope}/{name}/{version}/Package.swift[?swift-version=X]` —
    /// manifest content. The endpoint path never changes shape for a
    /// tools-version-specialized variant; the variant is requested via the
    /// `swift-version` query parameter, not a different path segment (that
    /// `Package@swift-X.swift` form only ever appears as a `Link` header's
    /// `filename=` attribute, never as a real URL).
    #[must_use]
    pub fn manifest(&self, scope: &str, name: &str, version: &str, tools_version: Option<&str>) -> String {
        let base = format!(
            "{}/{}/{}/{}/Package.swift",
            self.base_url,
            Self::segment(scope),
            Self::segment(name),
            Self::segment(version)
        );
        match tools_version {
            Some(tv) => {
                let query: String = url::form_urlencoded::Serializer::new(String::new()).append_pair("swift-version", tv).finish();
                format!("{base}?{query}")
            }
            None => base,
        }
    }

    /// `GET /{scope}/{name}/{version}.zip` — source archive download.
    #[must_use]
    pub fn source_archive(&self, scope: &str, name: &str, version: &str) -> String {
        format!(
            "{}/{}/{}/{}.zip",
            self.base_url,
            Self::segment(scope),
            Self::segment(name),
            Self::segment(version)
        )
    }

    /// `GET /identifiers?url={url}` — package identifier lookup.
    #[must_use]
    pub fn identifiers(&self, scm_url: &str) -> String {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", scm_url)
            .finish();
        format!("{}/identifiers?{}", self.base_url, encoded)
    }

    /// `PUT /{scope}/{name}/{version}` — publish.
    #[must_use]
    pub fn publish(&self, scope: &str, name: &str, version: &str) -> String {
        self.release_metadata(scope, name, version)
    }

    /// `GET /availability` — the registry availability probe.
    #[must_use]
    pub fn availability(&self) -> String {
        format!("{}/availability", self.base_url)
    }

    /// `POST /login` — the registry login flow.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}/login", self.base_url)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> UrlBuilder {
        UrlBuilder::new("https://packages.example.com").unwrap()
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(UrlBuilder::new("ftp://packages.example.com").is_err());
    }

    #[test]
    fn strips_trailing_slash() {
        let b = UrlBuilder::new("https://packages.example.com/").unwrap();
        assert_eq!(b.base_url(), "https://packages.example.com");
    }

    #[test]
    fn package_releases_url() {
        assert_eq!(
            builder().package_releases("mona", "LinkedList"),
            "https://packages.example.com/mona/LinkedList"
        );
    }

    #[test]
    fn manifest_url_with_tools_version() {
        assert_eq!(
            builder().manifest("mona", "LinkedList", "1.1.1", Some("5.9")),
            "https://packages.example.com/mona/LinkedList/1.1.1/Package.swift?swift-version=5.9"
        );
    }

    #[test]
    fn manifest_url_without_tools_version() {
        assert_eq!(
            builder().manifest("mona", "LinkedList", "1.1.1", None),
            "https://packages.example.com/mona/LinkedList/1.1.1/Package.swift"
        );
    }

    #[test]
    fn source_archive_url() {
        assert_eq!(
            builder().source_archive("mona", "LinkedList", "1.1.1"),
            "https://packages.example.com/mona/LinkedList/1.1.1.zip"
        );
    }

    #[test]
    fn identifiers_url_encodes_query() {
        let url = builder().identifiers("https://github.com/mona/LinkedList");
        assert_eq!(
            url,
            "https://packages.example.com/identifiers?url=https%3A%2F%2Fgithub.com%2Fmona%2FLinkedList"
        );
    }

    #[test]
    fn segments_are_individually_encoded() {
        let url = builder().release_metadata("mona", "Linked List", "1.0.0");
        assert_eq!(url, "https://packages.example.com/mona/Linked%20List/1.0.0");
    }
}
