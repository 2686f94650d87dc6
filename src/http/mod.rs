//! HTTP plumbing: URL construction, header parsing, and response
//! classification.
//!
//! Request-building helpers generalized to the SwiftPM registry API
//! surface.

mod classifier;
mod headers;
mod url;

pub use classifier::classify_response;
pub use headers::{
    parse_content_type, parse_content_version, parse_content_version_optional, parse_link_header, parse_link_header_all, LinkEntry,
    LinkRelation,
};
pub use url::UrlBuilder;
