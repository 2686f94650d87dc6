//! # swift-registry-client
//!
//! **What**: a client library mediating between a Swift package manager
//! and one or more package registries implementing the registry server
//! API — release discovery, manifest retrieval, source archive download,
//! identity lookup, login, and publishing.
//!
//! **How**: a single [`client::RegistryClient`] facade, built via
//! [`client::RegistryClientBuilder`], wires together a URL builder, a
//! response classifier, two TTL caches (an availability gate and a
//! metadata cache), a consent-gated signature validator, a
//! signing-entity change detector, and a checksum trust-on-first-use
//! store. Collaborators that are genuinely registry- or
//! deployment-specific — the signature verification algorithm, the
//! persisted fingerprint/signing-entity stores, the consent UI — are
//! injected as traits with sensible in-memory or fail-closed defaults.
//!
//! **Why**: a package manager talking to a registry needs more than "send
//! a request, parse a response" — it needs to avoid hammering a known-down
//! registry, avoid silently trusting a package whose checksum or signer
//! just changed, and avoid re-prompting a user mid-operation for a
//! decision they already made. Centralizing that behavior here keeps it
//! out of the package manager's resolution and build logic, and out of
//! every registry-specific client that would otherwise reimplement it.

#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::panic)]

pub mod archive;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod http;
pub mod identity;
pub mod model;
pub mod progress;
pub mod publish;
pub mod sidecar;
pub mod storage;
pub mod trust;

pub use client::{RegistryClient, RegistryClientBuilder};
pub use config::RegistryClientConfig;
pub use error::{RegistryClientError, RegistryResult};
pub use identity::PackageIdentity;

/// The crate's own version, as recorded in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns [`VERSION`].
#[must_use]
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
