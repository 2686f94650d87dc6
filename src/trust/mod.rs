//! Trust verification: consent-gated signature validation, signing-entity
//! change detection, and checksum trust-on-first-use.

mod checksum;
mod delegate;
mod signature;
mod signing_entity;

pub use checksum::ChecksumTofu;
pub use delegate::{ConsentDelegate, DenyAll, MemoizingConsentDelegate};
pub use signature::{SignatureValidator, SignatureVerifier, SignedContentKind};
pub use signing_entity::SigningEntityStore;
