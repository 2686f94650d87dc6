//! The checksum hash primitive, injectable so low-level crypto stays out
//! of the core.

use sha2::{Digest, Sha256};

/// Computes a hex-encoded digest over arbitrary bytes.
///
/// Implementations must be deterministic and side-effect free; the crate
/// calls this both to compute fresh checksums for TOFU comparison and,
/// indirectly through [`crate::trust::ChecksumTofu`], to validate them.
pub trait ChecksumHasher: Send + Sync {
    /// Returns the lowercase hex digest of `bytes`.
    fn digest(&self, bytes: &[u8]) -> String;
}

/// The default [`ChecksumHasher`]: SHA-256, matching the checksum format
/// Swift package registries publish (`swift-tools-support-core`'s
/// `Checksum` type uses SHA-256 exclusively).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ChecksumHasher for Sha256Hasher {
    fn digest(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}
