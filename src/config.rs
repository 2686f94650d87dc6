//! Runtime configuration: a plain struct with a `Default` impl, not a
//! generic layered config-file loader — that belongs to the CLI tooling
//! built on top of this crate, not to a library embedded inside a package
//! manager. Callers construct [`RegistryClientConfig`] directly or
//! populate it from their own config layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::PolicyMode;

/// Tunables governing timeouts, cache lifetimes, and trust-mismatch
/// handling for a [`crate::client::RegistryClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryClientConfig {
    /// Timeout applied to every HTTP request.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// How long an availability probe result stays valid before the gate
    /// re-probes.
    #[serde(with = "duration_secs")]
    pub availability_ttl: Duration,
    /// How long cached package/version metadata stays valid before it is
    /// refetched.
    #[serde(with = "duration_secs")]
    pub metadata_ttl: Duration,
    /// How a checksum or signing-entity mismatch against a prior pin is
    /// handled: a hard error ([`PolicyMode::Strict`]) or a logged
    /// diagnostic that lets the operation proceed ([`PolicyMode::Warn`]).
    pub mismatch_policy: PolicyMode,
    /// Maximum pages `get_package_metadata` follows via the `Link: rel=
    /// "next"` header before giving up, guarding against a misbehaving
    /// registry serving an unbounded or circular page chain.
    pub max_pagination_pages: usize,
    /// Skips signature validation entirely when set, returning `None` from
    /// every [`crate::trust::SignatureValidator::validate`] call instead of
    /// verifying or prompting for consent. Intended for environments that
    /// enforce trust some other way (e.g. a vendored, already-audited
    /// mirror); defaults to `false` so signed content is verified normally.
    pub skip_signature_validation: bool,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            availability_ttl: Duration::from_secs(300),
            metadata_ttl: Duration::from_secs(3600),
            mismatch_policy: PolicyMode::Strict,
            max_pagination_pages: 100,
            skip_signature_validation: false,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_strict_policy() {
        let config = RegistryClientConfig::default();
        assert_eq!(config.mismatch_policy, PolicyMode::Strict);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.availability_ttl, Duration::from_secs(300));
        assert_eq!(config.metadata_ttl, Duration::from_secs(3600));
        assert!(!config.skip_signature_validation);
    }

    #[test]
    fn round_trips_through_json() {
        let config = RegistryClientConfig { mismatch_policy: PolicyMode::Warn, ..RegistryClientConfig::default() };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RegistryClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.mismatch_policy, PolicyMode::Warn);
        assert_eq!(parsed.max_pagination_pages, config.max_pagination_pages);
    }
}
