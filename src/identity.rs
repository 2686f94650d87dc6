//! Package identity resolution.
//!
//! `PackageIdentity`'s "registry form" is a lexically validated `(scope,
//! name)` pair. Scope and name validation is an upstream collaborator's
//! job — this module accepts the pair as given and only rejects
//! structurally impossible forms (empty components), treating scope
//! validation as a thin, separate concern from identity resolution.

use std::fmt;

use crate::error::{RegistryClientError, RegistryResult};

/// A package identity as understood by the registry client.
///
/// Most callers construct packages directly in their registry-qualified
/// form. The `Plain` variant exists for identities sourced from a
/// non-registry context (e.g. a local manifest dependency) that must be
/// resolved before any registry operation can use them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageIdentity {
    /// A scope/name pair already known to be registry-qualified.
    Registry {
        /// The package's scope (e.g. an organization or user name).
        scope: String,
        /// The package's name within its scope.
        name: String,
    },
    /// An identity that has not yet been resolved to a registry form.
    Plain(String),
}

impl PackageIdentity {
    /// Builds a registry-form identity directly.
    #[must_use]
    pub fn registry_form(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Registry { scope: scope.into(), name: name.into() }
    }

    /// Builds an unresolved identity from a plain string.
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    /// Resolves this identity to a `(scope, name)` registry form.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryClientError::InvalidPackageIdentity`] when the
    /// identity is not already registry-qualified, or when a registry-form
    /// identity has an empty scope or name.
    pub fn resolve(&self) -> RegistryResult<(&str, &str)> {
        match self {
            Self::Registry { scope, name } => {
                if scope.is_empty() || name.is_empty() {
                    return Err(RegistryClientError::InvalidPackageIdentity {
                        reason: "scope and name must both be non-empty".into(),
                    });
                }
                Ok((scope.as_str(), name.as_str()))
            }
            Self::Plain(value) => Err(RegistryClientError::InvalidPackageIdentity {
                reason: format!("'{value}' is not registry-qualified"),
            }),
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry { scope, name } => write!(f, "{scope}.{name}"),
            Self::Plain(value) => write!(f, "{value}"),
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_form_resolves() {
        let id = PackageIdentity::registry_form("mona", "LinkedList");
        assert_eq!(id.resolve().unwrap(), ("mona", "LinkedList"));
        assert_eq!(id.to_string(), "mona.LinkedList");
    }

    #[test]
    fn plain_identity_fails_to_resolve() {
        let id = PackageIdentity::plain("LinkedList");
        let err = id.resolve().unwrap_err();
        assert!(matches!(err, RegistryClientError::InvalidPackageIdentity { .. }));
    }

    #[test]
    fn empty_components_are_rejected() {
        let id = PackageIdentity::registry_form("", "LinkedList");
        assert!(id.resolve().is_err());
    }
}
