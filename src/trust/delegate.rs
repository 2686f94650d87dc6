//! The consent capability a caller plugs in to decide how unsigned or
//! untrusted content is handled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::identity::PackageIdentity;
use crate::model::SigningEntity;

/// Prompts for (or otherwise decides) consent when trust in a release
/// cannot be established automatically.
///
/// Both methods default to denying; a caller that wants interactive or
/// policy-driven consent overrides them. The crate calls each method at
/// most once per operation, memoizing the answer for the duration of that
/// operation's validation pipeline — it never re-prompts mid-flight.
#[async_trait]
pub trait ConsentDelegate: Send + Sync {
    /// Called when `package`@`version`'s source archive or manifest has no
    /// signature at all, on `registry`. Returning `true` proceeds without a
    /// signing entity; `false` fails the operation.
    async fn on_unsigned(&self, registry: &str, package: &PackageIdentity, version: &str) -> bool;

    /// Called when `package`@`version` is signed by `entity` on `registry`,
    /// but `entity` is [`SigningEntity::Unrecognized`] or differs from a
    /// previously trusted entity for this package. Returning `true`
    /// proceeds and trusts `entity` going forward; `false` fails the
    /// operation.
    async fn on_untrusted(&self, registry: &str, package: &PackageIdentity, version: &str, entity: &SigningEntity) -> bool;
}

/// The default [`ConsentDelegate`]: denies every unsigned or untrusted
/// release, so an absent delegate fails closed rather than silently
/// trusting.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl ConsentDelegate for DenyAll {
    async fn on_unsigned(&self, _registry: &str, _package: &PackageIdentity, _version: &str) -> bool {
        false
    }

    async fn on_untrusted(&self, _registry: &str, _package: &PackageIdentity, _version: &str, _entity: &SigningEntity) -> bool {
        false
    }
}

#[async_trait]
impl ConsentDelegate for Arc<dyn ConsentDelegate> {
    async fn on_unsigned(&self, registry: &str, package: &PackageIdentity, version: &str) -> bool {
        (**self).on_unsigned(registry, package, version).await
    }

    async fn on_untrusted(&self, registry: &str, package: &PackageIdentity, version: &str, entity: &SigningEntity) -> bool {
        (**self).on_untrusted(registry, package, version, entity).await
    }
}

/// Wraps a [`ConsentDelegate`], caching each of its answers per
/// `(registry, package, version)` so a single registry operation that
/// validates more than one signed resource for the same release prompts
/// at most once per question, instead of re-asking for every resource.
///
/// Concurrent first-time prompts for the same key are tolerated and may
/// race on cache insert — redundant prompting is acceptable, a missed one
/// is not.
pub struct MemoizingConsentDelegate<D> {
    inner: D,
    unsigned_answers: Mutex<HashMap<String, bool>>,
    untrusted_answers: Mutex<HashMap<String, bool>>,
}

impl<D> MemoizingConsentDelegate<D> {
    /// Wraps `inner`, starting with an empty memoization cache.
    #[must_use]
    pub fn new(inner: D) -> Self {
        Self { inner, unsigned_answers: Mutex::new(HashMap::new()), untrusted_answers: Mutex::new(HashMap::new()) }
    }

    fn key(registry: &str, package: &PackageIdentity, version: &str) -> String {
        format!("{registry}|{package}@{version}")
    }
}

#[async_trait]
impl<D: ConsentDelegate> ConsentDelegate for MemoizingConsentDelegate<D> {
    async fn on_unsigned(&self, registry: &str, package: &PackageIdentity, version: &str) -> bool {
        let key = Self::key(registry, package, version);
        if let Some(answer) = self.unsigned_answers.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
            return *answer;
        }
        let answer = self.inner.on_unsigned(registry, package, version).await;
        self.unsigned_answers.lock().unwrap_or_else(|e| e.into_inner()).insert(key, answer);
        answer
    }

    async fn on_untrusted(&self, registry: &str, package: &PackageIdentity, version: &str, entity: &SigningEntity) -> bool {
        let key = Self::key(registry, package, version);
        if let Some(answer) = self.untrusted_answers.lock().unwrap_or_else(|e| e.into_inner()).get(&key) {
            return *answer;
        }
        let answer = self.inner.on_untrusted(registry, package, version, entity).await;
        self.untrusted_answers.lock().unwrap_or_else(|e| e.into_inner()).insert(key, answer);
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deny_all_denies_unsigned() {
        let delegate = DenyAll;
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        assert!(!delegate.on_unsigned("https://example.com", &package, "1.0.0").await);
    }

    #[tokio::test]
    async fn deny_all_denies_untrusted() {
        let delegate = DenyAll;
        let package = PackageIdentity::registry_form("mona", "LinkedList");
        let entity = SigningEntity::Unrecognized { name: None, email: None, organization: None };
        assert!(!delegate.on_untrusted("https://example.com", &package, "1.0.0", &entity).await);
    }

    struct CountingDelegate {
        unsigned_calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ConsentDelegate for CountingDelegate {
        async fn on_unsigned(&self, _registry: &str, _package: &PackageIdentity, _version: &str) -> bool {
            self.unsigned_calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            true
        }
        async fn on_untrusted(&self, _registry: &str, _package: &PackageIdentity, _version: &str, _entity: &SigningEntity) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn memoizes_repeated_prompts_for_the_same_release() {
        let delegate = MemoizingConsentDelegate::new(CountingDelegate { unsigned_calls: std::sync::atomic::AtomicUsize::new(0) });
        let package = PackageIdentity::registry_form("mona", "LinkedList");

        assert!(delegate.on_unsigned("https://example.com", &package, "1.0.0").await);
        assert!(delegate.on_unsigned("https://example.com", &package, "1.0.0").await);
        assert!(delegate.on_unsigned("https://example.com", &package, "2.0.0").await);

        assert_eq!(delegate.inner.unsigned_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn memoization_key_distinguishes_registries() {
        let delegate = MemoizingConsentDelegate::new(CountingDelegate { unsigned_calls: std::sync::atomic::AtomicUsize::new(0) });
        let package = PackageIdentity::registry_form("mona", "LinkedList");

        assert!(delegate.on_unsigned("https://a.example.com", &package, "1.0.0").await);
        assert!(delegate.on_unsigned("https://b.example.com", &package, "1.0.0").await);

        assert_eq!(delegate.inner.unsigned_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
