//! A single TTL-checked cache slot.
//!
//! A timestamped value checked against an externally-supplied TTL, rather
//! than carrying its own expiry time, so one TTL setting governs every
//! entry in a cache.

use std::time::{Duration, Instant};

/// A cached value paired with the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    data: T,
    timestamp: Instant,
}

impl<T: Clone> CacheEntry<T> {
    /// Wraps `data`, stamping it with the current instant.
    pub fn new(data: T) -> Self {
        Self { data, timestamp: Instant::now() }
    }

    /// `true` if this entry is still within `ttl` of when it was stored.
    #[must_use]
    pub fn is_valid(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }

    /// Clones the wrapped value out of the entry.
    #[must_use]
    pub fn get(&self) -> T {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;

    #[test]
    fn fresh_entry_is_valid() {
        let entry = CacheEntry::new(42);
        assert!(entry.is_valid(Duration::from_secs(60)));
        assert_eq!(entry.get(), 42);
    }

    #[test]
    fn stale_entry_is_invalid() {
        let entry = CacheEntry::new("value".to_string());
        sleep(Duration::from_millis(5));
        assert!(!entry.is_valid(Duration::from_millis(1)));
    }
}
