//! Credential cache keyed by request target.
//!
//! After a successful payment the client stores the full `Authorization` value for the
//! target URL and attaches it to later requests for the same target, so one payment
//! covers repeated access. The cache is shared across all clones of a client through
//! `Arc<DashMap>`. There is no expiry and no eviction: an entry lives until it is
//! replaced, removed, or the cache is cleared.

use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent map from target URL to `Authorization` header value.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    entries: Arc<DashMap<String, String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached credential for `target`, if any.
    pub fn get(&self, target: &str) -> Option<String> {
        // Clone out so the shard lock is not held by the caller.
        self.entries.get(target).map(|entry| entry.value().clone())
    }

    /// Stores `authorization` for `target`, replacing any previous credential.
    pub fn insert(&self, target: impl Into<String>, authorization: impl Into<String>) {
        self.entries.insert(target.into(), authorization.into());
    }

    pub fn remove(&self, target: &str) -> Option<String> {
        self.entries.remove(target).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
