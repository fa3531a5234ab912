//! The process-wide half of the two-level permission cache.
//!
//! Level 1 is a plain per-request map living inside
//! [`RequestScope`](super::RequestScope). Level 2 is whatever sits behind
//! the [`CacheBackend`] trait: the bundled in-process [`MemoryCache`], a
//! networked cache the host wires up, or nothing at all. Level 2 is strictly
//! best-effort: every failure degrades to recomputation, never to an error.

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::model::{Key, RightValue};


/// Cache key: one entry per user and context. No entry ever spans users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub user: Key,
    /// `None` is the Global Context.
    pub context: Option<Key>,
}

/// A cached rights map, stamped with the permissions version that was
/// current when it was computed. The entry is usable exactly as long as the
/// global counter still has that value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: i64,
    pub rights: HashMap<String, RightValue>,
}

impl CacheEntry {
    pub fn is_fresh(&self, current_version: i64) -> bool {
        self.version == current_version
    }
}

/// Error type of cache backends. Only ever logged; a failing backend makes
/// the engine recompute, nothing more.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CacheError(pub String);

/// A process-wide (or wider) store for resolved permission maps.
///
/// Implementations must round-trip entries faithfully, in particular the
/// version stamp and the distinction between boolean and range values.
/// Whether that means keeping values in memory or serializing them over a
/// wire is up to the backend.
pub trait CacheBackend: Send + Sync {
    fn fetch(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;
    fn store(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError>;
}

/// The bundled in-process backend: a concurrent map, shared by all requests
/// of this process. Never fails.
#[derive(Default)]
pub struct MemoryCache(DashMap<CacheKey, CacheEntry>);

impl CacheBackend for MemoryCache {
    fn fetch(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.0.get(key).map(|entry| entry.value().clone()))
    }

    fn store(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        self.0.insert(key, entry);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn entry(version: i64) -> CacheEntry {
        CacheEntry {
            version,
            rights: HashMap::from([
                ("view".to_owned(), RightValue::Bool(true)),
                ("budget".to_owned(), RightValue::Range(dec!(2500))),
            ]),
        }
    }

    #[test]
    fn memory_cache_round_trip() {
        let cache = MemoryCache::default();
        let key = CacheKey { user: Key(1), context: Some(Key(7)) };

        assert_eq!(cache.fetch(&key).unwrap(), None);
        cache.store(key, entry(3)).unwrap();
        assert_eq!(cache.fetch(&key).unwrap(), Some(entry(3)));

        // Same user, different context is a different entry.
        let global = CacheKey { user: Key(1), context: None };
        assert_eq!(cache.fetch(&global).unwrap(), None);
    }

    #[test]
    fn last_writer_wins_per_key() {
        let cache = MemoryCache::default();
        let key = CacheKey { user: Key(1), context: None };
        cache.store(key, entry(3)).unwrap();
        cache.store(key, entry(4)).unwrap();
        assert_eq!(cache.fetch(&key).unwrap(), Some(entry(4)));
    }

    #[test]
    fn freshness_is_exact_version_equality() {
        let entry = entry(5);
        assert!(entry.is_fresh(5));
        assert!(!entry.is_fresh(4));
        assert!(!entry.is_fresh(6));
    }

    #[test]
    fn entries_survive_serialization() {
        let original = entry(42);
        let json = serde_json::to_string(&original).unwrap();
        let restored: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }
}
