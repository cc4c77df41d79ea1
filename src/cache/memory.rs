//! Session-lifetime predicate cache.

use crate::schema::Predicate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Remote modeldef fetches that completed successfully.
    pub fetches: u64,
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> SchemaCacheStats {
        SchemaCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
        }
    }
}

/// Predicate sets keyed by `controller.class`.
///
/// Entries are published once fetched and never evicted. Two callers racing on
/// the same class may both fetch; the later publish replaces an identical set.
/// Failed fetches are never stored.
#[derive(Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<[Predicate]>>>,
    stats: AtomicStats,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<[Predicate]>> {
        let found = self
            .entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned());
        let counter = if found.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Publish a freshly fetched predicate set and return the shared copy.
    pub fn publish(&self, key: &str, predicates: Vec<Predicate>) -> Arc<[Predicate]> {
        let shared: Arc<[Predicate]> = predicates.into();
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), shared.clone());
        }
        shared
    }

    /// Seed an entry without counting it as a fetch (disk cache hits).
    pub fn seed(&self, key: &str, predicates: Vec<Predicate>) -> Arc<[Predicate]> {
        let shared: Arc<[Predicate]> = predicates.into();
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), shared.clone());
        }
        shared
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SchemaCacheStats {
        self.stats.to_stats()
    }
}
