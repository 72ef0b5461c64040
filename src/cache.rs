//! In-memory TTL cache for query results

use crate::clock::{add, Clock};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Fresh while `now - inserted_at <= ttl`
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now <= add(self.inserted_at, self.ttl)
    }
}

/// TTL cache keyed by query signature
///
/// Entries carry their own TTL. Stale entries are treated as absent and
/// evicted on read.
pub struct ResponseCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResponseCache<V> {
    /// Creates an empty cache reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the stored value if it is still fresh
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        // re-check: a writer may have refreshed it in between
        if entries.get(key).is_some_and(|e| !e.is_fresh(now)) {
            entries.remove(key);
        }
        entries
            .get(key)
            .filter(|e| e.is_fresh(now))
            .map(|e| e.value.clone())
    }

    /// Stores `value`, replacing any previous entry
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
            ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Drops `key`, returning whether it was present
    pub async fn invalidate(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drops every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drops every stale entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Number of stored entries, stale ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no entries are stored, stale ones included
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
