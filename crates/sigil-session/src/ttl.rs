//! TTL tracking for cache expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Tracks last access times for TTL-based expiration.
#[derive(Debug)]
pub struct TtlTracker<K> {
    access_times: HashMap<K, Instant>,
    ttl: Option<Duration>,
}

impl<K: Hash + Eq + Clone> TtlTracker<K> {
    /// Create a new TTL tracker. `None` disables expiration.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            access_times: HashMap::new(),
            ttl,
        }
    }

    /// Record an access (resets the TTL timer).
    pub fn touch(&mut self, key: &K) {
        self.access_times.insert(key.clone(), Instant::now());
    }

    /// Check if a key has expired.
    pub fn is_expired(&self, key: &K) -> bool {
        match self.ttl {
            None => false,
            Some(ttl) => match self.access_times.get(key) {
                None => true, // No access record = expired
                Some(last_access) => last_access.elapsed() > ttl,
            },
        }
    }

    /// Stop tracking a key.
    pub fn remove(&mut self, key: &K) {
        self.access_times.remove(key);
    }

    /// Remove all expired entries and return their keys.
    pub fn drain_expired(&mut self) -> Vec<K> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<K> = self
            .access_times
            .iter()
            .filter(|(_, last_access)| now.duration_since(**last_access) > ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.access_times.remove(key);
        }
        expired
    }

    /// Forget every key.
    pub fn clear(&mut self) {
        self.access_times.clear();
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.access_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.access_times.is_empty()
    }
}
