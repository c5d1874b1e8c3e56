//! Configuration for the request cache.

use std::time::Duration;

/// Default maximum number of cached query results.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Configuration for the request cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries before LRU eviction.
    pub max_entries: usize,

    /// Optional time-to-live for cached results.
    /// Entries not fetched or read within this duration are treated as absent.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: None,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the TTL for cached entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable TTL.
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }
}

impl From<&sigil_config::CacheConfig> for CacheConfig {
    fn from(config: &sigil_config::CacheConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            ttl: config.ttl(),
        }
    }
}
