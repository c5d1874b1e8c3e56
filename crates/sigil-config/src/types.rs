//! Configuration types.
//!
//! ```toml
//! [api]
//! url = "https://app.example.com"
//! timeout_secs = 30
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 500
//!
//! [storage]
//! data_dir = "/var/lib/sigil"
//!
//! [session]
//! identity_queries = ["Me"]
//! remember = true
//!
//! [cache]
//! max_entries = 256
//! ttl_secs = 300
//! ```
//!
//! # Environment Variables
//!
//! - `SIGIL_API_URL` - Override the API base URL
//! - `SIGIL_DATA_DIR` - Override the token storage directory

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable overriding `[api] url`.
pub const API_URL_ENV: &str = "SIGIL_API_URL";

/// Environment variable overriding `[storage] data_dir`.
pub const DATA_DIR_ENV: &str = "SIGIL_DATA_DIR";

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Default identity-dependent query refetched after sign-in.
pub const DEFAULT_IDENTITY_QUERY: &str = "Me";

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration.
///
/// Every section is optional so that layered files only override what they
/// mention. Use the accessor methods to get a section with defaults applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigilConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

impl SigilConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: SigilConfig) {
        if other.api.is_some() {
            self.api = other.api;
        }
        if other.retry.is_some() {
            self.retry = other.retry;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.cache.is_some() {
            self.cache = other.cache;
        }
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.api().url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.api().timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry().max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.cache().max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_entries".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The `[api]` section with defaults applied.
    pub fn api(&self) -> ApiConfig {
        self.api.clone().unwrap_or_default()
    }

    /// The `[retry]` section with defaults applied.
    pub fn retry(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// The `[storage]` section with defaults applied.
    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_default()
    }

    /// The `[session]` section with defaults applied.
    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// The `[cache]` section with defaults applied.
    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the application server. The GraphQL endpoint is `<url>/api`.
    pub url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Get the effective base URL, checking `SIGIL_API_URL` first.
    pub fn effective_url(&self) -> String {
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.is_empty()
        {
            return url;
        }
        self.url.clone()
    }

    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry policy for network failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per request, including the first one.
    pub max_attempts: u32,

    /// Base delay in milliseconds; attempt `n` waits up to `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    /// Base delay as a duration.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Token storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the durable credentials file.
    /// Default: platform data dir + `sigil`.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Get the effective data directory.
    ///
    /// Resolution order:
    /// 1. `SIGIL_DATA_DIR` environment variable
    /// 2. Configured `data_dir` value
    /// 3. Platform data directory (`~/.local/share/sigil` on Linux)
    pub fn effective_data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV)
            && !dir.is_empty()
        {
            return PathBuf::from(dir);
        }

        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sigil")
        })
    }
}

/// Session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Operation names whose cached results depend on the signed-in user.
    pub identity_queries: Vec<String>,

    /// Default persistence tier for new sessions (`true` = durable).
    pub remember: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identity_queries: vec![DEFAULT_IDENTITY_QUERY.to_string()],
            remember: true,
        }
    }
}

/// Request cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached query results before LRU eviction.
    pub max_entries: usize,

    /// Optional time-to-live in seconds. Absent means entries never expire.
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl_secs: None,
        }
    }
}

impl CacheConfig {
    /// TTL as a duration, if configured.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}
