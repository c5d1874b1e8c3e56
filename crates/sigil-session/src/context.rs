//! Explicit wiring of storage, cache, client and manager.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sigil_client::{GraphQLClient, RetryPolicy};
use sigil_config::SigilConfig;
use tracing::debug;

use crate::cache::RequestCache;
use crate::config::CacheConfig;
use crate::error::{Result, SessionError};
use crate::manager::SessionManager;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::token_store::TokenStore;

/// Everything a host needs for one session, shared by reference.
#[derive(Debug, Clone)]
pub struct SessionContext {
    manager: Arc<SessionManager>,
    ephemeral: Arc<MemoryStore>,
}

impl SessionContext {
    pub fn builder() -> SessionContextBuilder {
        SessionContextBuilder::default()
    }

    /// Builder pre-filled from loaded configuration.
    pub fn from_config(config: &SigilConfig) -> SessionContextBuilder {
        let api = config.api();
        let retry = config.retry();
        let session = config.session();

        SessionContextBuilder::default()
            .base_url(api.effective_url())
            .timeout(api.timeout())
            .retry(RetryPolicy::new(retry.max_attempts, retry.base_delay()))
            .data_dir(config.storage().effective_data_dir())
            .cache_config(CacheConfig::from(&config.cache()))
            .identity_queries(session.identity_queries)
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn client(&self) -> &GraphQLClient {
        self.manager.client()
    }

    pub fn tokens(&self) -> &TokenStore {
        self.manager.tokens()
    }

    pub fn cache(&self) -> &RequestCache {
        self.manager.cache()
    }

    /// End the host session: the ephemeral tier is wiped, the durable tier
    /// is kept.
    pub fn end_session(&self) {
        debug!(keys = self.ephemeral.len(), "Ending session, dropping ephemeral tier");
        self.ephemeral.clear_all();
    }
}

/// Builder for [`SessionContext`].
#[derive(Debug, Default)]
pub struct SessionContextBuilder {
    base_url: Option<String>,
    endpoint: Option<String>,
    data_dir: Option<PathBuf>,
    durable: Option<Arc<dyn KeyValueStore>>,
    ephemeral: Option<Arc<MemoryStore>>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
    cache_config: Option<CacheConfig>,
    identity_queries: Option<Vec<String>>,
}

impl SessionContextBuilder {
    /// Server base URL; the GraphQL endpoint is `<base>/api`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Full GraphQL endpoint URL. Takes precedence over `base_url`.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Directory for the durable tier's credentials file.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Custom durable backend. Takes precedence over `data_dir`.
    pub fn durable(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.durable = Some(store);
        self
    }

    /// Share an existing ephemeral tier.
    pub fn ephemeral(mut self, store: Arc<MemoryStore>) -> Self {
        self.ephemeral = Some(store);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = Some(config);
        self
    }

    /// Operation names refetched after sign-in (default: `Me`).
    pub fn identity_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identity_queries = Some(queries.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<SessionContext> {
        let durable: Arc<dyn KeyValueStore> = match (self.durable, self.data_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileStore::new(&dir)),
            (None, None) => {
                return Err(SessionError::Config(
                    "no durable storage: set data_dir or durable".to_string(),
                ));
            }
        };
        let ephemeral = self.ephemeral.unwrap_or_default();
        let tokens = TokenStore::new(durable, ephemeral.clone());

        let cache = RequestCache::new(self.cache_config.unwrap_or_default());

        let mut client = GraphQLClient::builder();
        if let Some(url) = self.base_url {
            client = client.base_url(url);
        }
        if let Some(url) = self.endpoint {
            client = client.endpoint(url);
        }
        if let Some(retry) = self.retry {
            client = client.retry(retry);
        }
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        let identity_queries = self
            .identity_queries
            .unwrap_or_else(|| vec![sigil_config::DEFAULT_IDENTITY_QUERY.to_string()]);

        let manager = SessionManager::new(tokens, cache, client, identity_queries)?;

        Ok(SessionContext {
            manager: Arc::new(manager),
            ephemeral,
        })
    }
}
