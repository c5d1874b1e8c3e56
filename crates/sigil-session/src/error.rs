//! Error types for session operations.

/// Errors from a key-value storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend I/O failed.
    #[error("storage I/O error at '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Stored data could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence is disabled or unreachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the request cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache-only lookup found nothing.
    #[error("no cached result for '{0}'")]
    Miss(String),

    /// The cached entry holds a failed result.
    #[error("cached query failed: {0}")]
    CachedFailure(String),

    /// The network fetch failed.
    #[error(transparent)]
    Remote(#[from] sigil_client::Error),
}

/// Errors surfaced by session operations.
///
/// None of these leave a partially stored token behind.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Network or server failure during an auth mutation.
    #[error("remote failure: {0}")]
    Remote(sigil_client::Error),

    /// The server accepted the request but issued no token.
    #[error("server did not return an access token")]
    MissingToken,

    /// The server rejected the session credentials; the session was torn down.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The token could not be persisted.
    #[error("could not persist session: {0}")]
    Storage(#[from] StorageError),

    /// Another session operation is still in flight.
    #[error("another session operation is in progress")]
    Busy,

    /// Request cache failure.
    #[error(transparent)]
    Cache(CacheError),

    /// Invalid construction parameters.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// Message suitable for an inline form error.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Remote(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

impl From<sigil_client::Error> for SessionError {
    fn from(e: sigil_client::Error) -> Self {
        match e {
            sigil_client::Error::Unauthenticated(message) => SessionError::Unauthenticated(message),
            other => SessionError::Remote(other),
        }
    }
}

impl From<CacheError> for SessionError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Remote(remote) => remote.into(),
            other => SessionError::Cache(other),
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
