//! Session hooks consulted by the client on every request.

use std::collections::HashMap;

use async_trait::async_trait;

/// Header name carrying the session token.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Supplies headers for outgoing requests.
///
/// Implementations must be side-effect free; the client calls this once per
/// attempt, including retries.
pub trait AuthHeaderProvider: Send + Sync {
    fn auth_headers(&self) -> HashMap<String, String>;
}

/// Reacts to the server rejecting the session credentials.
#[async_trait]
pub trait UnauthenticatedHandler: Send + Sync {
    async fn on_unauthenticated(&self);
}

/// Provider that never attaches credentials.
#[derive(Debug, Clone, Default)]
pub struct NoAuth;

impl AuthHeaderProvider for NoAuth {
    fn auth_headers(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// Provider with a fixed token, for scripts and tests.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl AuthHeaderProvider for StaticToken {
    fn auth_headers(&self) -> HashMap<String, String> {
        if self.0.is_empty() {
            return HashMap::new();
        }
        HashMap::from([(AUTHORIZATION_HEADER.to_string(), self.0.clone())])
    }
}
