//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::api::AuthApi;
use crate::error::{Error, Result};
use crate::hooks::{AuthHeaderProvider, NoAuth, UnauthenticatedHandler};
use crate::retry::RetryPolicy;
use crate::types::{GraphQLError, GraphQLRequest, GraphQLResponse};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path of the GraphQL endpoint below the application base URL.
const GRAPHQL_PATH: &str = "api";

/// GraphQL API client.
///
/// Cloning is cheap; clones share the connection pool and hooks.
///
/// # Example
///
/// ```no_run
/// use sigil_client::{GraphQLClient, GraphQLRequest, operations};
///
/// # async fn example() -> sigil_client::Result<()> {
/// let client = GraphQLClient::builder()
///     .base_url("http://localhost:3000")
///     .build()?;
///
/// let me = client
///     .execute_raw(&GraphQLRequest::new(operations::ME_OPERATION, operations::ME))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GraphQLClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
struct ClientInner {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
    retry: RetryPolicy,
    auth: Arc<dyn AuthHeaderProvider>,
    interceptor: Option<Arc<dyn UnauthenticatedHandler>>,
}

impl GraphQLClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the GraphQL endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Get the retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    /// Access the auth mutations.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Execute an operation and deserialize its `data` object.
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: &GraphQLRequest,
    ) -> Result<T> {
        let data = self.execute_raw(request).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Execute an operation and return its raw `data` object.
    ///
    /// GraphQL errors fail the whole operation. Errors flagged
    /// `UNAUTHENTICATED`, and HTTP 401 responses, are reported to the
    /// registered [`UnauthenticatedHandler`] before returning
    /// [`Error::Unauthenticated`].
    pub async fn execute_raw(&self, request: &GraphQLRequest) -> Result<Value> {
        let operation = request.operation();
        debug!(operation = %operation, "Executing GraphQL operation");

        let (status, body) = self.send_with_retry(request).await?;
        let parsed = serde_json::from_str::<GraphQLResponse<Value>>(&body);

        let rejected = match &parsed {
            Ok(response) => response
                .errors
                .iter()
                .find(|e| e.is_unauthenticated())
                .map(|e| e.message.clone()),
            Err(_) => None,
        };
        if let Some(message) = rejected.or_else(|| {
            (status == StatusCode::UNAUTHORIZED).then(|| format!("HTTP {}", status.as_u16()))
        }) {
            warn!(operation = %operation, message = %message, "Server rejected session credentials");
            self.notify_unauthenticated().await;
            return Err(Error::Unauthenticated(message));
        }

        let response = match parsed {
            Ok(response) => response,
            Err(_) if !status.is_success() => {
                return Err(Error::Api {
                    status: status.as_u16(),
                    message: if body.is_empty() {
                        format!("HTTP {}", status.as_u16())
                    } else {
                        body
                    },
                });
            }
            Err(e) => return Err(Error::Json(e)),
        };

        if !response.errors.is_empty() {
            log_graphql_errors(operation, &response.errors);
            return Err(Error::GraphQL(response.errors));
        }

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        response
            .data
            .ok_or_else(|| Error::MissingData(operation.to_string()))
    }

    /// Send the request, retrying failures that happened in transit.
    async fn send_with_retry(&self, request: &GraphQLRequest) -> Result<(StatusCode, String)> {
        let retry = self.inner.retry;
        let mut attempt = 1;
        loop {
            match self.send_once(request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_network() && retry.should_retry(attempt) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        operation = %request.operation(),
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Request failed in transit, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &GraphQLRequest) -> Result<(StatusCode, String)> {
        let mut builder = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .json(request)
            .timeout(self.inner.timeout);

        for (name, value) in self.inner.auth.auth_headers() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn notify_unauthenticated(&self) {
        if let Some(handler) = &self.inner.interceptor {
            handler.on_unauthenticated().await;
        }
    }
}

fn log_graphql_errors(operation: &str, errors: &[GraphQLError]) {
    for error in errors {
        warn!(
            operation = %operation,
            code = error.extensions.as_ref().and_then(|e| e.code.as_deref()).unwrap_or(""),
            "GraphQL error: {}",
            error.message
        );
    }
}

/// Builder for creating a [`GraphQLClient`].
pub struct ClientBuilder {
    base_url: Option<String>,
    endpoint: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: Option<String>,
    auth: Arc<dyn AuthHeaderProvider>,
    interceptor: Option<Arc<dyn UnauthenticatedHandler>>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            endpoint: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            user_agent: None,
            auth: Arc::new(NoAuth),
            interceptor: None,
        }
    }

    /// Set the application base URL; the endpoint becomes `<base>/api`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the full GraphQL endpoint URL (takes priority over `base_url`).
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy for network failures.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the provider consulted for auth headers on every request.
    pub fn auth_provider(mut self, provider: Arc<dyn AuthHeaderProvider>) -> Self {
        self.auth = provider;
        self
    }

    /// Set the handler notified when the server rejects credentials.
    pub fn interceptor(mut self, handler: Arc<dyn UnauthenticatedHandler>) -> Self {
        self.interceptor = Some(handler);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GraphQLClient> {
        let endpoint = match (self.endpoint, self.base_url) {
            (Some(endpoint), _) => Url::parse(&endpoint)?,
            (None, Some(base)) => {
                let mut base = Url::parse(&base)?;
                if !base.path().ends_with('/') {
                    base.set_path(&format!("{}/", base.path()));
                }
                base.join(GRAPHQL_PATH)?
            }
            (None, None) => {
                return Err(Error::Config(
                    "either endpoint or base_url is required".to_string(),
                ));
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("sigil-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(GraphQLClient {
            inner: Arc::new(ClientInner {
                http,
                endpoint,
                timeout: self.timeout,
                retry: self.retry,
                auth: self.auth,
                interceptor: self.interceptor,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
