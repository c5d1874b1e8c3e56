//! Session lifecycle: sign-in, sign-up, logout and teardown.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use sigil_client::{
    AuthApi, AuthPayload, ClientBuilder, GraphQLClient, Profile, SignInInput, SignUpInput,
    UnauthenticatedHandler,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::{FetchPolicy, RequestCache};
use crate::error::{CacheError, Result, SessionError};
use crate::token_store::TokenStore;

const EVENT_CAPACITY: usize = 16;

/// Where the session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Anonymous => f.write_str("anonymous"),
            SessionState::Authenticating => f.write_str("authenticating"),
            SessionState::Authenticated => f.write_str("authenticated"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user logged out.
    Logout,
    /// The server rejected the token.
    Unauthenticated,
    /// A protected action found no session.
    LoginRequired,
}

/// Lifecycle notifications for hosts (navigation, UI refresh).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn { profile: Option<Profile> },
    SignedOut { reason: SignOutReason },
    /// The host should send the user to its login entry point.
    LoginRequired,
}

/// Result of [`SessionManager::logout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The server confirmed the logout.
    Confirmed,
    /// The remote call failed or was not confirmed; only local state was cleared.
    LocalOnly,
}

/// State shared between the manager and the unauthenticated interceptor.
struct SessionShared {
    tokens: TokenStore,
    cache: RequestCache,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionShared {
    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Clear the token store and the request cache. No remote call.
    async fn teardown(&self, reason: SignOutReason) {
        let had_session =
            self.tokens.has() || *self.state.lock() == SessionState::Authenticated;

        self.tokens.clear();
        let dropped = self.cache.reset_all().await;
        self.set_state(SessionState::Anonymous);

        if had_session {
            info!(reason = ?reason, cache_entries = dropped, "Session ended");
            self.emit(SessionEvent::SignedOut { reason });
        }
    }
}

/// Tears the session down when the server rejects the token.
struct TeardownInterceptor {
    shared: Arc<SessionShared>,
}

#[async_trait]
impl UnauthenticatedHandler for TeardownInterceptor {
    async fn on_unauthenticated(&self) {
        self.shared.teardown(SignOutReason::Unauthenticated).await;
    }
}

/// Drives the session state machine.
///
/// Only one of sign-in, sign-up or logout runs at a time; a call made while
/// another is in flight fails with [`SessionError::Busy`].
pub struct SessionManager {
    shared: Arc<SessionShared>,
    client: GraphQLClient,
    identity_queries: Vec<String>,
    in_flight: tokio::sync::Mutex<()>,
}

impl SessionManager {
    /// Wire a manager around a token store and cache.
    ///
    /// The client built from `client` gets the token store as its header
    /// provider and the session teardown as its unauthenticated handler.
    pub fn new(
        tokens: TokenStore,
        cache: RequestCache,
        client: ClientBuilder,
        identity_queries: Vec<String>,
    ) -> Result<Self> {
        let initial = if tokens.has() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let shared = Arc::new(SessionShared {
            tokens: tokens.clone(),
            cache,
            state: Mutex::new(initial),
            events,
        });

        let client = client
            .auth_provider(Arc::new(tokens))
            .interceptor(Arc::new(TeardownInterceptor {
                shared: shared.clone(),
            }))
            .build()
            .map_err(|e| SessionError::Config(e.to_string()))?;

        debug!(state = %initial, endpoint = %client.endpoint(), "Session manager ready");

        Ok(Self {
            shared,
            client,
            identity_queries,
            in_flight: tokio::sync::Mutex::new(()),
        })
    }

    /// The authenticated GraphQL client.
    pub fn client(&self) -> &GraphQLClient {
        &self.client
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.shared.tokens
    }

    pub fn cache(&self) -> &RequestCache {
        &self.shared.cache
    }

    /// Operation names refetched after sign-in.
    pub fn identity_queries(&self) -> &[String] {
        &self.identity_queries
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Whether a token is currently stored.
    pub fn has_session(&self) -> bool {
        self.shared.tokens.has()
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.shared.tokens.current_profile()
    }

    pub fn headers(&self) -> std::collections::HashMap<String, String> {
        self.shared.tokens.headers()
    }

    /// Receive lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Exchange credentials for a session.
    ///
    /// Returns the profile the server sent with the token.
    pub async fn sign_in(&self, input: &SignInInput, remember: bool) -> Result<Option<Profile>> {
        let _guard = self.in_flight.try_lock().map_err(|_| SessionError::Busy)?;
        self.shared.set_state(SessionState::Authenticating);
        debug!(username = %input.username, remember = remember, "Signing in");

        let result = self.client.auth().sign_in(input).await;
        self.complete_sign_in(result, remember).await
    }

    /// Register an account and start a session for it.
    pub async fn sign_up(&self, input: &SignUpInput, remember: bool) -> Result<Option<Profile>> {
        let _guard = self.in_flight.try_lock().map_err(|_| SessionError::Busy)?;
        self.shared.set_state(SessionState::Authenticating);
        debug!(username = %input.username, remember = remember, "Signing up");

        let result = self.client.auth().sign_up(input).await;
        self.complete_sign_in(result, remember).await
    }

    async fn complete_sign_in(
        &self,
        result: sigil_client::Result<AuthPayload>,
        remember: bool,
    ) -> Result<Option<Profile>> {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Authentication request failed");
                self.settle_state();
                return Err(e.into());
            }
        };

        let Some(token) = payload.access_token.filter(|t| !t.is_empty()) else {
            warn!("Authentication succeeded without an access token");
            self.settle_state();
            return Err(SessionError::MissingToken);
        };

        // A token left in the other tier would shadow or outlive this one
        self.shared.tokens.clear();
        if let Err(e) = self.shared.tokens.store(&token, remember, payload.user.as_ref()) {
            self.shared.cache.reset_all().await;
            self.shared.set_state(SessionState::Anonymous);
            return Err(e.into());
        }
        self.shared.set_state(SessionState::Authenticated);

        let profile = payload.user;
        info!(
            user = %profile.as_ref().map(Profile::display_name).unwrap_or_default(),
            tier = %crate::token_store::Tier::for_remember(remember),
            "Signed in"
        );

        // Strictly after the store write, so refetches carry the new token
        let refetched = self
            .shared
            .cache
            .refetch(&self.client, &self.identity_queries)
            .await;
        debug!(count = refetched, "Refetched identity queries");

        self.shared.emit(SessionEvent::SignedIn {
            profile: profile.clone(),
        });
        Ok(profile)
    }

    /// State after a failed attempt: whatever the token store says.
    fn settle_state(&self) {
        let state = if self.shared.tokens.has() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        self.shared.set_state(state);
    }

    /// End the session.
    ///
    /// The remote logout is best effort. Local state is cleared whatever
    /// it returns.
    pub async fn logout(&self) -> Result<LogoutOutcome> {
        let _guard = self.in_flight.try_lock().map_err(|_| SessionError::Busy)?;

        let outcome = match self.client.auth().logout().await {
            Ok(payload) if payload.success => LogoutOutcome::Confirmed,
            Ok(_) => {
                warn!("Server did not confirm logout");
                LogoutOutcome::LocalOnly
            }
            Err(e) => {
                warn!(error = %e, "Remote logout failed, clearing local session");
                LogoutOutcome::LocalOnly
            }
        };

        self.shared.teardown(SignOutReason::Logout).await;
        Ok(outcome)
    }

    /// Check a session exists before a protected action.
    ///
    /// Without a token, clears any leftovers, emits
    /// [`SessionEvent::LoginRequired`] and returns `false`.
    pub async fn require_session(&self) -> bool {
        if self.has_session() {
            return true;
        }
        self.shared.teardown(SignOutReason::LoginRequired).await;
        self.shared.emit(SessionEvent::LoginRequired);
        false
    }

    /// The signed-in user via the identity query, through the request cache.
    ///
    /// A `CacheOnly` miss is `Ok(None)`.
    pub async fn me(&self, policy: FetchPolicy) -> Result<Option<Profile>> {
        let request = AuthApi::me_request();
        let data = match self.shared.cache.query(&self.client, &request, policy).await {
            Ok(data) => data,
            Err(CacheError::Miss(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match data.get("me") {
            None | Some(Value::Null) => Ok(None),
            Some(me) => serde_json::from_value(me.clone())
                .map(Some)
                .map_err(|e| SessionError::Remote(e.into())),
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("endpoint", &self.client.endpoint().as_str())
            .field("identity_queries", &self.identity_queries)
            .finish()
    }
}
