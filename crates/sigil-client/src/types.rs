//! Request and response types for the GraphQL API.
//!
//! These types mirror the server's auth contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Extension code the server uses to flag rejected credentials.
pub const UNAUTHENTICATED_CODE: &str = "UNAUTHENTICATED";

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// A GraphQL request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    /// Query or mutation document.
    pub query: String,
    /// Operation name; also the identity used by the request cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Variables object.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub variables: Value,
}

impl GraphQLRequest {
    /// Create a request for a named operation.
    pub fn new(operation_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: Some(operation_name.into()),
            variables: Value::Null,
        }
    }

    /// Attach variables.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    /// Operation name or an empty string for anonymous operations.
    pub fn operation(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("")
    }
}

/// A GraphQL response body.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLResponse<T> {
    /// Result data (absent on total failure).
    pub data: Option<T>,
    /// Errors reported by the server.
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

/// A single GraphQL error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Human-readable message.
    pub message: String,
    /// Path to the failing field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
    /// Server-defined extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ErrorExtensions>,
}

impl GraphQLError {
    /// Whether this error flags rejected credentials.
    pub fn is_unauthenticated(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.code.as_deref())
            == Some(UNAUTHENTICATED_CODE)
    }
}

/// Extensions attached to a GraphQL error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

/// User identifier; servers send either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Str(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Int(id) => write!(f, "{}", id),
            UserId::Str(id) => f.write_str(id),
        }
    }
}

/// Snapshot of the signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Profile {
    /// Create a profile with just an id and display name.
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            username: None,
            email: None,
        }
    }

    /// Best label for display: name, then username, then email, then id.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.username.clone())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials for signing in.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignInInput {
    pub username: String,
    pub password: String,
}

impl SignInInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SignInInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInInput")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration details for signing up.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignUpInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl SignUpInput {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SignUpInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpInput")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Payload returned by `signIn` and `signUp`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    /// Issued session token; absent when the server declines.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Profile of the authenticated user.
    #[serde(default)]
    pub user: Option<Profile>,
}

/// Payload returned by `logout`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutPayload {
    #[serde(default)]
    pub success: bool,
}
