//! Client error types.

use thiserror::Error;

use crate::types::GraphQLError;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with GraphQL errors.
    #[error("GraphQL error: {}", join_messages(.0))]
    GraphQL(Vec<GraphQLError>),

    /// The server rejected the session credentials.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Server returned a non-GraphQL error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// The response had neither data nor errors for the requested field.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a credential rejection.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Unauthenticated(_))
    }

    /// Check if this failure happened in transit and is worth retrying.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Http(e) if !e.is_decode() && !e.is_builder())
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }

    /// First GraphQL error message, if any, for inline display.
    pub fn user_message(&self) -> String {
        match self {
            Error::GraphQL(errors) => errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| self.to_string()),
            other => other.to_string(),
        }
    }
}

fn join_messages(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
