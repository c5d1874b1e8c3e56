//! GraphQL client for the Sigil session layer.
//!
//! This crate provides a typed client for talking to the application's
//! GraphQL endpoint with session awareness built in:
//!
//! - **Header injection**: every request asks an [`AuthHeaderProvider`] for
//!   headers, so a stored session token is attached as `authorization`.
//! - **Interception**: responses flagged `UNAUTHENTICATED` (or HTTP 401) are
//!   reported to an [`UnauthenticatedHandler`] before the error is returned.
//! - **Retry**: network failures are retried with jittered backoff.
//!
//! # Example
//!
//! ```no_run
//! use sigil_client::{GraphQLClient, Result, SignInInput};
//!
//! # async fn example() -> Result<()> {
//! let client = GraphQLClient::builder()
//!     .endpoint("http://localhost:3000/api")
//!     .build()?;
//!
//! let payload = client
//!     .auth()
//!     .sign_in(&SignInInput::new("a@b.com", "secret"))
//!     .await?;
//! println!("signed in as {:?}", payload.user);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod hooks;
pub mod operations;
pub mod retry;
pub mod types;

pub use api::AuthApi;
pub use client::{ClientBuilder, GraphQLClient};
pub use error::{Error, Result};
pub use hooks::{AuthHeaderProvider, NoAuth, StaticToken, UnauthenticatedHandler, AUTHORIZATION_HEADER};
pub use retry::RetryPolicy;
pub use types::*;
