//! Session lifecycle for the Sigil client.
//!
//! This crate ties a session token to the GraphQL client:
//! - [`TokenStore`] persists the token and cached profile across a durable
//!   and an ephemeral [`KeyValueStore`] tier, degrading to "no session" when
//!   storage misbehaves
//! - [`RequestCache`] keeps prior query results with LRU eviction and
//!   optional TTL, reset on teardown and refetched after sign-in
//! - [`SessionManager`] drives sign-in, sign-up and logout, and tears the
//!   session down when the server rejects the token
//!
//! # Example
//!
//! ```rust,ignore
//! use sigil_session::SessionContext;
//!
//! let ctx = SessionContext::builder()
//!     .base_url("http://localhost:3000")
//!     .data_dir(data_dir)
//!     .build()?;
//!
//! ctx.manager().sign_in(&SignInInput::new("a@b.com", "x"), true).await?;
//! assert!(ctx.manager().has_session());
//! ```

mod cache;
mod config;
mod context;
mod error;
mod manager;
mod storage;
mod token_store;
mod ttl;

pub use cache::{CacheStats, CachedResult, FetchPolicy, QueryKey, RequestCache};
pub use config::CacheConfig;
pub use context::{SessionContext, SessionContextBuilder};
pub use error::{CacheError, Result, SessionError, StorageError};
pub use manager::{LogoutOutcome, SessionEvent, SessionManager, SessionState, SignOutReason};
pub use storage::{FileStore, KeyValueStore, MemoryStore, UnavailableStore, CREDENTIALS_FILE};
pub use token_store::{Tier, TokenStore};
pub use ttl::TtlTracker;
