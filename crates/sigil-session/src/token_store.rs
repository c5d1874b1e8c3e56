//! Session token persistence.
//!
//! The token and a profile snapshot are written together into one of two
//! tiers. Reads prefer the ephemeral tier, then the durable one. Storage
//! failures are logged and read as "no session"; only [`TokenStore::store`]
//! reports them, so callers can tell a sign-in did not stick.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sigil_client::{AUTHORIZATION_HEADER, AuthHeaderProvider, Profile};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::KeyValueStore;

const TOKEN_KEY: &str = "authToken";
const PROFILE_KEY: &str = "me";
const STORED_AT_KEY: &str = "storedAt";

const SESSION_KEYS: [&str; 3] = [TOKEN_KEY, PROFILE_KEY, STORED_AT_KEY];

/// Persistence tier holding the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Survives restarts ("remember me").
    Durable,
    /// Cleared when the session ends.
    Ephemeral,
}

impl Tier {
    /// Tier chosen for a remember-me flag.
    pub fn for_remember(remember: bool) -> Self {
        if remember {
            Tier::Durable
        } else {
            Tier::Ephemeral
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Durable => f.write_str("durable"),
            Tier::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// Two-tier token and profile store.
#[derive(Debug, Clone)]
pub struct TokenStore {
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, ephemeral }
    }

    fn backend(&self, tier: Tier) -> &dyn KeyValueStore {
        match tier {
            Tier::Durable => self.durable.as_ref(),
            Tier::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    fn read(&self, tier: Tier, key: &str) -> Option<String> {
        match self.backend(tier).get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(tier = %tier, key = %key, error = %e, "Session storage read failed");
                None
            }
        }
    }

    fn token_in(&self, tier: Tier) -> Option<String> {
        self.read(tier, TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// Tier currently supplying the token, if any.
    pub fn active_tier(&self) -> Option<Tier> {
        [Tier::Ephemeral, Tier::Durable]
            .into_iter()
            .find(|tier| self.token_in(*tier).is_some())
    }

    /// Whether a non-empty token is stored.
    pub fn has(&self) -> bool {
        self.active_tier().is_some()
    }

    /// The stored token, if any.
    pub fn token(&self) -> Option<String> {
        [Tier::Ephemeral, Tier::Durable]
            .into_iter()
            .find_map(|tier| self.token_in(tier))
    }

    /// Headers for an outgoing request: `authorization` when a token exists.
    pub fn headers(&self) -> HashMap<String, String> {
        match self.token() {
            Some(token) => HashMap::from([(AUTHORIZATION_HEADER.to_string(), token)]),
            None => HashMap::new(),
        }
    }

    /// Write the token and profile into the tier picked by `remember`.
    ///
    /// Overwrites that tier only; the other tier is left as it is. On
    /// failure, whatever was written to the tier is rolled back.
    pub fn store(
        &self,
        token: &str,
        remember: bool,
        profile: Option<&Profile>,
    ) -> Result<(), StorageError> {
        let tier = Tier::for_remember(remember);
        let result = self.write_tier(tier, token, profile);
        if let Err(e) = &result {
            warn!(tier = %tier, error = %e, "Failed to store session token");
            self.clear_tier(tier);
        } else {
            debug!(tier = %tier, "Session token stored");
        }
        result
    }

    fn write_tier(
        &self,
        tier: Tier,
        token: &str,
        profile: Option<&Profile>,
    ) -> Result<(), StorageError> {
        let backend = self.backend(tier);
        match profile {
            Some(profile) => backend.set(PROFILE_KEY, &serde_json::to_string(profile)?)?,
            None => backend.remove(PROFILE_KEY)?,
        }
        backend.set(STORED_AT_KEY, &Utc::now().to_rfc3339())?;
        // Token last, so a reader never sees it without its profile
        backend.set(TOKEN_KEY, token)
    }

    fn clear_tier(&self, tier: Tier) {
        for key in SESSION_KEYS {
            if let Err(e) = self.backend(tier).remove(key) {
                warn!(tier = %tier, key = %key, error = %e, "Session storage remove failed");
            }
        }
    }

    /// Remove token and profile from both tiers. Never fails.
    pub fn clear(&self) {
        self.clear_tier(Tier::Ephemeral);
        self.clear_tier(Tier::Durable);
    }

    /// Cached profile of the signed-in user.
    ///
    /// `None` when there is no token, or the stored snapshot is missing or
    /// malformed.
    pub fn current_profile(&self) -> Option<Profile> {
        let tier = self.active_tier()?;
        let raw = self.read(tier, PROFILE_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                debug!(tier = %tier, error = %e, "Ignoring malformed cached profile");
                None
            }
        }
    }

    /// When the active token was stored.
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        let tier = self.active_tier()?;
        let raw = self.read(tier, STORED_AT_KEY)?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

impl AuthHeaderProvider for TokenStore {
    fn auth_headers(&self) -> HashMap<String, String> {
        self.headers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore, UnavailableStore};
    use sigil_client::UserId;
    use tempfile::tempdir;

    fn profile() -> Profile {
        Profile::new(UserId::Int(1), "A")
    }

    fn memory_store() -> (TokenStore, Arc<MemoryStore>, Arc<MemoryStore>) {
        let durable = Arc::new(MemoryStore::new());
        let ephemeral = Arc::new(MemoryStore::new());
        let store = TokenStore::new(durable.clone(), ephemeral.clone());
        (store, durable, ephemeral)
    }

    #[test]
    fn test_tier_for_remember() {
        assert_eq!(Tier::for_remember(true), Tier::Durable);
        assert_eq!(Tier::for_remember(false), Tier::Ephemeral);
    }

    #[test]
    fn test_empty_store() {
        let (store, _, _) = memory_store();
        assert!(!store.has());
        assert!(store.headers().is_empty());
        assert!(store.current_profile().is_none());
        assert!(store.active_tier().is_none());
    }

    #[test]
    fn test_store_and_read_back() {
        let (store, durable, ephemeral) = memory_store();
        store.store("tok1", true, Some(&profile())).unwrap();

        assert!(store.has());
        assert_eq!(store.active_tier(), Some(Tier::Durable));
        assert_eq!(
            store.headers().get("authorization").map(String::as_str),
            Some("tok1")
        );
        assert_eq!(store.current_profile(), Some(profile()));
        assert!(store.stored_at().is_some());
        assert!(!durable.is_empty());
        assert!(ephemeral.is_empty());
    }

    #[test]
    fn test_remember_false_uses_ephemeral() {
        let (store, durable, ephemeral) = memory_store();
        store.store("tok1", false, Some(&profile())).unwrap();

        assert_eq!(store.active_tier(), Some(Tier::Ephemeral));
        assert!(durable.is_empty());

        // Session end wipes the ephemeral tier
        ephemeral.clear_all();
        assert!(!store.has());
    }

    #[test]
    fn test_store_does_not_clear_other_tier() {
        let (store, durable, _) = memory_store();
        store.store("durable-tok", true, None).unwrap();
        store.store("ephemeral-tok", false, None).unwrap();

        // Ephemeral shadows durable, but durable is untouched
        assert_eq!(store.token().as_deref(), Some("ephemeral-tok"));
        assert_eq!(durable.get(TOKEN_KEY).unwrap().as_deref(), Some("durable-tok"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (store, _, _) = memory_store();
        store.store("tok1", true, Some(&profile())).unwrap();
        store.store("tok2", false, Some(&profile())).unwrap();

        store.clear();
        assert!(!store.has());
        store.clear();
        assert!(!store.has());
        assert!(store.current_profile().is_none());
    }

    #[test]
    fn test_empty_token_is_no_session() {
        let (store, _, _) = memory_store();
        store.store("", true, Some(&profile())).unwrap();
        assert!(!store.has());
        assert!(store.headers().is_empty());
        assert!(store.current_profile().is_none());
    }

    #[test]
    fn test_malformed_profile_reads_as_none() {
        let (store, durable, _) = memory_store();
        store.store("tok1", true, None).unwrap();
        durable.set(PROFILE_KEY, "{\"name\": ").unwrap();

        assert!(store.has());
        assert!(store.current_profile().is_none());
    }

    #[test]
    fn test_profile_without_token_is_not_reported() {
        let (store, durable, _) = memory_store();
        durable
            .set(PROFILE_KEY, &serde_json::to_string(&profile()).unwrap())
            .unwrap();
        assert!(store.current_profile().is_none());
    }

    #[test]
    fn test_unavailable_backend_degrades_to_no_session() {
        let store = TokenStore::new(Arc::new(UnavailableStore), Arc::new(UnavailableStore));
        assert!(!store.has());
        assert!(store.headers().is_empty());
        assert!(store.current_profile().is_none());
        assert!(store.store("tok1", true, None).is_err());
        store.clear();
        assert!(!store.has());
    }

    #[test]
    fn test_durable_tier_survives_restart() {
        let temp = tempdir().unwrap();
        {
            let store = TokenStore::new(
                Arc::new(FileStore::new(temp.path())),
                Arc::new(MemoryStore::new()),
            );
            store.store("tok1", true, Some(&profile())).unwrap();
        }

        let reloaded = TokenStore::new(
            Arc::new(FileStore::new(temp.path())),
            Arc::new(MemoryStore::new()),
        );
        assert!(reloaded.has());
        assert_eq!(reloaded.token().as_deref(), Some("tok1"));
        assert_eq!(reloaded.current_profile(), Some(profile()));
    }

    #[test]
    fn test_ephemeral_tier_lost_on_restart() {
        let temp = tempdir().unwrap();
        {
            let store = TokenStore::new(
                Arc::new(FileStore::new(temp.path())),
                Arc::new(MemoryStore::new()),
            );
            store.store("tok1", false, Some(&profile())).unwrap();
            assert!(store.has());
        }

        let reloaded = TokenStore::new(
            Arc::new(FileStore::new(temp.path())),
            Arc::new(MemoryStore::new()),
        );
        assert!(!reloaded.has());
    }

    #[test]
    fn test_auth_header_provider() {
        let (store, _, _) = memory_store();
        assert!(store.auth_headers().is_empty());
        store.store("tok1", true, None).unwrap();
        assert_eq!(
            store.auth_headers().get(AUTHORIZATION_HEADER).map(String::as_str),
            Some("tok1")
        );
    }
}
