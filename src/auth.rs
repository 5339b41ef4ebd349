//! Token and two-factor state for an API session.
//!
//! [`AuthState`] is the mutable heart of the authentication state machine:
//! the access/refresh token pair, the server-reported 2FA-required flag,
//! and whether the current access token has already cleared 2FA. It is
//! owned by [`HtbClient`](crate::client::HtbClient) behind a mutex;
//! nothing else mutates it.
//!
//! Token persistence is delegated to the [`TokenStore`] trait. When a
//! store is attached, every token mutation is mirrored to it (install
//! saves, clear deletes) and every token read falls back to it when the
//! in-memory value is unset, caching whatever it finds. This lets a
//! process pick up the previous session's tokens without re-entering
//! credentials.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Store key under which the access token is persisted.
pub const SESSION_TOKEN_KEY: &str = "SESSION_TOKEN";

/// Store key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "REFRESH_TOKEN";

/// Best-effort persistent storage for session credentials.
///
/// Implementations are keyed by [`SESSION_TOKEN_KEY`] and
/// [`REFRESH_TOKEN_KEY`]. The contract is deliberately infallible:
/// persistence is an optimization, and an implementation that cannot
/// write (read-only disk, locked keychain) should degrade silently
/// rather than fail the session operation that triggered the write.
pub trait TokenStore: Send + Sync {
    /// Returns the stored value for `key`, if any.
    fn load(&self, key: &str) -> Option<String>;

    /// Persists `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str);

    /// Removes the value stored under `key`, if any.
    fn delete(&self, key: &str);
}

/// In-process [`TokenStore`] backed by a `HashMap`.
///
/// The reference implementation: useful for tests and for sharing a
/// session between clients inside one process. Clone the `Arc` you hand
/// to the client if you want to inspect the store afterwards.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned lock only means a holder panicked; the map itself
        // is still usable, so recover rather than propagate.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn delete(&self, key: &str) {
        self.entries().remove(key);
    }
}

/// Mutable authentication state: token pair plus 2FA flags.
///
/// Invariants:
/// - The access and refresh tokens are replaced together on every
///   login/refresh response, never individually.
/// - `two_factor_satisfied` can only be true while an access token is
///   held; clearing the session resets both flags.
/// - Store mirroring: any mutation that installs a token saves it, any
///   mutation that drops a token deletes its key, so the store never
///   resurrects a token the session has discarded.
pub(crate) struct AuthState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    two_factor_required: bool,
    two_factor_satisfied: bool,
    store: Option<Arc<dyn TokenStore>>,
}

impl AuthState {
    /// Creates an empty, anonymous state.
    pub(crate) fn new(store: Option<Arc<dyn TokenStore>>) -> Self {
        AuthState {
            access_token: None,
            refresh_token: None,
            two_factor_required: false,
            two_factor_satisfied: false,
            store,
        }
    }

    /// The current access token, reading through to the store when the
    /// in-memory value is unset (and caching the result).
    pub(crate) fn access_token(&mut self) -> Option<&str> {
        if self.access_token.is_none() {
            if let Some(store) = &self.store {
                self.access_token = store.load(SESSION_TOKEN_KEY);
            }
        }
        self.access_token.as_deref()
    }

    /// The current refresh token, with the same store fall-back as
    /// [`access_token`](Self::access_token).
    pub(crate) fn refresh_token(&mut self) -> Option<&str> {
        if self.refresh_token.is_none() {
            if let Some(store) = &self.store {
                self.refresh_token = store.load(REFRESH_TOKEN_KEY);
            }
        }
        self.refresh_token.as_deref()
    }

    /// Installs a freshly minted token pair, mirroring both to the store.
    pub(crate) fn install_tokens(&mut self, access: String, refresh: String) {
        if let Some(store) = &self.store {
            store.save(SESSION_TOKEN_KEY, &access);
            store.save(REFRESH_TOKEN_KEY, &refresh);
        }
        self.access_token = Some(access);
        self.refresh_token = Some(refresh);
        debug!("installed new session token pair");
    }

    /// Takes the refresh token out of the session, deleting the store
    /// copy as well so a failed refresh cannot be retried with the same
    /// single-use token.
    pub(crate) fn take_refresh_token(&mut self) -> Option<String> {
        let token = self.refresh_token.take().or_else(|| {
            self.store
                .as_ref()
                .and_then(|store| store.load(REFRESH_TOKEN_KEY))
        });
        if let Some(store) = &self.store {
            store.delete(REFRESH_TOKEN_KEY);
        }
        token
    }

    /// Records the server-reported 2FA requirement for this account.
    pub(crate) fn set_two_factor_required(&mut self, required: bool) {
        self.two_factor_required = required;
    }

    /// Records whether the current access token has cleared 2FA.
    pub(crate) fn set_two_factor_satisfied(&mut self, satisfied: bool) {
        self.two_factor_satisfied = satisfied;
    }

    /// True when 2FA is enabled for the account and the current token has
    /// not yet cleared it.
    pub(crate) fn needs_otp(&self) -> bool {
        self.two_factor_required && !self.two_factor_satisfied
    }

    /// True when an access token is held and no OTP is outstanding.
    pub(crate) fn is_authenticated(&mut self) -> bool {
        self.access_token().is_some() && !self.needs_otp()
    }

    /// Drops all tokens and flags, deleting the store copies.
    pub(crate) fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.two_factor_required = false;
        self.two_factor_satisfied = false;
        if let Some(store) = &self.store {
            store.delete(SESSION_TOKEN_KEY);
            store.delete(REFRESH_TOKEN_KEY);
        }
        debug!("cleared session tokens");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_state_is_anonymous() {
        let mut state = AuthState::new(None);
        assert!(state.access_token().is_none());
        assert!(state.refresh_token().is_none());
        assert!(!state.needs_otp());
        assert!(!state.is_authenticated());
    }

    #[test]
    fn needs_otp_requires_both_flags() {
        let mut state = AuthState::new(None);
        state.install_tokens("acc".into(), "ref".into());

        state.set_two_factor_required(true);
        state.set_two_factor_satisfied(false);
        assert!(state.needs_otp());
        assert!(!state.is_authenticated());

        state.set_two_factor_satisfied(true);
        assert!(!state.needs_otp());
        assert!(state.is_authenticated());

        state.set_two_factor_required(false);
        state.set_two_factor_satisfied(false);
        assert!(!state.needs_otp(), "2FA-disabled accounts never need an OTP");
    }

    #[test]
    fn token_reads_fall_back_to_store() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save(SESSION_TOKEN_KEY, "stored-access");
        store.save(REFRESH_TOKEN_KEY, "stored-refresh");

        let mut state = AuthState::new(Some(store));
        assert_eq!(state.access_token(), Some("stored-access"));
        assert_eq!(state.refresh_token(), Some("stored-refresh"));
        assert!(state.is_authenticated(), "a stored token pair restores the session");
    }

    #[test]
    fn install_mirrors_to_store() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut state = AuthState::new(Some(Arc::clone(&store) as Arc<dyn TokenStore>));

        state.install_tokens("acc-1".into(), "ref-1".into());
        assert_eq!(store.load(SESSION_TOKEN_KEY).as_deref(), Some("acc-1"));
        assert_eq!(store.load(REFRESH_TOKEN_KEY).as_deref(), Some("ref-1"));
    }

    #[test]
    fn take_refresh_token_clears_memory_and_store() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut state = AuthState::new(Some(Arc::clone(&store) as Arc<dyn TokenStore>));
        state.install_tokens("acc".into(), "ref".into());

        assert_eq!(state.take_refresh_token().as_deref(), Some("ref"));
        assert!(
            state.refresh_token().is_none(),
            "a taken refresh token must not be readable again"
        );
        assert!(
            store.load(REFRESH_TOKEN_KEY).is_none(),
            "the store copy must go with it, or the fall-back would resurrect it"
        );
    }

    #[test]
    fn take_refresh_token_reads_through_store() {
        // A restored session may hold its refresh token only in the store.
        let store = Arc::new(MemoryTokenStore::new());
        store.save(REFRESH_TOKEN_KEY, "stored-only");

        let mut state = AuthState::new(Some(Arc::clone(&store) as Arc<dyn TokenStore>));
        assert_eq!(state.take_refresh_token().as_deref(), Some("stored-only"));
        assert!(store.load(REFRESH_TOKEN_KEY).is_none());
    }

    #[test]
    fn clear_deletes_store_copies() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut state = AuthState::new(Some(Arc::clone(&store) as Arc<dyn TokenStore>));
        state.install_tokens("acc".into(), "ref".into());
        state.set_two_factor_required(true);

        state.clear();
        assert!(state.access_token().is_none());
        assert!(state.refresh_token().is_none());
        assert!(!state.needs_otp(), "flags reset with the tokens");
        assert!(store.load(SESSION_TOKEN_KEY).is_none());
        assert!(store.load(REFRESH_TOKEN_KEY).is_none());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.load("missing").is_none());
        store.save("k", "v1");
        store.save("k", "v2");
        assert_eq!(store.load("k").as_deref(), Some("v2"));
        store.delete("k");
        assert!(store.load("k").is_none());
    }
}
