//! Credential sessions and auth-state broadcasting.
//!
//! A [`Session`] pairs a user with the credential the device flow produced.
//! Storage is behind [`SessionStore`] so hosts can keep credentials in an OS
//! keychain or encrypted store; the engine ships [`MemorySessionStore`] for
//! tests and embedding. [`AuthStateBus`] fans the login state out to anything
//! that renders it.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use stremsync_model::{AuthKey, UserId};
use tokio::sync::watch;
use tracing::{info, warn};

/// A linked credential for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The user this credential belongs to.
    pub user_id: UserId,
    /// The account credential.
    pub auth_key: AuthKey,
    /// When the credential was linked.
    pub linked_at: SystemTime,
}

impl Session {
    /// Creates a session linked now.
    pub fn new(user_id: UserId, auth_key: AuthKey) -> Self {
        Self {
            user_id,
            auth_key,
            linked_at: SystemTime::now(),
        }
    }
}

/// Durable storage for sessions.
///
/// Errors are host-defined strings; the engine surfaces them without
/// interpreting them.
pub trait SessionStore: Send + Sync {
    /// Loads the stored session for a user, if any.
    fn load(&self, user_id: &UserId) -> Result<Option<Session>, String>;

    /// Persists a session, replacing any previous one for the same user.
    fn save(&self, session: &Session) -> Result<(), String>;

    /// Removes the stored session for a user. Removing an absent session is
    /// not an error.
    fn clear(&self, user_id: &UserId) -> Result<(), String>;
}

/// In-memory [`SessionStore`].
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, user_id: &UserId) -> Result<Option<Session>, String> {
        Ok(self.sessions.read().get(user_id).cloned())
    }

    fn save(&self, session: &Session) -> Result<(), String> {
        self.sessions.write().insert(session.user_id, session.clone());
        Ok(())
    }

    fn clear(&self, user_id: &UserId) -> Result<(), String> {
        self.sessions.write().remove(user_id);
        Ok(())
    }
}

/// Observable login state for one user slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No credential is held.
    LoggedOut,
    /// A credential is held for this user.
    LoggedIn(UserId),
    /// The remote rejected the held credential; the user must re-link.
    Expired(UserId),
}

/// Broadcasts [`AuthState`] changes to subscribers.
pub struct AuthStateBus {
    tx: watch::Sender<AuthState>,
}

impl AuthStateBus {
    /// Creates a bus starting logged out.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthState::LoggedOut);
        Self { tx }
    }

    /// The current state.
    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    fn publish(&self, state: AuthState) {
        self.tx.send_replace(state);
    }
}

impl Default for AuthStateBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Ties session storage to the auth-state bus.
///
/// All credential transitions go through here so storage and the published
/// state never disagree.
pub struct SessionManager<S: SessionStore> {
    store: Arc<S>,
    bus: AuthStateBus,
}

impl<S: SessionStore> SessionManager<S> {
    /// Creates a manager over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            bus: AuthStateBus::new(),
        }
    }

    /// The bus carrying this manager's state.
    pub fn bus(&self) -> &AuthStateBus {
        &self.bus
    }

    /// Loads the stored session at startup and publishes the matching state.
    pub fn restore(&self, user_id: &UserId) -> Result<Option<Session>, String> {
        let session = self.store.load(user_id)?;
        match &session {
            Some(s) => self.bus.publish(AuthState::LoggedIn(s.user_id)),
            None => self.bus.publish(AuthState::LoggedOut),
        }
        Ok(session)
    }

    /// Accepts a freshly granted credential for a user.
    ///
    /// Shaped to back [`FlowEvents::on_credential`]: a storage failure is
    /// returned as the callback's rejection reason.
    ///
    /// [`FlowEvents::on_credential`]: crate::device_flow::FlowEvents::on_credential
    pub fn accept_credential(&self, user_id: UserId, auth_key: AuthKey) -> Result<(), String> {
        let session = Session::new(user_id, auth_key);
        self.store.save(&session)?;
        self.bus.publish(AuthState::LoggedIn(user_id));
        info!(%user_id, "credential linked");
        Ok(())
    }

    /// Loads the session for a user without touching the published state.
    pub fn session(&self, user_id: &UserId) -> Result<Option<Session>, String> {
        self.store.load(user_id)
    }

    /// Drops the stored credential and publishes `LoggedOut`.
    pub fn logout(&self, user_id: &UserId) -> Result<(), String> {
        self.store.clear(user_id)?;
        self.bus.publish(AuthState::LoggedOut);
        info!(%user_id, "logged out");
        Ok(())
    }

    /// Reacts to the remote rejecting the credential: the stored session is
    /// dropped and `Expired` is published so hosts can prompt a re-link.
    pub fn credential_expired(&self, user_id: &UserId) -> Result<(), String> {
        self.store.clear(user_id)?;
        self.bus.publish(AuthState::Expired(*user_id));
        warn!(%user_id, "credential expired, session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager<MemorySessionStore> {
        SessionManager::new(Arc::new(MemorySessionStore::new()))
    }

    #[test]
    fn accept_stores_and_publishes() {
        let manager = manager();
        let user_id = UserId::new();

        manager
            .accept_credential(user_id, AuthKey::new("granted"))
            .unwrap();

        assert_eq!(manager.bus().current(), AuthState::LoggedIn(user_id));
        let session = manager.session(&user_id).unwrap().unwrap();
        assert_eq!(session.auth_key, AuthKey::new("granted"));
    }

    #[test]
    fn logout_clears_and_publishes() {
        let manager = manager();
        let user_id = UserId::new();
        manager
            .accept_credential(user_id, AuthKey::new("granted"))
            .unwrap();

        manager.logout(&user_id).unwrap();
        assert_eq!(manager.bus().current(), AuthState::LoggedOut);
        assert!(manager.session(&user_id).unwrap().is_none());
    }

    #[test]
    fn expiry_clears_and_flags_relink() {
        let manager = manager();
        let user_id = UserId::new();
        manager
            .accept_credential(user_id, AuthKey::new("granted"))
            .unwrap();

        manager.credential_expired(&user_id).unwrap();
        assert_eq!(manager.bus().current(), AuthState::Expired(user_id));
        assert!(manager.session(&user_id).unwrap().is_none());
    }

    #[test]
    fn restore_publishes_stored_state() {
        let store = Arc::new(MemorySessionStore::new());
        let user_id = UserId::new();
        store
            .save(&Session::new(user_id, AuthKey::new("granted")))
            .unwrap();

        let manager = SessionManager::new(Arc::clone(&store));
        let restored = manager.restore(&user_id).unwrap();
        assert!(restored.is_some());
        assert_eq!(manager.bus().current(), AuthState::LoggedIn(user_id));

        let other = manager.restore(&UserId::new()).unwrap();
        assert!(other.is_none());
        assert_eq!(manager.bus().current(), AuthState::LoggedOut);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let manager = manager();
        let mut rx = manager.bus().subscribe();
        let user_id = UserId::new();

        manager
            .accept_credential(user_id, AuthKey::new("granted"))
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::LoggedIn(user_id));

        manager.logout(&user_id).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::LoggedOut);
    }
}
