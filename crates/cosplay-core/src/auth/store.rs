//! The app-wide session store.
//!
//! Tracks who is signed in and how many credits they have, keeps the
//! persisted copy in step with the in-memory one, and reconciles credits
//! against the remote authority on restore and sign-in. Every operation
//! degrades instead of failing: storage and network errors are logged and
//! the store falls back to defaults, the other medium, or memory only.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::Session;
use crate::api::{CreditAuthority, CreditClient};
use crate::config::Config;
use crate::storage::{FileStorage, KeyringStorage, SessionRepository};

/// Observable session state.
///
/// `Initializing` lasts until the first `restore()` finishes; consumers
/// should not route on authentication while it is showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionState {
    Initializing,
    Unauthenticated,
    Authenticated(Session),
}

impl SessionState {
    pub fn user(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Initializing)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

pub struct SessionStore {
    repository: SessionRepository,
    authority: Box<dyn CreditAuthority>,
    default_credits: u32,
    fetch_timeout: Duration,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(
        repository: SessionRepository,
        authority: impl CreditAuthority + 'static,
        config: &Config,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        Self {
            repository,
            authority: Box::new(authority),
            default_credits: config.default_credits,
            fetch_timeout: config.request_timeout(),
            state,
        }
    }

    /// Store backed by the data-directory file (primary), the OS keyring
    /// (secondary) and the HTTP credit authority.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let primary = FileStorage::new(config.data_dir()?);
        let secondary = KeyringStorage::new(config.keyring_service.clone());
        let authority = CreditClient::from_config(config)?;
        Ok(Self::new(
            SessionRepository::new(primary, secondary),
            authority,
            config,
        ))
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<Session> {
        self.state.borrow().user().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Wait until the initial restore has finished, then return the state
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.subscribe();
        let result = rx
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| (*state).clone());
        result.unwrap_or_else(|_| self.state())
    }

    fn publish(&self, next: SessionState) {
        debug!(authenticated = next.is_authenticated(), "Session state changed");
        self.state.send_replace(next);
    }

    /// Remote balance for `email`, or `None` if the authority failed or timed out.
    async fn fetch_remote_credits(&self, email: &str) -> Option<u32> {
        let fetch = self.authority.fetch_credits(email);
        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(credits)) => Some(credits),
            Ok(Err(e)) => {
                warn!(email, error = %e, "Failed to fetch remote credits");
                None
            }
            Err(_) => {
                warn!(
                    email,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "Remote credit fetch timed out"
                );
                None
            }
        }
    }

    /// Load the persisted session, if any, and refresh its credits.
    ///
    /// Ends the `Initializing` phase. A failed refresh keeps the persisted
    /// balance; a successful one is written back to storage.
    pub async fn restore(&self) -> SessionState {
        let Some(persisted) = self.repository.load().await else {
            info!("No persisted session");
            self.publish(SessionState::Unauthenticated);
            return SessionState::Unauthenticated;
        };

        match self.fetch_remote_credits(persisted.email()).await {
            Some(credits) => {
                let session = persisted.reconciled(credits);
                info!(email = session.email(), credits, "Restored session with remote credits");
                let next = SessionState::Authenticated(session.clone());
                self.publish(next.clone());
                self.repository.save(&session).await;
                next
            }
            None => {
                info!(
                    email = persisted.email(),
                    credits = persisted.credits(),
                    "Restored session with persisted credits"
                );
                let next = SessionState::Authenticated(persisted);
                self.publish(next.clone());
                next
            }
        }
    }

    /// Start a session for `email`.
    ///
    /// Credits come from the remote authority, or the configured default when
    /// it is unreachable. Returns `None` (and changes nothing) for a blank email.
    pub async fn sign_in(&self, email: &str) -> Option<Session> {
        if email.trim().is_empty() {
            warn!("Ignoring sign-in with empty email");
            return None;
        }

        let session = match self.fetch_remote_credits(email).await {
            Some(credits) => Session::new(email, credits).mark_synced(),
            None => {
                info!(email, credits = self.default_credits, "Using default credits");
                Session::new(email, self.default_credits)
            }
        };

        info!(email, credits = session.credits(), "Signed in");
        self.publish(SessionState::Authenticated(session.clone()));
        self.repository.save(&session).await;
        Some(session)
    }

    /// Replace the current balance. Not confirmed with the remote authority.
    ///
    /// No-op returning `None` when nobody is signed in.
    pub async fn update_credits(&self, new_amount: u32) -> Option<Session> {
        let mut updated = None;
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(session) => {
                *session = session.with_credits(new_amount);
                updated = Some(session.clone());
                true
            }
            _ => false,
        });

        let Some(session) = updated else {
            debug!(new_amount, "No session; ignoring credit update");
            return None;
        };

        debug!(email = session.email(), credits = new_amount, "Updated credits");
        self.repository.save(&session).await;
        Some(session)
    }

    /// End the session in memory and on every storage medium.
    pub async fn sign_out(&self) {
        if let Some(session) = self.user() {
            info!(email = session.email(), "Signing out");
        }
        self.publish(SessionState::Unauthenticated);
        self.repository.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::storage::{MemoryStorage, Storage, SESSION_KEY};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct StubAuthority {
        credits: Option<u32>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl StubAuthority {
        fn ok(credits: u32) -> Self {
            Self {
                credits: Some(credits),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                credits: None,
                ..Self::ok(0)
            }
        }

        fn slow(credits: u32, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::ok(credits)
            }
        }
    }

    #[async_trait]
    impl CreditAuthority for StubAuthority {
        async fn fetch_credits(&self, _email: &str) -> Result<u32, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.credits
                .ok_or_else(|| ApiError::ServerError("stub failure".to_string()))
        }
    }

    fn store_with(
        authority: StubAuthority,
        primary: &MemoryStorage,
        secondary: &MemoryStorage,
    ) -> SessionStore {
        SessionStore::new(
            SessionRepository::new(primary.clone(), secondary.clone()),
            authority,
            &Config::default(),
        )
    }

    #[tokio::test]
    async fn test_initial_state_is_initializing() {
        let store = store_with(StubAuthority::ok(1), &MemoryStorage::new(), &MemoryStorage::new());
        assert!(store.is_loading());
        assert!(store.user().is_none());
    }

    #[tokio::test]
    async fn test_restore_without_record_does_not_fetch() {
        let authority = StubAuthority::ok(5);
        let calls = authority.calls.clone();
        let store = store_with(authority, &MemoryStorage::new(), &MemoryStorage::new());

        assert_eq!(store.restore().await, SessionState::Unauthenticated);
        assert!(!store.is_loading());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_reconciles_and_persists_remote_credits() {
        let primary = MemoryStorage::new();
        let secondary = MemoryStorage::new();
        primary
            .set(SESSION_KEY, r#"{"email":"fox@example.com","name":"Fox","credits":3}"#)
            .await
            .unwrap();

        let store = store_with(StubAuthority::ok(40), &primary, &secondary);
        let state = store.restore().await;

        let user = state.user().unwrap();
        assert_eq!(user.credits(), 40);
        assert_eq!(user.name(), "Fox");
        assert!(user.credits_synced_at().is_some());

        let persisted: Session =
            serde_json::from_str(&secondary.peek(SESSION_KEY).unwrap()).unwrap();
        assert_eq!(persisted.credits(), 40);
    }

    #[tokio::test]
    async fn test_sign_in_notifies_subscribers() {
        let store = store_with(StubAuthority::ok(12), &MemoryStorage::new(), &MemoryStorage::new());
        let mut rx = store.subscribe();
        store.restore().await;

        store.sign_in("fox@example.com").await;

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        let user = state.user().unwrap();
        assert_eq!(user.email(), "fox@example.com");
        assert_eq!(user.credits(), 12);
    }

    #[tokio::test]
    async fn test_sign_in_with_blank_email_is_ignored() {
        let primary = MemoryStorage::new();
        let store = store_with(StubAuthority::ok(1), &primary, &MemoryStorage::new());
        store.restore().await;

        assert!(store.sign_in("   ").await.is_none());
        assert_eq!(store.state(), SessionState::Unauthenticated);
        assert!(primary.peek(SESSION_KEY).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_authority_falls_back_to_default() {
        let store = store_with(
            StubAuthority::slow(7, Duration::from_secs(60)),
            &MemoryStorage::new(),
            &MemoryStorage::new(),
        );

        let session = store.sign_in("fox@example.com").await.unwrap();
        assert_eq!(session.credits(), 100);
        assert!(session.credits_synced_at().is_none());
    }

    #[tokio::test]
    async fn test_update_credits_keeps_email_and_notifies() {
        let store = store_with(StubAuthority::ok(10), &MemoryStorage::new(), &MemoryStorage::new());
        store.sign_in("fox@example.com").await;
        let mut rx = store.subscribe();

        let updated = store.update_credits(9).await.unwrap();
        assert_eq!(updated.email(), "fox@example.com");
        assert_eq!(updated.credits(), 9);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().user().map(|u| u.credits()), Some(9));
    }

    #[tokio::test]
    async fn test_update_credits_without_session_does_not_notify() {
        let store = store_with(StubAuthority::ok(10), &MemoryStorage::new(), &MemoryStorage::new());
        store.restore().await;
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        assert!(store.update_credits(3).await.is_none());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_ready_resolves_after_restore() {
        let store = Arc::new(store_with(
            StubAuthority::ok(1),
            &MemoryStorage::new(),
            &MemoryStorage::new(),
        ));

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.ready().await })
        };
        store.restore().await;

        assert_eq!(waiter.await.unwrap(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_state_serializes_for_ui() {
        let state = SessionState::Authenticated(Session::new("fox@example.com", 2));
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            serde_json::json!({
                "status": "authenticated",
                "user": {"email": "fox@example.com", "name": "fox", "credits": 2}
            })
        );
        assert_eq!(
            serde_json::to_value(SessionState::Initializing).unwrap(),
            serde_json::json!({"status": "initializing"})
        );
    }
}
