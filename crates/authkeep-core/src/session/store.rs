//! The session store: startup restore, sign-in and sign-out.
//!
//! State is published through a `tokio::sync::watch` channel. Every
//! transition happens inside a single `send_modify`/`send_if_modified`
//! call, so subscribers never observe a half-applied change and token
//! storage stays in step with the published state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, AuthBackend};
use crate::auth::TokenStore;
use crate::models::{SignInCredentials, User};

use super::{AuthError, SessionPhase, SessionState};

/// Handle to the client's authentication session.
/// Clone is cheap - clones share the same state.
pub struct SessionStore<B = ApiClient> {
    inner: Arc<Inner<B>>,
}

struct Inner<B> {
    backend: B,
    tokens: Box<dyn TokenStore>,
    state: watch::Sender<SessionState>,
    /// Serializes overlapping sign-ins in call order
    sign_in_lock: Mutex<()>,
    /// Bumped by every sign-out; responses from an older epoch are discarded
    epoch: AtomicU64,
}

impl<B> Clone for SessionStore<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AuthBackend> SessionStore<B> {
    /// Create the store and start restoring the session from the persisted
    /// token in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(backend: B, tokens: impl TokenStore + 'static) -> Self {
        let (state, _) = watch::channel(SessionState::bootstrapping());
        let inner = Arc::new(Inner {
            backend,
            tokens: Box::new(tokens),
            state,
            sign_in_lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
        });

        tokio::spawn(restore(Arc::clone(&inner)));

        Self { inner }
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Current snapshot of the session
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn loading_user_data(&self) -> bool {
        self.inner.state.borrow().loading_user_data
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.borrow().phase()
    }

    /// Receiver that is notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait for the startup restore to resolve and return the state at that
    /// point.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, so the channel cannot close here
        let state = match rx.wait_for(|s| !s.loading_user_data).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Exchange credentials for a session.
    ///
    /// Waits for the startup restore first, so the result always lands after
    /// it. On failure the state is left untouched and the error is returned.
    pub async fn sign_in(&self, credentials: &SignInCredentials) -> Result<(), AuthError> {
        if credentials.is_incomplete() {
            return Err(AuthError::MissingCredentials);
        }

        self.ready().await;

        let _guard = self.inner.sign_in_lock.lock().await;
        let epoch = self.inner.epoch.load(Ordering::SeqCst);

        let response = match self.inner.backend.sign_in(credentials).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, email = %credentials.email, "Sign-in failed");
                return Err(e.into());
            }
        };

        let inner = &self.inner;
        let mut user = Some(response.user);
        let applied = inner.state.send_if_modified(|s| {
            if inner.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            if let Err(e) = inner.tokens.set(&response.token) {
                warn!(error = %e, "Failed to persist token");
            }
            if let Some(user) = user.take() {
                s.authenticate(user);
            }
            true
        });

        if !applied {
            warn!("Signed out while sign-in was in progress, discarding session");
            return Err(AuthError::SignedOut);
        }

        info!(email = %credentials.email, "Sign-in successful");
        Ok(())
    }

    /// End the session.
    ///
    /// The persisted token is removed and the state reset immediately. The
    /// backend is then notified in the background; its failure is logged and
    /// does not affect local state. The returned handle resolves once that
    /// request finishes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn sign_out(&self) -> JoinHandle<()> {
        let inner = &self.inner;
        let mut token = None;

        inner.state.send_modify(|s| {
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            token = match inner.tokens.get() {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "Failed to read persisted token");
                    None
                }
            };
            if let Err(e) = inner.tokens.remove() {
                warn!(error = %e, "Failed to remove persisted token");
            }
            s.clear();
        });
        info!("Signed out");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            match inner.backend.sign_out(token.as_deref()).await {
                Ok(()) => debug!("Sign-out acknowledged by backend"),
                Err(e) => warn!(error = %e, "Sign-out request failed"),
            }
        })
    }
}

/// Startup restore. Resolves `loading_user_data` exactly once.
async fn restore<B: AuthBackend>(inner: Arc<Inner<B>>) {
    let epoch = inner.epoch.load(Ordering::SeqCst);

    let token = match inner.tokens.get() {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "Failed to read persisted token");
            None
        }
    };

    let Some(token) = token else {
        debug!("No persisted token, starting unauthenticated");
        inner.state.send_modify(|s| s.loading_user_data = false);
        return;
    };

    let result = inner.backend.fetch_user(&token).await;

    inner.state.send_modify(|s| {
        let current = inner.epoch.load(Ordering::SeqCst) == epoch;
        match result {
            Ok(user) if current => {
                info!(user_id = %user.id, "Session restored");
                s.authenticate(user);
            }
            Ok(_) => debug!("Signed out during restore, discarding profile"),
            Err(e) => {
                warn!(error = %e, "Failed to restore session");
                if current {
                    if let Err(e) = inner.tokens.remove() {
                        warn!(error = %e, "Failed to remove rejected token");
                    }
                }
            }
        }
        s.loading_user_data = false;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;

    use crate::api::ApiError;
    use crate::auth::{FileTokenStore, MemoryTokenStore};
    use crate::models::SignInResponse;

    fn user() -> User {
        User {
            id: "1".to_string(),
            name: "A".to_string(),
            email: "a@b.com".to_string(),
        }
    }

    fn good_credentials() -> SignInCredentials {
        SignInCredentials::new("a@b.com", "pw")
    }

    /// Backend that accepts token `T1` and credentials `a@b.com` / `pw`.
    #[derive(Clone, Default)]
    struct FakeBackend {
        fail_sign_out: bool,
        restore_gate: Option<Arc<Notify>>,
        sign_in_gate: Option<Arc<Notify>>,
        fetch_user_calls: Arc<AtomicUsize>,
        sign_in_calls: Arc<AtomicUsize>,
        sign_out_tokens: Arc<std::sync::Mutex<Vec<Option<String>>>>,
    }

    impl FakeBackend {
        fn sign_out_tokens(&self) -> Vec<Option<String>> {
            self.sign_out_tokens.lock().unwrap().clone()
        }
    }

    impl AuthBackend for FakeBackend {
        async fn fetch_user(&self, token: &str) -> Result<User, ApiError> {
            self.fetch_user_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.restore_gate {
                gate.notified().await;
            }
            match token {
                "T1" => Ok(user()),
                "T-outage" => Err(ApiError::ServerError("unavailable".to_string())),
                _ => Err(ApiError::Unauthorized),
            }
        }

        async fn sign_in(&self, credentials: &SignInCredentials) -> Result<SignInResponse, ApiError> {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.sign_in_gate {
                gate.notified().await;
            }
            if credentials.email == "a@b.com" && credentials.password == "pw" {
                Ok(SignInResponse {
                    token: "T1".to_string(),
                    user: user(),
                })
            } else {
                Err(ApiError::Unauthorized)
            }
        }

        async fn sign_out(&self, token: Option<&str>) -> Result<(), ApiError> {
            self.sign_out_tokens
                .lock()
                .unwrap()
                .push(token.map(str::to_string));
            if self.fail_sign_out {
                Err(ApiError::ServerError("down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Token store whose reads always fail
    struct UnreadableTokenStore;

    impl TokenStore for UnreadableTokenStore {
        fn get(&self) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("storage unavailable"))
        }

        fn set(&self, _token: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("storage unavailable"))
        }

        fn remove(&self) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("storage unavailable"))
        }
    }

    // -------------------------------------------------------------------------
    // Restore
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_restore_without_token() {
        let store = SessionStore::start(FakeBackend::default(), MemoryTokenStore::new());
        let mut rx = store.subscribe();

        let initial = store.state();
        assert!(initial.loading_user_data);
        assert!(!initial.is_authenticated);

        rx.changed().await.unwrap();
        let after = rx.borrow_and_update().clone();
        assert!(!after.loading_user_data);
        assert!(!after.is_authenticated);
        assert_eq!(after.user, None);
        assert_eq!(store.phase(), SessionPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_restore_with_valid_token() {
        let tokens = MemoryTokenStore::with_token("T1");
        let store = SessionStore::start(FakeBackend::default(), tokens.clone());

        let state = store.ready().await;
        assert_eq!(
            state,
            SessionState {
                user: Some(user()),
                is_authenticated: true,
                loading_user_data: false,
            }
        );
        assert_eq!(tokens.get().unwrap().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_restore_with_rejected_token() {
        let tokens = MemoryTokenStore::with_token("expired");
        let store = SessionStore::start(FakeBackend::default(), tokens.clone());

        let state = store.ready().await;
        assert!(!state.is_authenticated);
        assert!(!state.loading_user_data);
        assert_eq!(state.user, None);
        assert_eq!(tokens.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_with_server_error() {
        let backend = FakeBackend::default();
        let tokens = MemoryTokenStore::with_token("T-outage");
        let store = SessionStore::start(backend.clone(), tokens.clone());

        let state = store.ready().await;
        assert_eq!(
            state,
            SessionState {
                user: None,
                is_authenticated: false,
                loading_user_data: false,
            }
        );
        assert_eq!(tokens.get().unwrap(), None);
        assert_eq!(backend.fetch_user_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restore_with_unreadable_token_store() {
        let backend = FakeBackend::default();
        let store = SessionStore::start(backend.clone(), UnreadableTokenStore);

        let state = store.ready().await;
        assert_eq!(
            state,
            SessionState {
                user: None,
                is_authenticated: false,
                loading_user_data: false,
            }
        );
        assert_eq!(backend.fetch_user_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_pending_until_backend_answers() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            restore_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let store = SessionStore::start(backend, MemoryTokenStore::with_token("T1"));

        tokio::task::yield_now().await;
        assert!(store.loading_user_data());
        assert!(!store.is_authenticated());

        gate.notify_one();
        let state = store.ready().await;
        assert!(state.is_authenticated);
        assert!(!store.loading_user_data());
    }

    #[tokio::test]
    async fn test_sign_out_during_restore_wins() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            restore_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let tokens = MemoryTokenStore::with_token("T1");
        let store = SessionStore::start(backend, tokens.clone());
        tokio::task::yield_now().await;

        store.sign_out().await.unwrap();
        assert!(store.loading_user_data());

        gate.notify_one();
        let state = store.ready().await;
        assert!(!state.is_authenticated);
        assert_eq!(state.user, None);
        assert_eq!(tokens.get().unwrap(), None);
    }

    // -------------------------------------------------------------------------
    // Sign-in / sign-out
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_sign_in_then_sign_out() {
        let backend = FakeBackend::default();
        let tokens = MemoryTokenStore::new();
        let store = SessionStore::start(backend.clone(), tokens.clone());
        store.ready().await;

        store.sign_in(&good_credentials()).await.expect("sign_in failed");
        assert_eq!(tokens.get().unwrap().as_deref(), Some("T1"));
        assert!(store.is_authenticated());
        assert_eq!(store.user(), Some(user()));

        store.sign_out().await.unwrap();
        assert_eq!(tokens.get().unwrap(), None);
        assert!(!store.is_authenticated());
        assert_eq!(store.user(), None);
        assert!(!store.loading_user_data());
        assert_eq!(backend.sign_out_tokens(), vec![Some("T1".to_string())]);
    }

    #[tokio::test]
    async fn test_sign_in_rejected_leaves_state_unchanged() {
        let tokens = MemoryTokenStore::new();
        let store = SessionStore::start(FakeBackend::default(), tokens.clone());
        let before = store.ready().await;

        let err = store
            .sign_in(&SignInCredentials::new("a@b.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(store.state(), before);
        assert_eq!(tokens.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_in_rejected_keeps_existing_session() {
        let tokens = MemoryTokenStore::with_token("T1");
        let store = SessionStore::start(FakeBackend::default(), tokens.clone());
        let before = store.ready().await;
        assert!(before.is_authenticated);

        assert!(store
            .sign_in(&SignInCredentials::new("a@b.com", "wrong"))
            .await
            .is_err());
        assert_eq!(store.state(), before);
        assert_eq!(tokens.get().unwrap().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_blank_credentials_never_reach_backend() {
        let backend = FakeBackend::default();
        let store = SessionStore::start(backend.clone(), MemoryTokenStore::new());
        store.ready().await;

        let err = store
            .sign_in(&SignInCredentials::new("", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
        assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_in_waits_for_restore() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            restore_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let store = SessionStore::start(backend.clone(), MemoryTokenStore::with_token("expired"));

        let signing_in = {
            let store = store.clone();
            tokio::spawn(async move { store.sign_in(&good_credentials()).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 0);

        // The failed restore must not clobber the later sign-in
        gate.notify_one();
        signing_in.await.unwrap().expect("sign_in failed");
        assert!(store.is_authenticated());
        assert!(!store.loading_user_data());
    }

    #[tokio::test]
    async fn test_sign_out_during_sign_in_wins() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend {
            sign_in_gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        let tokens = MemoryTokenStore::new();
        let store = SessionStore::start(backend.clone(), tokens.clone());
        store.ready().await;

        let signing_in = {
            let store = store.clone();
            tokio::spawn(async move { store.sign_in(&good_credentials()).await })
        };
        while backend.sign_in_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        store.sign_out().await.unwrap();
        gate.notify_one();

        let err = signing_in.await.unwrap().unwrap_err();
        assert!(matches!(err, AuthError::SignedOut));
        assert!(!store.is_authenticated());
        assert_eq!(tokens.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_out_when_unauthenticated() {
        let backend = FakeBackend::default();
        let tokens = MemoryTokenStore::new();
        let store = SessionStore::start(backend.clone(), tokens.clone());
        let before = store.ready().await;

        store.sign_out().await.unwrap();
        assert_eq!(store.state(), before);
        assert_eq!(tokens.get().unwrap(), None);
        assert_eq!(backend.sign_out_tokens(), vec![None]);
    }

    #[tokio::test]
    async fn test_sign_out_resets_even_when_backend_fails() {
        let backend = FakeBackend {
            fail_sign_out: true,
            ..Default::default()
        };
        let tokens = MemoryTokenStore::with_token("T1");
        let store = SessionStore::start(backend, tokens.clone());
        assert!(store.ready().await.is_authenticated);

        store.sign_out().await.unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(store.user(), None);
        assert_eq!(tokens.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_overlapping_sign_ins_serialized() {
        let backend = FakeBackend::default();
        let store = SessionStore::start(backend.clone(), MemoryTokenStore::new());
        store.ready().await;

        let good = good_credentials();
        let bad = SignInCredentials::new("a@b.com", "wrong");
        let (first, second) = tokio::join!(store.sign_in(&good), store.sign_in(&bad));
        assert!(first.is_ok());
        assert!(second.is_err());

        // The failed second attempt leaves the first session in place
        assert!(store.is_authenticated());
        assert_eq!(backend.sign_in_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_session_survives_restart_with_file_store() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let store = SessionStore::start(
            FakeBackend::default(),
            FileTokenStore::new(dir.path().to_path_buf()),
        );
        store.ready().await;
        store.sign_in(&good_credentials()).await.expect("sign_in failed");
        drop(store);

        let restarted = SessionStore::start(
            FakeBackend::default(),
            FileTokenStore::new(dir.path().to_path_buf()),
        );
        let state = restarted.ready().await;
        assert!(state.is_authenticated);
        assert_eq!(state.user, Some(user()));
    }
}
