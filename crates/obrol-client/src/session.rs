//! Login, registration, restore and logout.
//!
//! A [`Session`] exists from a successful authentication until
//! [`SessionManager::logout`].  Only the server-issued [`SessionToken`] is
//! ever written to the cache; credentials stay in memory for the duration of
//! one call.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use obrol_net::{AuthBackend, AuthError, FeedChannel};
use obrol_shared::{Credentials, CredentialsError, Message, SessionToken, SyncError, UserIdentity};
use obrol_store::{CacheStore, SessionCache};

use crate::actor::{spawn_engine, EngineHandle};
use crate::events::EngineEvent;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid credentials: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// One signed-in user with a running sync engine.
#[derive(Debug)]
pub struct Session {
    token: SessionToken,
    handle: EngineHandle,
    events: Option<mpsc::Receiver<EngineEvent>>,
    initial_view: Vec<Message>,
    task: JoinHandle<()>,
}

impl Session {
    pub fn user(&self) -> &UserIdentity {
        &self.token.user
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// The cached view the engine started from.
    pub fn initial_view(&self) -> &[Message] {
        &self.initial_view
    }

    /// The engine's event stream.  Can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.events.take()
    }

    /// Send `text` as this session's user.
    pub async fn send(&self, text: impl Into<String>) -> Result<Message, SyncError> {
        self.handle.compose(text).await
    }

    /// Stop the engine but stay signed in, so the next start restores.
    pub async fn close(self) {
        let Session {
            token,
            handle,
            events,
            task,
            ..
        } = self;
        stop_engine(&token.user, &handle, events, task).await;
    }
}

/// Cancel the engine and wait for its task.  An untaken event receiver is
/// dropped first so pending emits fail instead of waiting for a reader.
async fn stop_engine(
    user: &UserIdentity,
    handle: &EngineHandle,
    events: Option<mpsc::Receiver<EngineEvent>>,
    task: JoinHandle<()>,
) {
    drop(events);
    handle.shutdown();
    if let Err(e) = task.await {
        warn!(user = %user, error = %e, "Sync engine task ended abnormally");
    }
}

/// Owns the collaborators every session needs and creates or ends sessions.
pub struct SessionManager<A: AuthBackend, F: FeedChannel> {
    auth: Arc<A>,
    feed: Arc<F>,
    store: Arc<dyn CacheStore>,
    tokens: SessionCache,
    event_buffer: usize,
}

impl<A: AuthBackend, F: FeedChannel> SessionManager<A, F> {
    pub fn new(auth: Arc<A>, feed: Arc<F>, store: Arc<dyn CacheStore>, event_buffer: usize) -> Self {
        Self {
            auth,
            feed,
            tokens: SessionCache::new(store.clone()),
            store,
            event_buffer,
        }
    }

    /// Create an account and sign straight into it.
    pub async fn register(
        &self,
        credentials: &Credentials,
        confirmation: &str,
    ) -> Result<Session, SessionError> {
        credentials.validate_registration(confirmation)?;
        let token = self.auth.register(credentials).await?;
        info!(user = %token.user, "Account registered");
        Ok(self.begin(token))
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        credentials.validate_login()?;
        let token = self.auth.sign_in(credentials).await?;
        info!(user = %token.user, "Signed in");
        Ok(self.begin(token))
    }

    /// Resume the stored session, if there is one and the backend still
    /// accepts its token.
    ///
    /// A rejected token is removed from the cache.  Any other backend
    /// failure is returned and the token is kept for the next attempt.
    pub async fn restore(&self) -> Result<Option<Session>, SessionError> {
        let stored = match self.tokens.load() {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, starting signed out");
                return Ok(None);
            }
        };

        match self.auth.resume(&stored).await {
            Ok(user) => {
                info!(user = %user, "Session restored");
                let token = SessionToken { user, ..stored };
                Ok(Some(self.begin(token)))
            }
            Err(AuthError::InvalidToken) => {
                info!(user = %stored.user, "Stored session no longer valid, clearing it");
                self.forget_token();
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// End `session`: forget its token, sign it out at the backend and stop
    /// its engine.  The user's cached view and queue stay for next time.
    pub async fn logout(&self, session: Session) {
        let Session {
            token,
            handle,
            events,
            task,
            ..
        } = session;

        self.forget_token();

        if let Err(e) = self.auth.sign_out(&token).await {
            warn!(user = %token.user, error = %e, "Backend sign-out failed");
        }

        stop_engine(&token.user, &handle, events, task).await;
        info!(user = %token.user, "Logged out");
    }

    fn begin(&self, token: SessionToken) -> Session {
        if let Err(e) = self.tokens.save(&token) {
            warn!(user = %token.user, error = %e, "Failed to persist session token");
        }

        let spawned = spawn_engine(
            token.user.clone(),
            self.store.clone(),
            self.feed.clone(),
            self.event_buffer,
        );

        Session {
            token,
            handle: spawned.handle,
            events: Some(spawned.events),
            initial_view: spawned.initial_view,
            task: spawned.task,
        }
    }

    fn forget_token(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use obrol_net::{LoopbackAuth, LoopbackFeed};
    use obrol_shared::constants::SESSION_KEY;
    use obrol_store::MemoryStore;

    use super::*;

    const PASSWORD: &str = "rahasia123";

    struct Fixture {
        auth: LoopbackAuth,
        feed: LoopbackFeed,
        store: Arc<dyn CacheStore>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                auth: LoopbackAuth::new(),
                feed: LoopbackFeed::new(),
                store: Arc::new(MemoryStore::new()),
            }
        }

        fn manager(&self) -> SessionManager<LoopbackAuth, LoopbackFeed> {
            self.manager_with_buffer(64)
        }

        fn manager_with_buffer(
            &self,
            event_buffer: usize,
        ) -> SessionManager<LoopbackAuth, LoopbackFeed> {
            SessionManager::new(
                Arc::new(self.auth.clone()),
                Arc::new(self.feed.clone()),
                self.store.clone(),
                event_buffer,
            )
        }
    }

    fn ana() -> Credentials {
        Credentials::new("ana@example.com", PASSWORD)
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_confirmation() {
        let fx = Fixture::new();
        let err = fx
            .manager()
            .register(&ana(), "something-else")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Credentials(CredentialsError::ConfirmationMismatch)
        ));
        assert_eq!(fx.auth.active_tokens(), 0);
        assert!(fx.store.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let fx = Fixture::new();
        let creds = Credentials::new("ana@example.com", "abc");
        let err = fx.manager().register(&creds, "abc").await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Credentials(CredentialsError::PasswordTooShort { min: 6 })
        ));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_fails() {
        let fx = Fixture::new();
        let manager = fx.manager();
        let session = manager.register(&ana(), PASSWORD).await.unwrap();
        manager.logout(session).await;

        let err = manager
            .login(&Credentials::new("ana@example.com", "wrong-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_persists_token_but_never_password() {
        let fx = Fixture::new();
        let manager = fx.manager();
        let session = manager.register(&ana(), PASSWORD).await.unwrap();

        let raw = fx.store.get(SESSION_KEY).unwrap().expect("token stored");
        let raw = String::from_utf8(raw).unwrap();
        assert!(raw.contains(&session.token().token));
        assert!(!raw.contains(PASSWORD));
        assert_eq!(session.user().as_str(), "ana@example.com");
    }

    #[tokio::test]
    async fn test_restore_without_token_is_signed_out() {
        let fx = Fixture::new();
        assert!(fx.manager().restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_resumes_stored_session() {
        let fx = Fixture::new();
        let first = fx.manager().register(&ana(), PASSWORD).await.unwrap();
        let token = first.token().clone();

        // A fresh manager, as after an app restart.
        let restored = fx.manager().restore().await.unwrap().expect("session");
        assert_eq!(restored.user(), first.user());
        assert_eq!(restored.token().token, token.token);
    }

    #[tokio::test]
    async fn test_restore_with_revoked_token_clears_it() {
        let fx = Fixture::new();
        let session = fx.manager().register(&ana(), PASSWORD).await.unwrap();
        fx.auth.revoke_all(session.user());

        assert!(fx.manager().restore().await.unwrap().is_none());
        assert!(fx.store.get(SESSION_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_stops_engine_and_keeps_cache() {
        let fx = Fixture::new();
        let manager = fx.manager();

        let session = manager.register(&ana(), PASSWORD).await.unwrap();
        session.send("sampai jumpa").await.unwrap();
        assert_eq!(fx.feed.subscriber_count(), 1);

        let handle = session.handle().clone();
        manager.logout(session).await;

        assert_eq!(fx.feed.subscriber_count(), 0);
        assert!(handle.is_closed());
        assert_eq!(fx.auth.active_tokens(), 0);
        assert!(fx.store.get(SESSION_KEY).unwrap().is_none());
        assert!(manager.restore().await.unwrap().is_none());

        fx.feed.set_online(false);
        let again = manager.login(&ana()).await.unwrap();
        let texts: Vec<&str> = again.initial_view().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["sampai jumpa"]);
    }

    #[tokio::test]
    async fn test_sessions_are_namespaced_per_user() {
        let fx = Fixture::new();
        let manager = fx.manager();

        fx.feed.set_online(false);
        let ana = manager.register(&ana(), PASSWORD).await.unwrap();
        ana.send("only mine").await.unwrap();
        manager.logout(ana).await;

        let budi = manager
            .register(&Credentials::new("budi@example.com", PASSWORD), PASSWORD)
            .await
            .unwrap();
        assert!(budi.initial_view().is_empty());
    }

    #[tokio::test]
    async fn test_close_keeps_token_for_restore() {
        let fx = Fixture::new();
        let session = fx.manager().register(&ana(), PASSWORD).await.unwrap();
        session.close().await;

        assert_eq!(fx.feed.subscriber_count(), 0);
        assert!(fx.manager().restore().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_logout_not_blocked_by_unread_events() {
        let fx = Fixture::new();
        let manager = fx.manager_with_buffer(4);
        let session = manager.register(&ana(), PASSWORD).await.unwrap();

        for n in 0..10 {
            fx.feed.insert_remote("budi@example.com", &format!("pesan {n}"));
        }

        tokio::time::timeout(Duration::from_secs(2), manager.logout(session))
            .await
            .expect("logout finishes with a full event channel");
        assert_eq!(fx.feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_not_blocked_by_unread_events() {
        let fx = Fixture::new();
        let manager = fx.manager_with_buffer(4);
        let session = manager.register(&ana(), PASSWORD).await.unwrap();

        for n in 0..10 {
            fx.feed.insert_remote("budi@example.com", &format!("pesan {n}"));
        }

        tokio::time::timeout(Duration::from_secs(2), session.close())
            .await
            .expect("close finishes with a full event channel");
        assert_eq!(fx.feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_events_can_be_taken_once() {
        let fx = Fixture::new();
        let mut session = fx.manager().register(&ana(), PASSWORD).await.unwrap();

        assert!(session.take_events().is_some());
        assert!(session.take_events().is_none());
    }
}
