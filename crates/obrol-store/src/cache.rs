//! Typed views over a [`CacheStore`].
//!
//! [`UserCache`] namespaces the merged message view and the pending queue by
//! user identity (`messages:<user>`, `pending:<user>`).  [`SessionCache`]
//! holds the single persisted session token under `session`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use obrol_shared::constants::SESSION_KEY;
use obrol_shared::{Message, SessionToken, UserIdentity};

use crate::error::Result;
use crate::store::CacheStore;

fn read_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
        None => Ok(None),
    }
}

fn write_json<T: Serialize + ?Sized>(store: &dyn CacheStore, key: &str, value: &T) -> Result<()> {
    let blob = serde_json::to_vec(value)?;
    store.set(key, &blob)
}

/// Per-user cache of the merged view and the outbound queue.
#[derive(Clone)]
pub struct UserCache {
    store: Arc<dyn CacheStore>,
    user: UserIdentity,
}

impl UserCache {
    pub fn new(store: Arc<dyn CacheStore>, user: UserIdentity) -> Self {
        Self { store, user }
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Last persisted merged view, `None` on first run.
    pub fn load_view(&self) -> Result<Option<Vec<Message>>> {
        read_json(self.store.as_ref(), &self.user.messages_key())
    }

    pub fn save_view(&self, view: &[Message]) -> Result<()> {
        write_json(self.store.as_ref(), &self.user.messages_key(), view)
    }

    /// Persisted outbound queue, `None` if nothing was ever queued.
    pub fn load_pending(&self) -> Result<Option<Vec<Message>>> {
        read_json(self.store.as_ref(), &self.user.pending_key())
    }

    pub fn save_pending(&self, pending: &[Message]) -> Result<()> {
        write_json(self.store.as_ref(), &self.user.pending_key(), pending)
    }
}

/// Persisted session token (never credentials).
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn CacheStore>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<Option<SessionToken>> {
        read_json(self.store.as_ref(), SESSION_KEY)
    }

    pub fn save(&self, token: &SessionToken) -> Result<()> {
        write_json(self.store.as_ref(), SESSION_KEY, token)
    }

    /// Returns `true` if a token was stored.
    pub fn clear(&self) -> Result<bool> {
        self.store.remove(SESSION_KEY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    fn synced(id: &str, text: &str, secs: i64) -> Message {
        Message {
            id: id.into(),
            text: text.into(),
            author: "ana@example.com".into(),
            created_at: DateTime::<Utc>::from_timestamp(secs, 0),
            synced: true,
        }
    }

    #[test]
    fn view_round_trip() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cache = UserCache::new(store, UserIdentity::new("ana@example.com"));

        assert_eq!(cache.load_view().unwrap(), None);

        let view = vec![
            synced("a", "hi", 10),
            synced("b", "there", 20),
            Message::provisional("local_1_0", "ana@example.com", "pending"),
        ];
        cache.save_view(&view).unwrap();
        assert_eq!(cache.load_view().unwrap(), Some(view));
    }

    #[test]
    fn users_are_isolated() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let ana = UserCache::new(store.clone(), UserIdentity::new("ana"));
        let budi = UserCache::new(store, UserIdentity::new("budi"));

        ana.save_pending(&[Message::provisional("local_1_0", "ana", "x")])
            .unwrap();
        assert_eq!(budi.load_pending().unwrap(), None);
        assert_eq!(ana.load_pending().unwrap().map(|p| p.len()), Some(1));
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        store.set("messages:ana", b"not json").unwrap();

        let cache = UserCache::new(store, UserIdentity::new("ana"));
        assert!(matches!(
            cache.load_view(),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn session_token_round_trip() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let sessions = SessionCache::new(store);

        let token = SessionToken {
            user: UserIdentity::new("ana@example.com"),
            token: "abcd".into(),
            issued_at: Utc::now(),
        };
        sessions.save(&token).unwrap();
        assert_eq!(sessions.load().unwrap(), Some(token));
        assert!(sessions.clear().unwrap());
        assert_eq!(sessions.load().unwrap(), None);
    }
}
