use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use obrol_shared::{FeedDocument, NewDocument};

use crate::error::FeedError;
use crate::feed::{FeedCallback, FeedChannel, FeedEvent, FeedSubscription};

/// In-memory global room.
///
/// Cloning yields another handle onto the same room, so a test can keep one
/// clone to flip connectivity while the engine owns another.
#[derive(Clone)]
pub struct LoopbackFeed {
    inner: Arc<Mutex<RoomState>>,
}

struct RoomState {
    documents: Vec<FeedDocument>,
    subscribers: HashMap<u64, Arc<FeedCallback>>,
    next_subscriber: u64,
    /// Whether this client can currently reach the room.
    online: bool,
    /// Number of upcoming writes to reject while online.
    failures_armed: usize,
    /// Every write attempted through [`FeedChannel::send`], accepted or not.
    attempts: Vec<NewDocument>,
    last_created_at: Option<DateTime<Utc>>,
}

impl RoomState {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }

    fn accept(&mut self, doc: NewDocument) -> FeedDocument {
        let created_at = self.next_timestamp();
        let stored = FeedDocument {
            id: Uuid::new_v4().simple().to_string(),
            text: doc.text,
            author: doc.author,
            created_at,
        };
        self.documents.push(stored.clone());
        stored
    }

    fn callbacks(&self) -> Vec<Arc<FeedCallback>> {
        self.subscribers.values().cloned().collect()
    }
}

impl Default for LoopbackFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackFeed {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RoomState {
                documents: Vec::new(),
                subscribers: HashMap::new(),
                next_subscriber: 0,
                online: true,
                failures_armed: 0,
                attempts: Vec::new(),
                last_created_at: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, RoomState> {
        // Callbacks never run under the lock, so a poisoned guard only means
        // a panicking test thread; the room data is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `event` to every subscriber, outside the lock.
    fn broadcast(callbacks: Vec<Arc<FeedCallback>>, event: FeedEvent) {
        for callback in callbacks {
            callback(event.clone());
        }
    }

    /// Simulate this client losing or regaining its connection.
    ///
    /// Going offline reports an error to every subscriber; coming back
    /// delivers a fresh snapshot.
    pub fn set_online(&self, online: bool) {
        let (callbacks, event) = {
            let mut state = self.state();
            if state.online == online {
                return;
            }
            state.online = online;
            let event = if online {
                FeedEvent::Snapshot(state.documents.clone())
            } else {
                FeedEvent::Error(FeedError::Unavailable("connection lost".into()))
            };
            (state.callbacks(), event)
        };

        info!(online, subscribers = callbacks.len(), "Loopback connectivity changed");
        Self::broadcast(callbacks, event);
    }

    pub fn is_online(&self) -> bool {
        self.state().online
    }

    /// Reject the next `count` writes even though the room is reachable.
    pub fn fail_next_sends(&self, count: usize) {
        self.state().failures_armed = count;
    }

    /// A write by some other client.  Subscribers see it only while online.
    pub fn insert_remote(&self, author: &str, text: &str) -> FeedDocument {
        let (callbacks, stored, snapshot) = {
            let mut state = self.state();
            let stored = state.accept(NewDocument::new(author, text));
            let callbacks = if state.online {
                state.callbacks()
            } else {
                Vec::new()
            };
            (callbacks, stored, state.documents.clone())
        };

        Self::broadcast(callbacks, FeedEvent::Snapshot(snapshot));
        stored
    }

    /// Server-side contents of the room.
    pub fn documents(&self) -> Vec<FeedDocument> {
        self.state().documents.clone()
    }

    /// Every write attempted so far, in order.
    pub fn attempts(&self) -> Vec<NewDocument> {
        self.state().attempts.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }
}

impl FeedChannel for LoopbackFeed {
    fn subscribe(&self, on_event: FeedCallback) -> FeedSubscription {
        let on_event = Arc::new(on_event);
        let (id, initial) = {
            let mut state = self.state();
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            state.subscribers.insert(id, on_event.clone());
            let initial = if state.online {
                FeedEvent::Snapshot(state.documents.clone())
            } else {
                FeedEvent::Error(FeedError::Unavailable("no connection".into()))
            };
            (id, initial)
        };

        debug!(subscriber = id, "Loopback subscription opened");
        on_event(initial);

        let inner = Arc::downgrade(&self.inner);
        FeedSubscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.lock().unwrap_or_else(PoisonError::into_inner);
                state.subscribers.remove(&id);
                debug!(subscriber = id, "Loopback subscription closed");
            }
        })
    }

    async fn send(&self, doc: NewDocument) -> Result<String, FeedError> {
        let (callbacks, id, snapshot) = {
            let mut state = self.state();
            state.attempts.push(doc.clone());

            if !state.online {
                return Err(FeedError::Unavailable("no connection".into()));
            }
            if state.failures_armed > 0 {
                state.failures_armed -= 1;
                return Err(FeedError::Rejected("simulated write failure".into()));
            }

            let stored = state.accept(doc);
            (state.callbacks(), stored.id, state.documents.clone())
        };

        Self::broadcast(callbacks, FeedEvent::Snapshot(snapshot));
        Ok(id)
    }
}
