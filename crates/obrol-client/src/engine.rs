//! The sync engine: one session's reconciliation, connectivity tracking and
//! outbound queue management.
//!
//! [`SyncEngine`] is a plain state machine whose operations take `&mut self`;
//! serialization is provided by its owner, the actor task in
//! [`crate::actor`].  Every operation that changes the view emits it first and
//! persists it afterwards; cache failures are logged and otherwise ignored.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use obrol_net::{FeedChannel, FeedError};
use obrol_shared::constants::ANONYMOUS_AUTHOR;
use obrol_shared::types::validate_text;
use obrol_shared::{FeedDocument, Message, NewDocument, SyncError, UserIdentity};
use obrol_store::{CacheStore, UserCache};

use crate::events::{emit_event, EngineEvent, ViewPayload};
use crate::outbound::{LocalIds, OutboundQueue};
use crate::reconcile::{fallback_view, reconcile};
use crate::state::{SyncSnapshot, SyncState};

/// Outcome of one pass over the outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub remaining: usize,
}

pub struct SyncEngine<F: FeedChannel> {
    cache: UserCache,
    feed: Arc<F>,
    events: mpsc::Sender<EngineEvent>,
    /// Flips to `true` when the session ends.
    cancelled: watch::Receiver<bool>,
    state: SyncState,
    local_ids: LocalIds,
}

impl<F: FeedChannel> SyncEngine<F> {
    /// Build the engine for `user` from whatever the cache holds.
    ///
    /// A missing or unreadable cache yields an empty view.  Queued messages
    /// that the cached view lacks are appended to it so both stay in step.
    pub fn initialize(
        user: UserIdentity,
        store: Arc<dyn CacheStore>,
        feed: Arc<F>,
        events: mpsc::Sender<EngineEvent>,
        cancelled: watch::Receiver<bool>,
    ) -> Self {
        let cache = UserCache::new(store, user);

        let mut view = load_or_warn(&cache, "view", UserCache::load_view);
        let pending = load_or_warn(&cache, "pending queue", UserCache::load_pending);

        for queued in &pending {
            if !view.iter().any(|m| m.id == queued.id) {
                view.push(queued.clone());
            }
        }

        info!(
            user = %cache.user(),
            cached = view.len(),
            pending = pending.len(),
            "Sync engine initialized from cache"
        );

        Self {
            cache,
            feed,
            events,
            cancelled,
            state: SyncState::new(view, OutboundQueue::from_persisted(pending)),
            local_ids: LocalIds::default(),
        }
    }

    pub fn user(&self) -> &UserIdentity {
        self.cache.user()
    }

    pub fn view(&self) -> &[Message] {
        &self.state.merged_view
    }

    pub fn is_online(&self) -> bool {
        self.state.is_online()
    }

    pub fn pending(&self) -> Vec<Message> {
        self.state.outbound.to_vec()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.snapshot()
    }

    // ------------------------------------------------------------------
    // Feed events
    // ------------------------------------------------------------------

    /// Apply a full server snapshot.
    ///
    /// On an Offline -> Online transition the outbound queue is flushed
    /// right after the new view has been emitted.
    pub async fn on_feed_push(&mut self, snapshot: Vec<FeedDocument>) {
        let previous = std::mem::take(&mut self.state.merged_view);
        let outcome = reconcile(&previous, snapshot);
        self.state.merged_view = outcome.view;

        debug!(
            user = %self.user(),
            messages = self.state.merged_view.len(),
            resolved = outcome.resolved.len(),
            "Applied feed snapshot"
        );

        let reconnected = self.state.go_online();
        if reconnected {
            info!(user = %self.user(), "Feed reachable again");
            emit_event(
                &self.events,
                &self.cancelled,
                EngineEvent::Connectivity { online: true },
            )
            .await;
        }

        self.publish_view().await;

        if reconnected {
            self.flush_outbound().await;
        }
    }

    /// The subscription lost its connection.  Never propagated: the feed
    /// reconnects on its own and the next snapshot brings us back online.
    pub async fn on_feed_error(&mut self, error: FeedError) {
        warn!(user = %self.user(), error = %error, "Feed error, switching to offline mode");

        if self.state.go_offline() {
            emit_event(
                &self.events,
                &self.cancelled,
                EngineEvent::Connectivity { online: false },
            )
            .await;
        }

        match self.cache.load_view() {
            Ok(Some(cached)) => {
                self.state.merged_view = fallback_view(cached, &self.state.merged_view);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(user = %self.user(), error = %e, "Cached view unavailable, keeping in-memory view");
            }
        }

        self.emit_view().await;
    }

    // ------------------------------------------------------------------
    // Local sends
    // ------------------------------------------------------------------

    /// Validate, then transmit or queue a new message.
    ///
    /// Either way the provisional message is appended to the view right
    /// away.  Only validation failures are returned; a transmission failure
    /// demotes the message to the outbound queue.
    pub async fn compose_and_send(&mut self, author: &str, text: &str) -> Result<Message, SyncError> {
        validate_text(text)?;

        let author = if author.trim().is_empty() {
            ANONYMOUS_AUTHOR
        } else {
            author
        };
        let message = Message::provisional(self.local_ids.next_id(), author, text);

        if self.state.is_online() {
            match self.feed.send(NewDocument::new(author, text)).await {
                Ok(doc_id) => {
                    debug!(local_id = %message.id, doc_id = %doc_id, "Message transmitted");
                }
                Err(e) => {
                    warn!(local_id = %message.id, error = %e, "Transmission failed, queueing message");
                    self.enqueue(message.clone());
                }
            }
        } else {
            debug!(local_id = %message.id, "Offline, queueing message");
            self.enqueue(message.clone());
        }

        self.state.merged_view.push(message.clone());
        self.publish_view().await;

        Ok(message)
    }

    // ------------------------------------------------------------------
    // Outbound queue
    // ------------------------------------------------------------------

    /// Transmit queued messages in order, one at a time.
    ///
    /// A message leaves the queue only once its transmission succeeded.  The
    /// pass stops at the first failure, and no new transmission starts after
    /// the session was cancelled.
    pub async fn flush_outbound(&mut self) -> FlushReport {
        let mut sent = 0;
        let attempted = !self.state.outbound.is_empty();

        while let Some(next) = self.state.outbound.front().cloned() {
            if self.is_cancelled() {
                debug!(user = %self.user(), "Session cancelled, flush stopped");
                break;
            }

            match self.feed.send(NewDocument::new(&next.author, &next.text)).await {
                Ok(doc_id) => {
                    self.state.outbound.pop_front();
                    self.persist_pending();
                    sent += 1;
                    debug!(local_id = %next.id, doc_id = %doc_id, "Queued message transmitted");
                }
                Err(e) => {
                    warn!(local_id = %next.id, error = %e, "Flush interrupted, keeping remaining messages");
                    break;
                }
            }
        }

        let report = FlushReport {
            sent,
            remaining: self.state.outbound.len(),
        };

        if attempted {
            info!(
                user = %self.user(),
                sent = report.sent,
                remaining = report.remaining,
                "Outbound flush finished"
            );
            emit_event(
                &self.events,
                &self.cancelled,
                EngineEvent::Flushed {
                    sent: report.sent,
                    remaining: report.remaining,
                },
            )
            .await;
        }

        report
    }

    /// Explicit retry from the presentation layer.  Ignored while offline;
    /// the reconnect flush covers that case.
    pub async fn request_flush(&mut self) -> Option<FlushReport> {
        if !self.state.is_online() {
            debug!(user = %self.user(), "Flush requested while offline, ignoring");
            return None;
        }
        Some(self.flush_outbound().await)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    fn enqueue(&mut self, message: Message) {
        self.state.outbound.push(message);
        self.persist_pending();
    }

    /// Emit the view, then write it to the cache.
    async fn publish_view(&mut self) {
        self.emit_view().await;
        if let Err(e) = self.cache.save_view(&self.state.merged_view) {
            warn!(user = %self.user(), error = %e, "Failed to persist merged view");
        }
    }

    async fn emit_view(&self) {
        let payload = ViewPayload {
            messages: self.state.merged_view.clone(),
            online: self.state.is_online(),
        };
        emit_event(&self.events, &self.cancelled, EngineEvent::View(payload)).await;
    }

    fn persist_pending(&self) {
        if let Err(e) = self.cache.save_pending(&self.state.outbound.to_vec()) {
            warn!(user = %self.user(), error = %e, "Failed to persist outbound queue");
        }
    }
}

/// Read one cached artefact, treating any failure as a miss.
fn load_or_warn(
    cache: &UserCache,
    what: &str,
    load: impl Fn(&UserCache) -> obrol_store::Result<Option<Vec<Message>>>,
) -> Vec<Message> {
    match load(cache) {
        Ok(Some(messages)) => messages,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(user = %cache.user(), error = %e, "Could not load cached {what}, starting empty");
            Vec::new()
        }
    }
}
