//! Engine task with tokio mpsc command/event pattern.
//!
//! Each session's [`SyncEngine`] lives inside one dedicated tokio task.
//! Feed callbacks and presentation calls both reach it as [`EngineCommand`]s
//! on a single queue, so engine operations run one at a time in arrival
//! order.  Views and connectivity changes come back as [`EngineEvent`]s.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use obrol_net::{FeedChannel, FeedEvent, FeedSubscription};
use obrol_shared::{Message, SyncError, UserIdentity};
use obrol_store::CacheStore;

use crate::engine::{FlushReport, SyncEngine};
use crate::events::EngineEvent;
use crate::state::SyncSnapshot;

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

/// Commands sent *into* the engine task.
#[derive(Debug)]
pub enum EngineCommand {
    /// Something arrived on the feed subscription.
    Feed(FeedEvent),
    /// Compose a message and transmit or queue it.
    Compose {
        author: String,
        text: String,
        reply: oneshot::Sender<Result<Message, SyncError>>,
    },
    /// Retry the outbound queue now.  Replies `None` while offline.
    Flush(oneshot::Sender<Option<FlushReport>>),
    /// Copy of the current state.
    Snapshot(oneshot::Sender<SyncSnapshot>),
    /// Stop the task and drop the subscription.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle onto a running engine task.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    user: UserIdentity,
    commands: mpsc::UnboundedSender<EngineCommand>,
    cancel: Arc<watch::Sender<bool>>,
}

impl EngineHandle {
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Send `text` as the session's user.
    pub async fn compose(&self, text: impl Into<String>) -> Result<Message, SyncError> {
        self.compose_as(self.user.as_str(), text).await
    }

    pub async fn compose_as(
        &self,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Message, SyncError> {
        if self.is_cancelled() {
            return Err(SyncError::EngineClosed);
        }
        let (reply, rx) = oneshot::channel();
        self.dispatch(EngineCommand::Compose {
            author: author.into(),
            text: text.into(),
            reply,
        })?;
        rx.await.map_err(|_| SyncError::EngineClosed)?
    }

    pub async fn snapshot(&self) -> Result<SyncSnapshot, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(EngineCommand::Snapshot(reply))?;
        rx.await.map_err(|_| SyncError::EngineClosed)
    }

    pub async fn request_flush(&self) -> Result<Option<FlushReport>, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(EngineCommand::Flush(reply))?;
        rx.await.map_err(|_| SyncError::EngineClosed)
    }

    /// Cancel the session.  An in-flight flush finishes its current message
    /// and starts no other; the task then unsubscribes and exits.
    pub fn shutdown(&self) {
        self.cancel.send_replace(true);
        // The task may already be gone, which is the goal anyway.
        let _ = self.commands.send(EngineCommand::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn dispatch(&self, command: EngineCommand) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::EngineClosed)
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Everything a presentation layer needs from a freshly started engine.
#[derive(Debug)]
pub struct SpawnedEngine {
    pub handle: EngineHandle,
    pub events: mpsc::Receiver<EngineEvent>,
    /// The cached view, available before the feed has said anything.
    pub initial_view: Vec<Message>,
    pub task: JoinHandle<()>,
}

/// Initialize an engine for `user` from `store`, subscribe it to `feed` and
/// run it on its own task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_engine<F: FeedChannel>(
    user: UserIdentity,
    store: Arc<dyn CacheStore>,
    feed: Arc<F>,
    event_buffer: usize,
) -> SpawnedEngine {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<EngineCommand>();
    let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(event_buffer.max(1));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let engine = SyncEngine::initialize(user.clone(), store, feed.clone(), event_tx, cancel_rx);
    let initial_view = engine.view().to_vec();

    // The callback must not keep the task alive once every handle is gone.
    let feed_tx = cmd_tx.downgrade();
    let subscription = feed.subscribe(Box::new(move |event| {
        if let Some(tx) = feed_tx.upgrade() {
            let _ = tx.send(EngineCommand::Feed(event));
        }
    }));

    info!(user = %user, cached = initial_view.len(), "Spawning sync engine");
    let task = tokio::spawn(run_engine(engine, cmd_rx, subscription));

    SpawnedEngine {
        handle: EngineHandle {
            user,
            commands: cmd_tx,
            cancel: Arc::new(cancel_tx),
        },
        events: event_rx,
        initial_view,
        task,
    }
}

async fn run_engine<F: FeedChannel>(
    mut engine: SyncEngine<F>,
    mut commands: mpsc::UnboundedReceiver<EngineCommand>,
    subscription: FeedSubscription,
) {
    loop {
        match commands.recv().await {
            Some(EngineCommand::Feed(FeedEvent::Snapshot(documents))) => {
                engine.on_feed_push(documents).await;
            }
            Some(EngineCommand::Feed(FeedEvent::Error(error))) => {
                engine.on_feed_error(error).await;
            }
            Some(EngineCommand::Compose { author, text, reply }) => {
                let result = engine.compose_and_send(&author, &text).await;
                let _ = reply.send(result);
            }
            Some(EngineCommand::Flush(reply)) => {
                let report = engine.request_flush().await;
                let _ = reply.send(report);
            }
            Some(EngineCommand::Snapshot(reply)) => {
                let _ = reply.send(engine.snapshot());
            }
            Some(EngineCommand::Shutdown) => {
                info!(user = %engine.user(), "Sync engine shutdown requested");
                break;
            }
            None => {
                // All handles dropped
                debug!(user = %engine.user(), "Command channel closed, stopping sync engine");
                break;
            }
        }
    }

    subscription.unsubscribe();
    info!(user = %engine.user(), pending = engine.pending().len(), "Sync engine stopped");
}

#[cfg(test)]
mod tests {
    use obrol_net::LoopbackFeed;
    use obrol_store::{MemoryStore, UserCache};

    use super::*;

    const ANA: &str = "ana@example.com";

    fn start(feed: &LoopbackFeed, store: Arc<dyn CacheStore>) -> SpawnedEngine {
        spawn_engine(UserIdentity::new(ANA), store, Arc::new(feed.clone()), 64)
    }

    #[tokio::test]
    async fn test_initial_view_comes_from_cache() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let cached = vec![Message::provisional("local_1_0", ANA, "from last time")];
        UserCache::new(store.clone(), UserIdentity::new(ANA))
            .save_view(&cached)
            .unwrap();

        let feed = LoopbackFeed::new();
        feed.set_online(false);
        let spawned = start(&feed, store);

        assert_eq!(spawned.initial_view, cached);
        spawned.handle.shutdown();
    }

    #[tokio::test]
    async fn test_subscription_snapshot_reaches_view() {
        let feed = LoopbackFeed::new();
        feed.insert_remote("budi@example.com", "selamat datang");
        let spawned = start(&feed, Arc::new(MemoryStore::new()));

        let snapshot = spawned.handle.snapshot().await.unwrap();
        assert!(snapshot.online);
        assert_eq!(snapshot.view.len(), 1);
        assert!(snapshot.view[0].synced);
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_compose_online_is_echoed_and_synced() {
        let feed = LoopbackFeed::new();
        let spawned = start(&feed, Arc::new(MemoryStore::new()));

        let sent = spawned.handle.compose("halo").await.unwrap();
        assert_eq!(sent.author, ANA);
        assert!(!sent.synced);

        let snapshot = spawned.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.view.len(), 1);
        assert!(snapshot.view[0].synced);
        assert!(snapshot.pending.is_empty());
    }

    #[tokio::test]
    async fn test_validation_error_reaches_caller() {
        let feed = LoopbackFeed::new();
        let spawned = start(&feed, Arc::new(MemoryStore::new()));

        let err = spawned.handle.compose("  \n ").await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(feed.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_offline_queue_flushes_on_reconnect() {
        let feed = LoopbackFeed::new();
        let mut spawned = start(&feed, Arc::new(MemoryStore::new()));

        feed.set_online(false);
        spawned.handle.compose("hello").await.unwrap();

        let offline = spawned.handle.snapshot().await.unwrap();
        assert!(!offline.online);
        assert_eq!(offline.pending.len(), 1);
        assert!(feed.documents().is_empty());

        feed.set_online(true);
        let flushed = spawned.handle.snapshot().await.unwrap();
        assert!(flushed.online);
        assert!(flushed.pending.is_empty());
        assert_eq!(feed.documents().len(), 1);

        // The flush's own write comes back as the next snapshot.
        let echoed = spawned.handle.snapshot().await.unwrap();
        assert_eq!(echoed.view.len(), 1);
        assert!(echoed.view[0].synced);
        assert_eq!(echoed.view[0].text, "hello");

        let mut events = Vec::new();
        while let Ok(event) = spawned.events.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&EngineEvent::Connectivity { online: false }));
        assert!(events.contains(&EngineEvent::Connectivity { online: true }));
        assert!(events.contains(&EngineEvent::Flushed { sent: 1, remaining: 0 }));
    }

    #[tokio::test]
    async fn test_request_flush_retries_demoted_message() {
        let feed = LoopbackFeed::new();
        feed.fail_next_sends(1);
        let spawned = start(&feed, Arc::new(MemoryStore::new()));

        spawned.handle.compose("second try").await.unwrap();
        assert_eq!(spawned.handle.snapshot().await.unwrap().pending.len(), 1);

        let report = spawned.handle.request_flush().await.unwrap();
        assert_eq!(report, Some(FlushReport { sent: 1, remaining: 0 }));
        assert_eq!(feed.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_unsubscribes_and_closes() {
        let feed = LoopbackFeed::new();
        let spawned = start(&feed, Arc::new(MemoryStore::new()));
        assert_eq!(feed.subscriber_count(), 1);

        spawned.handle.shutdown();
        spawned.task.await.unwrap();

        assert_eq!(feed.subscriber_count(), 0);
        assert!(spawned.handle.is_closed());
        assert!(matches!(
            spawned.handle.compose("too late").await,
            Err(SyncError::EngineClosed)
        ));
        assert!(matches!(
            spawned.handle.snapshot().await,
            Err(SyncError::EngineClosed)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_with_full_event_channel() {
        let feed = LoopbackFeed::new();
        let spawned = spawn_engine(
            UserIdentity::new(ANA),
            Arc::new(MemoryStore::new()),
            Arc::new(feed.clone()),
            4,
        );

        for n in 0..10 {
            feed.insert_remote("budi@example.com", &format!("pesan {n}"));
        }

        // The receiver stays alive but is never read.
        let _events = spawned.events;
        spawned.handle.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(2), spawned.task)
            .await
            .expect("engine stops while the UI is not reading")
            .unwrap();
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_every_handle_stops_task() {
        let feed = LoopbackFeed::new();
        let spawned = start(&feed, Arc::new(MemoryStore::new()));

        drop(spawned.handle);
        spawned.task.await.unwrap();
        assert_eq!(feed.subscriber_count(), 0);
    }
}
