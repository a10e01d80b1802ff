//! The realtime message feed contract.
//!
//! A subscription pushes the *complete* ordered message set every time the
//! server-side collection changes, and reports connectivity loss through the
//! same callback.  Reconnection and backoff are the feed implementation's
//! business; consumers only see the next snapshot once it is back.

use std::future::Future;

use obrol_shared::{FeedDocument, NewDocument};

use crate::error::FeedError;

/// What a subscription delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Every accepted document, ascending by server timestamp.
    Snapshot(Vec<FeedDocument>),
    /// The subscription lost its connection.
    Error(FeedError),
}

/// Callback invoked for each [`FeedEvent`].  May be called from any thread.
pub type FeedCallback = Box<dyn Fn(FeedEvent) + Send + Sync + 'static>;

/// Remote feed of the global room.
pub trait FeedChannel: Send + Sync + 'static {
    /// Start receiving events.  Deliveries stop once the returned handle is
    /// unsubscribed or dropped.
    fn subscribe(&self, on_event: FeedCallback) -> FeedSubscription;

    /// Write one document.  Resolves to the server-assigned document id.
    fn send(&self, doc: NewDocument) -> impl Future<Output = Result<String, FeedError>> + Send;
}

/// Handle to an open subscription.
pub struct FeedSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl FeedSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop deliveries now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_cancel_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = FeedSubscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _sub = FeedSubscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
