//! Per-session synchronization state.
//!
//! [`SyncState`] is owned by exactly one sync engine task; everything handed
//! out of it ([`SyncSnapshot`]) is a copy.

use serde::Serialize;

use obrol_shared::Message;

use crate::outbound::OutboundQueue;

/// Last known reachability of the remote feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Connectivity {
    Online,
    Offline,
}

/// Central state of one session.
#[derive(Debug, Clone)]
pub struct SyncState {
    /// Starts `Online` (optimistic) until the feed says otherwise.
    pub connectivity: Connectivity,

    /// Synced messages ascending by server timestamp, then unsynced
    /// messages in send order.
    pub merged_view: Vec<Message>,

    /// Messages waiting for transmission.  Persisted on every change.
    pub outbound: OutboundQueue,
}

impl SyncState {
    pub fn new(merged_view: Vec<Message>, outbound: OutboundQueue) -> Self {
        Self {
            connectivity: Connectivity::Online,
            merged_view,
            outbound,
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity == Connectivity::Online
    }

    /// Returns `true` on an Offline -> Online transition.
    pub fn go_online(&mut self) -> bool {
        let changed = self.connectivity == Connectivity::Offline;
        self.connectivity = Connectivity::Online;
        changed
    }

    /// Returns `true` on an Online -> Offline transition.
    pub fn go_offline(&mut self) -> bool {
        let changed = self.connectivity == Connectivity::Online;
        self.connectivity = Connectivity::Offline;
        changed
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            view: self.merged_view.clone(),
            online: self.is_online(),
            pending: self.outbound.to_vec(),
        }
    }
}

/// Read-only copy of [`SyncState`] for the presentation layer and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub view: Vec<Message>,
    pub online: bool,
    pub pending: Vec<Message>,
}
