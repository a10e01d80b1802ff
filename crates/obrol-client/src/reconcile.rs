//! Merging a server snapshot with the locally known view.
//!
//! The snapshot is authoritative for everything the server has accepted, so
//! the synced part of the view is simply replaced.  The only real work is
//! deciding which provisional (unsynced) local messages the snapshot now
//! accounts for.

use std::collections::HashSet;

use obrol_shared::{FeedDocument, Message};

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Server entries followed by still-unresolved provisional entries.
    pub view: Vec<Message>,
    /// Ids of provisional entries superseded by a server copy.
    pub resolved: Vec<String>,
}

/// Build the new merged view from the previous one and a full snapshot.
///
/// A provisional entry is resolved by the first snapshot entry with the same
/// author and text that is not already accounted for: neither present as a
/// synced entry in `previous` nor claimed by an earlier provisional entry in
/// this pass.  Unresolved entries keep their send order after the server
/// entries.
pub fn reconcile(previous: &[Message], snapshot: Vec<FeedDocument>) -> Reconciled {
    let known: HashSet<&str> = previous
        .iter()
        .filter(|m| m.synced)
        .map(|m| m.id.as_str())
        .collect();

    let documents = canonical_order(snapshot);

    // Snapshot entries a provisional message may still claim.
    let mut claimable: Vec<bool> = documents
        .iter()
        .map(|doc| !known.contains(doc.id.as_str()))
        .collect();

    let mut resolved = Vec::new();
    let mut retained = Vec::new();

    for local in previous.iter().filter(|m| !m.synced) {
        let hit = documents
            .iter()
            .enumerate()
            .find(|(idx, doc)| claimable[*idx] && local.matches_document(doc))
            .map(|(idx, _)| idx);

        match hit {
            Some(idx) => {
                claimable[idx] = false;
                resolved.push(local.id.clone());
            }
            None => retained.push(local.clone()),
        }
    }

    let mut view: Vec<Message> = documents.into_iter().map(Message::from_document).collect();
    view.extend(retained);

    Reconciled { view, resolved }
}

/// Drop repeated document ids (first copy wins) and stably order by server
/// timestamp.
fn canonical_order(snapshot: Vec<FeedDocument>) -> Vec<FeedDocument> {
    let mut seen = HashSet::new();
    let mut documents: Vec<FeedDocument> = snapshot
        .into_iter()
        .filter(|doc| seen.insert(doc.id.clone()))
        .collect();
    documents.sort_by_key(|doc| doc.created_at);
    documents
}

/// View to show after the feed dropped: the cached view, plus any in-memory
/// unsynced entries the cache has not caught up with.
pub fn fallback_view(cached: Vec<Message>, current: &[Message]) -> Vec<Message> {
    let mut view = cached;
    let missing: Vec<Message> = current
        .iter()
        .filter(|m| !m.synced && !view.iter().any(|c| c.id == m.id))
        .cloned()
        .collect();
    view.extend(missing);
    view
}
