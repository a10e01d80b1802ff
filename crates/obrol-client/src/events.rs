use serde::Serialize;
use tokio::sync::{mpsc, watch};

use obrol_shared::Message;

/// Notifications sent *from* the sync engine to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// The merged view changed (or was re-emitted).
    View(ViewPayload),
    /// The feed connection went down or came back.
    Connectivity { online: bool },
    /// An outbound flush finished.
    Flushed { sent: usize, remaining: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPayload {
    pub messages: Vec<Message>,
    pub online: bool,
}

/// Deliver `event`, waiting for room in the channel.
///
/// Gives up once the session is cancelled, so a presentation layer that
/// stopped reading cannot keep the engine from shutting down.
pub async fn emit_event(
    tx: &mpsc::Sender<EngineEvent>,
    cancelled: &watch::Receiver<bool>,
    event: EngineEvent,
) {
    let mut cancelled = cancelled.clone();
    let cancellation = async move {
        let fired = cancelled.wait_for(|flag| *flag).await.is_ok();
        if !fired {
            // Cancel flag dropped without firing; only the channel decides.
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        biased;
        sent = tx.send(event) => {
            if sent.is_err() {
                tracing::debug!("No presentation layer listening, event dropped");
            }
        }
        _ = cancellation => {
            tracing::debug!("Session cancelled while the event channel was full, event dropped");
        }
    }
}
