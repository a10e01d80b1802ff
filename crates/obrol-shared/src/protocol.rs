use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message document as stored in the backend's global room collection.
///
/// The backend schema is `{ text, author, createdAt }`; the document id is
/// carried alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedDocument {
    pub id: String,
    pub text: String,
    pub author: String,
    /// Server-assigned timestamp
    pub created_at: DateTime<Utc>,
}

/// Payload of a document write. The server fills in id and `createdAt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub text: String,
    pub author: String,
}

impl NewDocument {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
        }
    }
}
