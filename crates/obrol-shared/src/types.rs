use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_MESSAGE_LEN, MESSAGES_KEY_PREFIX, MIN_PASSWORD_LEN, PENDING_KEY_PREFIX,
};
use crate::error::{CredentialsError, ValidationError};
use crate::protocol::FeedDocument;

// User identity = the account handle (email)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserIdentity(pub String);

impl UserIdentity {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cache key holding the last merged view for this user.
    pub fn messages_key(&self) -> String {
        format!("{MESSAGES_KEY_PREFIX}{}", self.0)
    }

    /// Cache key holding the pending outbound queue for this user.
    pub fn pending_key(&self) -> String {
        format!("{PENDING_KEY_PREFIX}{}", self.0)
    }
}

impl std::fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One chat entry, either confirmed by the server feed or still provisional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Server document id, or a locally generated `local_*` id.
    pub id: String,
    pub text: String,
    pub author: String,
    /// Server timestamp. Always `None` while `synced` is false.
    pub created_at: Option<DateTime<Utc>>,
    /// True once the server feed has echoed this message back.
    pub synced: bool,
}

impl Message {
    /// Build a provisional (unsynced) message.
    pub fn provisional(id: impl Into<String>, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author: author.into(),
            created_at: None,
            synced: false,
        }
    }

    /// Canonical copy of a server document.
    pub fn from_document(doc: FeedDocument) -> Self {
        Self {
            id: doc.id,
            text: doc.text,
            author: doc.author,
            created_at: Some(doc.created_at),
            synced: true,
        }
    }

    /// Whether this message carries the same content as a server document.
    pub fn matches_document(&self, doc: &FeedDocument) -> bool {
        self.author == doc.author && self.text == doc.text
    }
}

/// Check user-supplied message text before anything touches the network.
pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    if text.len() > MAX_MESSAGE_LEN {
        return Err(ValidationError::TextTooLong {
            len: text.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(())
}

/// Email/password pair typed by the user. Never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Rules applied before a sign-in attempt.
    pub fn validate_login(&self) -> Result<(), CredentialsError> {
        if self.email.trim().is_empty() || self.password.trim().is_empty() {
            return Err(CredentialsError::MissingField);
        }
        Ok(())
    }

    /// Rules applied before creating an account.
    pub fn validate_registration(&self, confirmation: &str) -> Result<(), CredentialsError> {
        if confirmation.trim().is_empty() {
            return Err(CredentialsError::MissingField);
        }
        self.validate_login()?;
        if self.password != confirmation {
            return Err(CredentialsError::ConfirmationMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialsError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Server-issued session token; the only session material kept on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionToken {
    pub user: UserIdentity,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}
