//! Types shared by every Obrol crate: the message model, the backend
//! document schema, constants and error enums.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{CredentialsError, SyncError, ValidationError};
pub use protocol::{FeedDocument, NewDocument};
pub use types::{Credentials, Message, SessionToken, UserIdentity};
