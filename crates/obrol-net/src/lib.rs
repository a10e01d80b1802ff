//! Backend collaborators: the realtime message feed and the auth service,
//! plus an in-process loopback implementation of both.

pub mod auth;
pub mod error;
pub mod feed;
pub mod loopback;

pub use auth::AuthBackend;
pub use error::{AuthError, FeedError};
pub use feed::{FeedCallback, FeedChannel, FeedEvent, FeedSubscription};
pub use loopback::{LoopbackAuth, LoopbackFeed};
