//! In-process stand-ins for the hosted backend.
//!
//! They keep the server-side state in memory and expose switches (go
//! offline, reject the next writes, revoke tokens) so the sync engine and
//! session flows can be exercised end to end without a network.

mod auth;
mod feed;

pub use auth::LoopbackAuth;
pub use feed::LoopbackFeed;
