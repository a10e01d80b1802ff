//! # obrol-store
//!
//! Durable cache for the Obrol chat client.
//!
//! The sync engine only needs a small key-value contract ([`CacheStore`]):
//! the last merged message view and the pending outbound queue are stored as
//! JSON blobs under per-user keys, next to the persisted session token.  The
//! crate ships a SQLite-backed implementation ([`SqliteStore`]) and an
//! in-memory one ([`MemoryStore`]), plus the typed per-user view over either
//! ([`UserCache`]).

pub mod cache;
pub mod database;
pub mod entries;
pub mod migrations;
pub mod store;

mod error;

pub use cache::{SessionCache, UserCache};
pub use database::Database;
pub use error::{Result, StoreError};
pub use store::{CacheStore, MemoryStore, SqliteStore};
