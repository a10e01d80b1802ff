//! v001 -- Initial schema creation.
//!
//! A single key-value table: every cached artefact (merged view, pending
//! queue, session token) is an opaque blob under a namespaced key.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key        TEXT PRIMARY KEY NOT NULL,   -- e.g. messages:<user>, pending:<user>, session
    value      BLOB NOT NULL,               -- JSON document
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
