//! Schema migrations for the cache database.
//!
//! Every open runs the steps in [`MIGRATIONS`] that the file has not seen
//! yet.  Progress is tracked in SQLite's `user_version` header field, so a
//! database written by an older build picks up exactly the steps it is
//! missing and a current one is left alone.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Ordered `(version, name, step)` list.  A new schema change appends an
/// entry with the next version number; existing entries never change.
const MIGRATIONS: &[(u32, &str, Step)] = &[(1, "v001_initial", v001_initial::up)];

/// Version a fully migrated database reports.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|(version, _, _)| *version).unwrap_or(0)
}

/// Read the schema version stored in the database header.
pub fn current_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the schema up to [`latest_version`].
///
/// `PRAGMA user_version` is 0 on a fresh file.  Each outstanding step runs in
/// its own transaction together with the version bump, so a failed step
/// leaves the database at the last version that fully applied.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = current_version(conn)?;
    let target = latest_version();

    tracing::debug!(
        current_version = current,
        target_version = target,
        "checking database migrations"
    );

    for &(version, name, step) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        tracing::info!(version, name, "applying migration");

        let tx = conn.unchecked_transaction()?;
        step(&tx).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(())
}
