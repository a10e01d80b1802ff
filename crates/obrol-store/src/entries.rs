//! CRUD operations for raw cache entries.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Fetch the blob stored under `key`, if any.
    pub fn get_entry(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or replace the blob stored under `key`.
    pub fn set_entry(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn().execute(
            "INSERT INTO cache_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete the entry under `key`.  Returns `true` if a row was deleted.
    pub fn remove_entry(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }
}
