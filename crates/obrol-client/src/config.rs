//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so the client starts with zero
//! configuration.

use std::path::PathBuf;
use std::sync::Arc;

use obrol_shared::constants::DEFAULT_EVENT_BUFFER;
use obrol_store::{CacheStore, MemoryStore, SqliteStore, StoreError};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// SQLite cache location.
    /// Env: `OBROL_DB_PATH`
    /// Default: `None`, meaning `obrol.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Keep the cache in memory only (nothing survives a restart).
    /// Env: `OBROL_IN_MEMORY_CACHE` (true/1)
    /// Default: `false`
    pub in_memory_cache: bool,

    /// Capacity of each session's event channel.
    /// Env: `OBROL_EVENT_BUFFER`
    /// Default: `256`
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            in_memory_cache: false,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("OBROL_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("OBROL_IN_MEMORY_CACHE") {
            config.in_memory_cache = val == "true" || val == "1";
        }

        if let Some(val) = lookup("OBROL_EVENT_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.event_buffer = n,
                _ => {
                    tracing::warn!(value = %val, "Invalid OBROL_EVENT_BUFFER, using default");
                }
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    /// Open the cache this configuration describes.
    pub fn open_store(&self) -> Result<Arc<dyn CacheStore>, StoreError> {
        if self.in_memory_cache {
            tracing::info!("Using in-memory cache");
            return Ok(Arc::new(MemoryStore::new()));
        }

        let store = match &self.db_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                SqliteStore::open_at(path)?
            }
            None => SqliteStore::open_default()?,
        };
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::from_vars(vars(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.event_buffer, 256);
        assert!(!config.in_memory_cache);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_vars(vars(&[
            ("OBROL_DB_PATH", "/tmp/chat.db"),
            ("OBROL_IN_MEMORY_CACHE", "1"),
            ("OBROL_EVENT_BUFFER", "32"),
        ]));

        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/chat.db")));
        assert!(config.in_memory_cache);
        assert_eq!(config.event_buffer, 32);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = ClientConfig::from_vars(vars(&[
            ("OBROL_EVENT_BUFFER", "lots"),
            ("OBROL_IN_MEMORY_CACHE", "yes please"),
        ]));
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        assert!(!config.in_memory_cache);

        let zero = ClientConfig::from_vars(vars(&[("OBROL_EVENT_BUFFER", "0")]));
        assert_eq!(zero.event_buffer, DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn test_open_store_at_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            db_path: Some(dir.path().join("nested").join("cache.db")),
            ..ClientConfig::default()
        };

        let store = config.open_store().unwrap();
        store.set("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
        assert!(dir.path().join("nested").join("cache.db").exists());
    }

    #[test]
    fn test_open_in_memory_store() {
        let config = ClientConfig {
            in_memory_cache: true,
            ..ClientConfig::default()
        };
        let store = config.open_store().unwrap();
        assert!(store.get("missing").unwrap().is_none());
    }
}
