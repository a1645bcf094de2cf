//! # Fundlayer Store
//!
//! Durable, file-backed key/value cache with per-entry expiry.
//!
//! ## Overview
//!
//! Entries live in a single `DuckDB` table and survive process restarts. An
//! entry is *fresh* while `now < expires_at` and *stale* afterwards; stale
//! entries stay readable until [`CacheStore::clear_expired`] or
//! [`CacheStore::clear_all`] removes them, so callers can fall back on them
//! when every upstream source is down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use fundlayer_store::{CacheConfig, CacheStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CacheStore::open(CacheConfig::default())?;
//!     store.set("fund_realtime:code=008888", r#"{"price":1.23}"#, Duration::from_secs(60))?;
//!
//!     if let Some(hit) = store.get("fund_realtime:code=008888")? {
//!         println!("fresh={} value={}", hit.fresh, hit.value);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Table
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | `key` | `TEXT PRIMARY KEY` | data type + canonical parameters |
//! | `value` | `TEXT` | serialized payload, opaque to the store |
//! | `created_at` | `BIGINT` | unix milliseconds |
//! | `expires_at` | `BIGINT` | unix milliseconds, always after `created_at` |
//!
//! Deleting the database file is equivalent to [`CacheStore::clear_all`]; the
//! schema is recreated on the next open.

pub mod clock;
pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ::duckdb::params;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

pub use clock::{max_unix_millis, unix_millis, Clock, ManualClock, SystemClock};
pub use duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during cache store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Cache keys must be non-empty.
    #[error("cache key cannot be empty")]
    EmptyKey,

    /// Entries must expire strictly after they are created.
    #[error("ttl must be at least one millisecond, got {ttl_ms}ms")]
    InvalidTtl { ttl_ms: u128 },

    /// A stored timestamp could not be converted back to a date.
    #[error("stored timestamp {millis} for key '{key}' is out of range")]
    CorruptTimestamp { key: String, millis: i64 },
}

/// Configuration for the cache database.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory for fundlayer state.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let home = resolve_fundlayer_home();
        let db_path = env::var_os("FUNDLAYER_CACHE_PATH")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| home.join("data_cache.duckdb"));
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl CacheConfig {
    /// Configuration rooted at an explicit database file.
    pub fn at_path(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let home = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Result of a cache lookup. Both fresh and stale entries are returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLookup {
    pub value: String,
    pub fresh: bool,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Entry counts split by freshness at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
    pub stale: usize,
}

/// Thread-safe handle to the persistent cache.
///
/// Reads run concurrently on pooled connections. Writes are serialized
/// through a store-wide lock; each write is a single auto-committed
/// statement, so readers never observe a partial entry.
#[derive(Clone)]
pub struct CacheStore {
    config: CacheConfig,
    manager: DuckDbConnectionManager,
    clock: Arc<dyn Clock>,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("db_path", &self.config.db_path)
            .field("clock", &self.clock)
            .finish()
    }
}

impl CacheStore {
    /// Open a store with default configuration.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(CacheConfig::default())
    }

    /// Open a store with the specified configuration and the system clock.
    pub fn open(config: CacheConfig) -> Result<Self, StoreError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open a store that reads time from `clock`.
    pub fn open_with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let store = Self {
            config,
            manager,
            clock,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.initialize()?;
        tracing::debug!(path = %store.db_path().display(), "opened cache store");
        Ok(store)
    }

    /// Create the schema if it does not exist yet.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// The clock used to stamp and age entries.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Look up `key`. Returns `None` when absent, otherwise the value and
    /// whether it is still fresh.
    pub fn get(&self, key: &str) -> Result<Option<CacheLookup>, StoreError> {
        let now = unix_millis(self.clock.now());
        let connection = self.manager.acquire()?;
        let mut statement = connection
            .prepare("SELECT value, created_at, expires_at FROM cache_entries WHERE key = ?")?;
        let mut rows = statement.query(params![key])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let value: String = row.get(0)?;
        let created_at: i64 = row.get(1)?;
        let expires_at: i64 = row.get(2)?;

        Ok(Some(CacheLookup {
            value,
            fresh: now < expires_at,
            created_at: to_datetime(key, created_at)?,
            expires_at: to_datetime(key, expires_at)?,
        }))
    }

    /// Insert or overwrite `key` so that it expires `ttl` from now.
    pub fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        let ttl_ms = ttl.as_millis();
        if ttl_ms == 0 {
            return Err(StoreError::InvalidTtl { ttl_ms });
        }

        let created_at = unix_millis(self.clock.now());
        let expires_at = created_at
            .saturating_add(i64::try_from(ttl_ms).unwrap_or(i64::MAX))
            .min(clock::max_unix_millis());
        if expires_at <= created_at {
            return Err(StoreError::InvalidTtl { ttl_ms });
        }

        let _guard = self.write_lock.lock().expect("cache write lock poisoned");
        let connection = self.manager.acquire()?;
        connection.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, created_at, expires_at) \
             VALUES (?, ?, ?, ?)",
            params![key, value, created_at, expires_at],
        )?;
        Ok(())
    }

    /// Delete every entry with `expires_at <= now`. Returns the number of
    /// rows removed.
    pub fn clear_expired(&self) -> Result<usize, StoreError> {
        let now = unix_millis(self.clock.now());
        let _guard = self.write_lock.lock().expect("cache write lock poisoned");
        let connection = self.manager.acquire()?;
        let removed =
            connection.execute("DELETE FROM cache_entries WHERE expires_at <= ?", params![now])?;
        Ok(removed)
    }

    /// Delete every entry. Returns the number of rows removed.
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().expect("cache write lock poisoned");
        let connection = self.manager.acquire()?;
        let removed = connection.execute("DELETE FROM cache_entries", [])?;
        Ok(removed)
    }

    /// Count entries, split by freshness.
    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        let now = unix_millis(self.clock.now());
        let connection = self.manager.acquire()?;
        let (entries, fresh): (i64, i64) = connection.query_row(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE expires_at > ?) FROM cache_entries",
            params![now],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let entries = usize::try_from(entries).unwrap_or(0);
        let fresh = usize::try_from(fresh).unwrap_or(0);
        Ok(CacheStats {
            entries,
            fresh,
            stale: entries.saturating_sub(fresh),
        })
    }
}

fn to_datetime(key: &str, millis: i64) -> Result<OffsetDateTime, StoreError> {
    clock::from_unix_millis(millis).ok_or_else(|| StoreError::CorruptTimestamp {
        key: key.to_owned(),
        millis,
    })
}

/// Resolve the fundlayer home directory from environment or default.
fn resolve_fundlayer_home() -> PathBuf {
    if let Some(path) = env::var_os("FUNDLAYER_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    PathBuf::from(".cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> (CacheStore, ManualClock) {
        let clock = ManualClock::at_epoch_2024();
        let store = CacheStore::open_with_clock(
            CacheConfig::at_path(dir.join("cache").join("data_cache.duckdb")),
            Arc::new(clock.clone()),
        )
        .expect("store open");
        (store, clock)
    }

    #[test]
    fn huge_ttl_is_clamped_to_a_readable_expiry() {
        let temp = tempdir().expect("tempdir");
        let (store, clock) = open_store(temp.path());

        store
            .set("k", "v", Duration::from_secs(u64::MAX))
            .expect("set");
        let hit = store.get("k").expect("get").expect("found");

        assert!(hit.fresh);
        assert_eq!(unix_millis(hit.expires_at), max_unix_millis());

        clock.advance(Duration::from_secs(3600 * 24 * 365 * 100));
        assert_eq!(store.clear_expired().expect("clear expired"), 0);
        assert!(store.get("k").expect("get").expect("found").fresh);
    }

    #[test]
    fn set_then_get_returns_fresh_value() {
        let temp = tempdir().expect("tempdir");
        let (store, _clock) = open_store(temp.path());

        store
            .set("price:code=1", r#"{"price":1.5}"#, Duration::from_secs(60))
            .expect("set");
        let hit = store.get("price:code=1").expect("get").expect("found");

        assert_eq!(hit.value, r#"{"price":1.5}"#);
        assert!(hit.fresh);
        assert!(hit.expires_at > hit.created_at);
    }

    #[test]
    fn missing_key_is_not_found() {
        let temp = tempdir().expect("tempdir");
        let (store, _clock) = open_store(temp.path());

        assert!(store.get("absent").expect("get").is_none());
    }

    #[test]
    fn set_overwrites_and_restamps_existing_entry() {
        let temp = tempdir().expect("tempdir");
        let (store, clock) = open_store(temp.path());

        store.set("k", "old", Duration::from_secs(10)).expect("set old");
        clock.advance(Duration::from_secs(20));
        assert!(!store.get("k").expect("get").expect("found").fresh);

        store.set("k", "new", Duration::from_secs(10)).expect("set new");
        let hit = store.get("k").expect("get").expect("found");
        assert_eq!(hit.value, "new");
        assert!(hit.fresh);
        assert_eq!(store.stats().expect("stats").entries, 1);
    }

    #[test]
    fn rejects_zero_ttl_and_empty_key() {
        let temp = tempdir().expect("tempdir");
        let (store, _clock) = open_store(temp.path());

        assert!(matches!(
            store.set("k", "v", Duration::ZERO),
            Err(StoreError::InvalidTtl { ttl_ms: 0 })
        ));
        assert!(matches!(
            store.set("", "v", Duration::from_secs(1)),
            Err(StoreError::EmptyKey)
        ));
    }

    #[test]
    fn stats_split_fresh_and_stale() {
        let temp = tempdir().expect("tempdir");
        let (store, clock) = open_store(temp.path());

        store.set("short", "a", Duration::from_secs(5)).expect("set");
        store.set("long", "b", Duration::from_secs(500)).expect("set");
        clock.advance(Duration::from_secs(10));

        let stats = store.stats().expect("stats");
        assert_eq!(
            stats,
            CacheStats {
                entries: 2,
                fresh: 1,
                stale: 1
            }
        );
    }

    #[test]
    fn clear_all_empties_the_table() {
        let temp = tempdir().expect("tempdir");
        let (store, _clock) = open_store(temp.path());

        store.set("a", "1", Duration::from_secs(5)).expect("set");
        store.set("b", "2", Duration::from_secs(5)).expect("set");

        assert_eq!(store.clear_all().expect("clear"), 2);
        assert_eq!(store.stats().expect("stats").entries, 0);
    }

    #[test]
    fn at_path_uses_parent_as_home() {
        let config = CacheConfig::at_path("/tmp/fundlayer/data_cache.duckdb");
        assert_eq!(config.home, PathBuf::from("/tmp/fundlayer"));
    }

    #[test]
    fn open_default_honors_the_cache_path_variable() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("env").join("cache.duckdb");
        env::set_var("FUNDLAYER_CACHE_PATH", &path);

        let store = CacheStore::open_default();
        env::remove_var("FUNDLAYER_CACHE_PATH");

        let store = store.expect("open default");
        assert_eq!(store.db_path(), path.as_path());
        assert!(path.exists());
    }
}
