//! Async facade over the durable cache store.

use std::time::Duration;

use fundlayer_store::{CacheStats, CacheStore, StoreError};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

/// Defines how a fetch interacts with the persistent cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a fresh entry when present; otherwise fetch, write the result
    /// and fall back to a stale entry when every source fails. (Default)
    #[default]
    Use,
    /// Always fetch from upstream, write the result, and still fall back to
    /// a stale entry when every source fails.
    Refresh,
    /// Always fetch from upstream; never read, write or fall back.
    Bypass,
}

impl CacheMode {
    /// Maps the boolean `use_cache` flag onto a mode.
    pub const fn from_use_cache(use_cache: bool) -> Self {
        if use_cache {
            Self::Use
        } else {
            Self::Refresh
        }
    }

    pub const fn reads_fresh(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        !matches!(self, Self::Bypass)
    }

    pub const fn falls_back_to_stale(self) -> bool {
        !matches!(self, Self::Bypass)
    }
}

#[derive(Debug, Error)]
pub enum CacheAccessError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cache task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("cached payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One cached payload, decoded back into JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub value: Value,
    pub fresh: bool,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Runs blocking store calls on the tokio blocking pool.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    store: CacheStore,
}

impl ResponseCache {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn now(&self) -> OffsetDateTime {
        self.store.clock().now()
    }

    /// Reads `key`. A row whose payload is no longer valid JSON is reported
    /// as absent.
    pub async fn get(&self, key: &str) -> Result<Option<CachedValue>, CacheAccessError> {
        let store = self.store.clone();
        let owned_key = key.to_owned();
        let Some(lookup) = tokio::task::spawn_blocking(move || store.get(&owned_key)).await??
        else {
            return Ok(None);
        };

        match serde_json::from_str(&lookup.value) {
            Ok(value) => Ok(Some(CachedValue {
                value,
                fresh: lookup.fresh,
                created_at: lookup.created_at,
                expires_at: lookup.expires_at,
            })),
            Err(error) => {
                tracing::warn!(key, error = %error, "ignoring undecodable cache entry");
                Ok(None)
            }
        }
    }

    pub async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheAccessError> {
        let store = self.store.clone();
        let owned_key = key.to_owned();
        let body = serde_json::to_string(value)?;
        tokio::task::spawn_blocking(move || store.set(&owned_key, &body, ttl)).await??;
        Ok(())
    }

    pub async fn clear_expired(&self) -> Result<usize, CacheAccessError> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.clear_expired()).await??)
    }

    pub async fn clear_all(&self) -> Result<usize, CacheAccessError> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.clear_all()).await??)
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheAccessError> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.stats()).await??)
    }
}
