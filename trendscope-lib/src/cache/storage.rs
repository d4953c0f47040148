use super::CacheEntry;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use core::fmt::Debug;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which medium backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageKind {
    /// One JSON file per key in a local directory.
    #[default]
    File,

    /// A shared Redis-protocol server.
    Remote,

    /// An in-process map, lost when the process exits.
    Memory,
}

/// A key/value medium with per-entry expiry.
///
/// Implementations must tolerate concurrent calls. Writes to the same key are
/// last-write-wins and readers never observe a partially written entry.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    fn kind(&self) -> StorageKind;

    /// Store a complete entry, replacing any previous entry for the same key.
    async fn put_entry(&self, entry: CacheEntry) -> Result<()>;

    /// Fetch the entry for `key`.
    ///
    /// Returns `Ok(None)` on a miss, including when the stored entry has expired
    /// or cannot be decoded. Errors mean the medium itself failed.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Remove the entry for `key`, returning whether one existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry whose key matches a glob `pattern`, returning how many were removed.
    async fn invalidate(&self, pattern: &str) -> Result<usize>;

    /// Store `value` under `key` for `ttl`.
    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) -> Result<()> {
        self.put_entry(CacheEntry::new(key, value, ttl, Utc::now())).await
    }

    /// Whether an unexpired entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Compile a key pattern where `*` matches any run of characters.
pub(crate) fn key_pattern(pattern: &str) -> Result<glob::Pattern> {
    use ohno::IntoAppError;

    glob::Pattern::new(pattern).into_app_err_with(|| format!("invalid key pattern '{pattern}'"))
}
