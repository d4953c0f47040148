//! Storage on a shared Redis-protocol server.
//!
//! Entries are stored as their JSON envelope under a key prefix, with the
//! server's native `PX` expiry. The envelope's own expiry is checked again on
//! read so that clock drift between hosts cannot extend an entry's life.

use super::{CacheEntry, StorageBackend, StorageKind};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

const LOG_TARGET: &str = "    remote";

/// Prefix applied to every key written by this backend.
pub const DEFAULT_KEY_PREFIX: &str = "trendscope:";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Keys requested per `SCAN` round trip while invalidating.
const SCAN_BATCH: usize = 256;

/// A Redis-backed store shared between processes.
///
/// The connection is opened on first use. After a failed command it is dropped
/// and reopened by the next call.
#[derive(Debug)]
pub struct RemoteStorage {
    client: redis::Client,
    key_prefix: String,
    connect_timeout: Duration,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RemoteStorage {
    /// Create a backend for the server at `url` (for example `redis://localhost:6379/0`).
    ///
    /// Only the URL is validated here; no connection is made until the first call.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).into_app_err_with(|| format!("invalid remote cache URL '{url}'"))?;
        Ok(Self {
            client,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connection: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn remote_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(self.connect_timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_elapsed| app_err!("timed out connecting to the remote cache after {:?}", self.connect_timeout))?
            .into_app_err("unable to connect to the remote cache")?;

        log::debug!(target: LOG_TARGET, "Connected to the remote cache");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        *self.connection.lock().await = None;
    }

    /// Run `op` on a connection, dropping the cached connection if it fails.
    async fn with_connection<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: Future<Output = redis::RedisResult<T>> + Send,
    {
        let conn = self.connection().await?;
        match op(conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                    self.reset().await;
                }
                Err(e).into_app_err("remote cache command failed")
            }
        }
    }
}

/// Expiry in milliseconds for the `PX` argument, which must be at least 1.
fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl StorageBackend for RemoteStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Remote
    }

    async fn put_entry(&self, entry: CacheEntry) -> Result<()> {
        let key = self.remote_key(&entry.key);
        let payload = serde_json::to_string(&entry).into_app_err_with(|| format!("encoding cache entry '{}'", entry.key))?;
        let px = expiry_millis(entry.remaining_ttl(Utc::now()));

        self.with_connection(|mut conn| async move {
            let () = redis::cmd("SET").arg(&key).arg(payload).arg("PX").arg(px).query_async(&mut conn).await?;
            Ok(())
        })
        .await?;

        log::debug!(target: LOG_TARGET, "Stored '{}' for {px}ms", entry.key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let remote_key = self.remote_key(key);
        let payload: Option<String> = match self
            .with_connection(|mut conn| async move { redis::cmd("GET").arg(&remote_key).query_async(&mut conn).await })
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Treating '{key}' as a cache miss: {e:#}");
                return Ok(None);
            }
        };

        let Some(payload) = payload else {
            log::debug!(target: LOG_TARGET, "Cache miss for '{key}'");
            return Ok(None);
        };

        match serde_json::from_str::<CacheEntry>(&payload) {
            Ok(entry) if entry.key == key && entry.is_valid_at(Utc::now()) => {
                log::debug!(target: LOG_TARGET, "Cache hit for '{key}'");
                Ok(Some(entry))
            }
            Ok(_) => {
                log::debug!(target: LOG_TARGET, "Cache expired for '{key}'");
                Ok(None)
            }
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Discarding undecodable entry for '{key}': {e:#}");
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let remote_key = self.remote_key(key);
        let removed: i64 = self
            .with_connection(|mut conn| async move { redis::cmd("DEL").arg(&remote_key).query_async(&mut conn).await })
            .await?;
        Ok(removed > 0)
    }

    async fn invalidate(&self, pattern: &str) -> Result<usize> {
        let remote_pattern = self.remote_key(pattern);
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let scan_pattern = remote_pattern.clone();
            let (next, keys): (u64, Vec<String>) = self
                .with_connection(|mut conn| async move {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&scan_pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await
                })
                .await?;

            if !keys.is_empty() {
                let count: usize = self
                    .with_connection(|mut conn| async move { redis::cmd("DEL").arg(&keys).query_async(&mut conn).await })
                    .await?;
                removed += count;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        log::debug!(target: LOG_TARGET, "Invalidated {removed} entries matching '{pattern}'");
        Ok(removed)
    }
}
