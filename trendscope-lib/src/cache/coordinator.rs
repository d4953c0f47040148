//! Get-or-fetch over a storage backend with per-key request deduplication.
//!
//! On a miss, exactly one caller per key (the leader) runs the producer. Other
//! callers for the same key register as waiters on the leader's watch channel
//! and receive the identical outcome, success or failure. Failures are never
//! written to storage, so the next caller after a failure starts from scratch.

use super::coordinator_stats::StatsCounters;
use super::{CoordinatorStats, FetchError, FetchKey, StorageBackend, Throttler};
use crate::Result;
use core::time::Duration;
use ohno::app_err;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

const LOG_TARGET: &str = "     cache";

type Outcome = core::result::Result<serde_json::Value, FetchError>;
type InFlight = HashMap<FetchKey, watch::Receiver<Option<Outcome>>>;

/// Behavior knobs for [`CacheCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// When false, storage is neither read nor written but concurrent fetches are still shared.
    pub enabled: bool,

    /// TTL for namespaces without an override.
    pub default_ttl: Duration,

    /// Per-namespace TTL overrides.
    pub namespace_ttl: BTreeMap<String, Duration>,

    /// Upper bound on a single producer run. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,

    /// Maximum number of producers running at the same time.
    pub max_concurrent_fetches: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(24 * 60 * 60),
            namespace_ttl: BTreeMap::new(),
            fetch_timeout: None,
            max_concurrent_fetches: 8,
        }
    }
}

/// Where a value returned by [`CacheCoordinator::get_or_fetch_detailed`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// Read from storage without running a producer.
    Cache,

    /// Produced by this caller. `stored` tells whether it was written back to storage.
    Producer { stored: bool },

    /// Produced by a concurrent caller for the same key.
    Shared,
}

/// A value together with its [`FetchOrigin`].
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub origin: FetchOrigin,
}

/// Process-wide cache front end.
///
/// Construct once with the chosen backend and share through an `Arc`.
#[derive(Debug)]
pub struct CacheCoordinator {
    storage: Arc<dyn StorageBackend>,
    settings: CoordinatorSettings,
    in_flight: Mutex<InFlight>,
    throttler: Throttler,
    stats: StatsCounters,
}

impl CacheCoordinator {
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, settings: CoordinatorSettings) -> Self {
        let throttler = Throttler::new(settings.max_concurrent_fetches);
        Self {
            storage,
            settings,
            in_flight: Mutex::new(HashMap::new()),
            throttler,
            stats: StatsCounters::default(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    #[must_use]
    pub const fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.stats.snapshot()
    }

    /// The TTL configured for the key's namespace.
    #[must_use]
    pub fn ttl_for(&self, key: &FetchKey) -> Duration {
        self.settings
            .namespace_ttl
            .get(key.namespace())
            .copied()
            .unwrap_or(self.settings.default_ttl)
    }

    /// Number of keys with a fetch currently in progress.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().len()
    }

    /// Return the cached value for `key`, or compute it with `producer` at most once
    /// across all concurrent callers.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &FetchKey, ttl: Duration, producer: F) -> Result<T, FetchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.get_or_fetch_detailed(key, ttl, producer).await.map(|fetched| fetched.value)
    }

    /// Like [`Self::get_or_fetch`], also reporting where the value came from.
    pub async fn get_or_fetch_detailed<T, F, Fut>(&self, key: &FetchKey, ttl: Duration, producer: F) -> Result<Fetched<T>, FetchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key_str = key.to_string();

        if let Some(value) = self.cached::<T>(&key_str).await {
            self.stats.hit();
            return Ok(Fetched {
                value,
                origin: FetchOrigin::Cache,
            });
        }
        self.stats.miss();

        let sender = match self.join_or_lead(key) {
            Role::Waiter(receiver) => return self.wait_for_leader(&key_str, receiver).await,
            Role::Leader(sender) => sender,
        };

        let mut guard = LeaderGuard {
            coordinator: self,
            key: key.clone(),
            sender: Some(sender),
        };

        // a previous leader may have stored the value between our miss and our registration
        if let Some(value) = self.cached_json(&key_str).await
            && let Ok(typed) = serde_json::from_value::<T>(value.clone())
        {
            log::debug!(target: LOG_TARGET, "'{key_str}' was stored by a previous fetch");
            guard.publish(Ok(value));
            return Ok(Fetched {
                value: typed,
                origin: FetchOrigin::Cache,
            });
        }

        let result = self.run_producer(&key_str, producer).await;
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Producer for '{key_str}' failed: {e:#}");
                let error = FetchError::producer(&key_str, e);
                guard.publish(Err(error.clone()));
                return Err(error);
            }
        };

        let json = match serde_json::to_value(&value) {
            Ok(json) => json,
            Err(e) => {
                let error = FetchError::serialization(&key_str, &e);
                guard.publish(Err(error.clone()));
                return Err(error);
            }
        };

        let stored = self.settings.enabled && self.write_back(&key_str, json.clone(), ttl).await;
        guard.publish(Ok(json));

        Ok(Fetched {
            value,
            origin: FetchOrigin::Producer { stored },
        })
    }

    /// Read a value straight from storage.
    ///
    /// Unlike [`Self::get_or_fetch`], storage failures are reported as
    /// [`FetchError::StorageUnavailable`] so callers can tell them apart from "no data".
    pub async fn lookup<T: DeserializeOwned>(&self, key: &FetchKey) -> Result<Option<T>, FetchError> {
        if !self.settings.enabled {
            return Ok(None);
        }

        let key_str = key.to_string();
        let Some(entry) = self.storage.get(&key_str).await.map_err(FetchError::storage)? else {
            return Ok(None);
        };

        serde_json::from_value(entry.value)
            .map(Some)
            .map_err(|e| FetchError::serialization(&key_str, &e))
    }

    /// Write a value straight to storage.
    pub async fn store<T: Serialize>(&self, key: &FetchKey, value: &T, ttl: Duration) -> Result<(), FetchError> {
        if !self.settings.enabled {
            return Ok(());
        }

        let key_str = key.to_string();
        let json = serde_json::to_value(value).map_err(|e| FetchError::serialization(&key_str, &e))?;
        self.storage.put(&key_str, json, ttl).await.map_err(FetchError::storage)
    }

    /// Remove the entry for `key`.
    pub async fn delete(&self, key: &FetchKey) -> Result<bool, FetchError> {
        self.storage.delete(&key.to_string()).await.map_err(FetchError::storage)
    }

    /// Remove every entry whose rendered key matches `pattern` (`*` is a wildcard).
    pub async fn invalidate(&self, pattern: &str) -> Result<usize, FetchError> {
        let removed = self.storage.invalidate(pattern).await.map_err(FetchError::storage)?;
        log::info!(target: LOG_TARGET, "Invalidated {removed} cache entries matching '{pattern}'");
        Ok(removed)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically join the fetch in progress for `key` or register as its leader.
    fn join_or_lead(&self, key: &FetchKey) -> Role {
        let mut in_flight = self.lock_in_flight();
        if let Some(receiver) = in_flight.get(key) {
            return Role::Waiter(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        _ = in_flight.insert(key.clone(), receiver);
        Role::Leader(sender)
    }

    async fn wait_for_leader<T: DeserializeOwned>(
        &self,
        key_str: &str,
        mut receiver: watch::Receiver<Option<Outcome>>,
    ) -> Result<Fetched<T>, FetchError> {
        self.stats.shared_wait();
        log::debug!(target: LOG_TARGET, "Waiting on the in-flight fetch for '{key_str}'");

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(published) => published.clone(),
            Err(_closed) => None,
        };

        match outcome {
            Some(Ok(json)) => serde_json::from_value(json)
                .map(|value| Fetched {
                    value,
                    origin: FetchOrigin::Shared,
                })
                .map_err(|e| FetchError::serialization(key_str, &e)),
            Some(Err(error)) => Err(error),
            None => Err(FetchError::producer(key_str, app_err!("the fetch in progress ended without a result"))),
        }
    }

    async fn run_producer<T, F, Fut>(&self, key_str: &str, producer: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(_permit) = self.throttler.acquire().await else {
            return Err(app_err!("producer slots have been closed"));
        };

        self.stats.producer_call();
        log::debug!(target: LOG_TARGET, "Fetching '{key_str}' ({} producer slots left)", self.throttler.available());

        match self.settings.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, producer())
                .await
                .unwrap_or_else(|_elapsed| Err(app_err!("timed out after {limit:?}"))),
            None => producer().await,
        }
    }

    async fn cached<T: DeserializeOwned>(&self, key_str: &str) -> Option<T> {
        let json = self.cached_json(key_str).await?;
        match serde_json::from_value(json) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Ignoring cached value for '{key_str}' with an unexpected shape: {e:#}");
                None
            }
        }
    }

    /// Storage read where failures degrade to a miss.
    async fn cached_json(&self, key_str: &str) -> Option<serde_json::Value> {
        if !self.settings.enabled {
            return None;
        }

        match self.storage.get(key_str).await {
            Ok(entry) => entry.map(|e| e.value),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Cache read for '{key_str}' failed, fetching instead: {e:#}");
                None
            }
        }
    }

    /// Write a fresh value, reporting whether it was stored.
    async fn write_back(&self, key_str: &str, json: serde_json::Value, ttl: Duration) -> bool {
        match self.storage.put(key_str, json, ttl).await {
            Ok(()) => true,
            Err(e) => {
                self.stats.store_failure();
                log::warn!(target: LOG_TARGET, "Unable to store '{key_str}', returning it uncached: {e:#}");
                false
            }
        }
    }
}

enum Role {
    Leader(watch::Sender<Option<Outcome>>),
    Waiter(watch::Receiver<Option<Outcome>>),
}

/// Publishes the leader's outcome exactly once, even if the leader is dropped mid-fetch.
struct LeaderGuard<'a> {
    coordinator: &'a CacheCoordinator,
    key: FetchKey,
    sender: Option<watch::Sender<Option<Outcome>>>,
}

impl LeaderGuard<'_> {
    fn publish(&mut self, outcome: Outcome) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        let mut in_flight = self.coordinator.lock_in_flight();
        _ = in_flight.remove(&self.key);
        _ = sender.send_replace(Some(outcome));
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            log::debug!(target: LOG_TARGET, "Fetch for '{}' was cancelled", self.key);
            let error = FetchError::producer(self.key.to_string(), app_err!("the fetch was cancelled before completing"));
            self.publish(Err(error));
        }
    }
}
