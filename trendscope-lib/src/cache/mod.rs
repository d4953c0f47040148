//! TTL storage and fetch coordination.
//!
//! A [`StorageBackend`] keeps JSON values with an expiry. The
//! [`CacheCoordinator`] sits in front of one and guarantees that for any
//! [`FetchKey`] at most one producer runs at a time, handing its outcome to every
//! concurrent caller for the same key.

mod cache_entry;
mod coordinator;
mod coordinator_stats;
mod fetch_error;
mod fetch_key;
mod file_storage;
mod memory_storage;
mod remote_storage;
mod storage;
mod throttler;

pub use cache_entry::CacheEntry;
pub use coordinator::{CacheCoordinator, CoordinatorSettings, FetchOrigin, Fetched};
pub use coordinator_stats::CoordinatorStats;
pub use fetch_error::FetchError;
pub use fetch_key::{FetchKey, FetchKeyBuilder, HISTORY_NAMESPACE, ParamValue, SNAPSHOT_NAMESPACE, SetMember};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use remote_storage::{DEFAULT_KEY_PREFIX, RemoteStorage};
pub(crate) use storage::key_pattern;
pub use storage::{StorageBackend, StorageKind};
use throttler::Throttler;
