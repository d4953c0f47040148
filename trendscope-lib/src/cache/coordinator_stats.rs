use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;

/// Live counters updated by the coordinator.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    producer_calls: AtomicU64,
    shared_waits: AtomicU64,
    store_failures: AtomicU64,
}

impl StatsCounters {
    pub fn hit(&self) {
        _ = self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        _ = self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn producer_call(&self) {
        _ = self.producer_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn shared_wait(&self) {
        _ = self.shared_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn store_failure(&self) {
        _ = self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            producer_calls: self.producer_calls.load(Ordering::Relaxed),
            shared_waits: self.shared_waits.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the coordinator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Lookups answered from storage.
    pub hits: u64,

    /// Lookups that found nothing usable in storage.
    pub misses: u64,

    /// Times a producer was actually invoked.
    pub producer_calls: u64,

    /// Callers that waited on another caller's in-flight fetch.
    pub shared_waits: u64,

    /// Fresh values that could not be written back to storage.
    pub store_failures: u64,
}

impl CoordinatorStats {
    /// Fraction of lookups served from storage, or `None` before any lookup.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counter values stay far below 2^52")]
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}

impl fmt::Display for CoordinatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits, {} misses, {} producer calls, {} shared waits, {} store failures",
            self.hits, self.misses, self.producer_calls, self.shared_waits, self.store_failures
        )
    }
}
