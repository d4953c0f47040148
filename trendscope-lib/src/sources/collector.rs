use super::MetricSource;
use crate::Result;
use crate::analytics::{Aggregator, Normalizer, RawMetric, Snapshot, Source};
use crate::cache::{CacheCoordinator, FetchError, FetchOrigin};
use chrono::NaiveDate;
use futures::future::join_all;
use ohno::bail;
use std::collections::BTreeMap;
use std::sync::Arc;

const LOG_TARGET: &str = " collector";

/// A source that could not deliver measurements.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: Source,
    pub error: FetchError,
}

/// Everything gathered from the configured sources for one date.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub metrics: Vec<RawMetric>,
    pub origins: BTreeMap<Source, FetchOrigin>,
    pub failures: Vec<SourceFailure>,
}

impl Collection {
    /// True when at least one source failed while others delivered.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty() && !self.origins.is_empty()
    }
}

/// Queries a set of sources concurrently through the cache coordinator.
#[derive(Debug)]
pub struct Collector {
    coordinator: Arc<CacheCoordinator>,
    sources: Vec<Arc<dyn MetricSource>>,
}

impl Collector {
    #[must_use]
    pub const fn new(coordinator: Arc<CacheCoordinator>, sources: Vec<Arc<dyn MetricSource>>) -> Self {
        Self { coordinator, sources }
    }

    #[must_use]
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.sources.iter().map(|s| s.source())
    }

    /// Fetch every source's measurements for `date`.
    ///
    /// A failing source does not fail the collection; it is reported in
    /// [`Collection::failures`] and logged as a partial-data warning.
    pub async fn collect(&self, date: NaiveDate) -> Collection {
        let fetches = self.sources.iter().map(|source| self.fetch_one(Arc::clone(source), date));
        let results = join_all(fetches).await;

        let mut collection = Collection::default();
        for (source, result) in results {
            match result {
                Ok((metrics, origin)) => {
                    log::debug!(target: LOG_TARGET, "{source}: {} measurements ({origin:?})", metrics.len());
                    collection.metrics.extend(metrics);
                    _ = collection.origins.insert(source, origin);
                }
                Err(error) => {
                    log::warn!(target: LOG_TARGET, "Partial data for {date}: {source} unavailable: {error}");
                    collection.failures.push(SourceFailure { source, error });
                }
            }
        }

        collection
    }

    async fn fetch_one(
        &self,
        source: Arc<dyn MetricSource>,
        date: NaiveDate,
    ) -> (Source, core::result::Result<(Vec<RawMetric>, FetchOrigin), FetchError>) {
        let kind = source.source();
        let key = match source.fetch_key(date) {
            Ok(key) => key,
            Err(e) => return (kind, Err(e)),
        };

        let ttl = self.coordinator.ttl_for(&key);
        let result = self
            .coordinator
            .get_or_fetch_detailed(&key, ttl, || async { source.fetch(date).await })
            .await
            .map(|fetched| (fetched.value, fetched.origin));

        (kind, result)
    }

    /// Collect, normalize, and aggregate into the snapshot for `date`.
    ///
    /// Fails only when no source delivered anything.
    pub async fn build_snapshot(&self, date: NaiveDate, normalizer: &Normalizer, aggregator: &Aggregator) -> Result<(Snapshot, Vec<SourceFailure>)> {
        let collection = self.collect(date).await;
        if collection.origins.is_empty() {
            match collection.failures.first() {
                Some(first) => bail!("no source delivered measurements for {date}, first failure: {}", first.error),
                None => bail!("no sources configured for {date}"),
            }
        }

        let normalized = normalizer.normalize_all(&collection.metrics);
        Ok((aggregator.snapshot(date, &normalized), collection.failures))
    }
}
