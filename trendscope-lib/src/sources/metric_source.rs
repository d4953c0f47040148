use crate::Result;
use crate::analytics::{RawMetric, Source};
use crate::cache::{FetchError, FetchKey};
use async_trait::async_trait;
use chrono::NaiveDate;
use core::fmt::Debug;

/// A producer of raw measurements for one [`Source`].
///
/// Fetches may be slow and rate-limited, so they are always routed through the
/// cache coordinator. Implementations must be safe to retry and must not mutate
/// shared state, since a failed fetch is simply attempted again by the next caller.
#[async_trait]
pub trait MetricSource: Send + Sync + Debug {
    fn source(&self) -> Source;

    /// The cache key for this source's measurements on `date`.
    ///
    /// Sources whose results depend on parameters beyond the date should fold
    /// them into the key so that differently configured requests do not collide.
    fn fetch_key(&self, date: NaiveDate) -> Result<FetchKey, FetchError> {
        FetchKey::builder(self.source().namespace()).date(date).build()
    }

    /// Retrieve the raw measurements for `date`.
    async fn fetch(&self, date: NaiveDate) -> Result<Vec<RawMetric>>;
}
