//! Normalization, aggregation, and trend analysis of popularity measurements.
//!
//! Raw per-source measurements ([`RawMetric`]) are scored onto a shared 0..100
//! scale by the [`Normalizer`], merged per technology by the [`Aggregator`] into
//! a ranked [`Snapshot`], and compared over time by the [`TrendAnalyzer`].
//! Everything in this module is pure and synchronous.

mod aggregator;
mod label;
mod normalizer;
mod raw_metric;
mod signal;
mod snapshot;
mod source;
pub mod stats;
mod trend;

pub use aggregator::{AggregationWeights, Aggregator, sort_signals};
pub use label::normalize_label;
pub use normalizer::{MAX_SCORE, NormalizationParams, Normalizer, RankRange, ScalingRule};
pub use raw_metric::RawMetric;
pub use signal::{AggregatedSignal, NormalizedMetric};
pub use snapshot::Snapshot;
pub use source::{Source, Unit};
pub use trend::{DROPOUT_GROWTH, NEW_ENTRANT_GROWTH, TrendAnalyzer, TrendDelta, TrendSettings};
