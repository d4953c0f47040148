//! Producers of raw measurements and their concurrent collection.

mod collector;
mod file_source;
mod metric_source;

pub use collector::{Collection, Collector, SourceFailure};
pub use file_source::FileSource;
pub use metric_source::MetricSource;
