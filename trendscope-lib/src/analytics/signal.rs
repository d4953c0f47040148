use super::Source;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A measurement mapped onto the common 0..100 scale.
///
/// Derived deterministically from a [`RawMetric`](super::RawMetric) and never persisted on its own.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NormalizedMetric {
    pub source: Source,
    pub label: String,
    pub score: f64,
}

impl NormalizedMetric {
    #[must_use]
    pub fn new(source: Source, label: impl Into<String>, score: f64) -> Self {
        Self {
            source,
            label: label.into(),
            score,
        }
    }
}

/// The merged view of one technology across all sources that mention it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggregatedSignal {
    pub label: String,
    pub combined_score: f64,
    pub contributing_sources: BTreeSet<Source>,
    pub per_source_scores: BTreeMap<Source, f64>,
}

impl AggregatedSignal {
    /// Number of sources that reported this technology.
    #[must_use]
    pub fn coverage(&self) -> usize {
        self.contributing_sources.len()
    }
}
