//! Cross-source merging of normalized scores.

use super::{AggregatedSignal, NormalizedMetric, Snapshot, Source, normalize_label};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const LOG_TARGET: &str = "aggregator";

/// Per-source weights used when averaging scores. Sources without an entry weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AggregationWeights(BTreeMap<Source, f64>);

impl AggregationWeights {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    #[must_use]
    pub const fn new(weights: BTreeMap<Source, f64>) -> Self {
        Self(weights)
    }

    #[must_use]
    pub fn weight(&self, source: Source) -> f64 {
        self.0.get(&source).copied().unwrap_or(Self::DEFAULT_WEIGHT)
    }

    #[must_use]
    pub fn with(mut self, source: Source, weight: f64) -> Self {
        _ = self.0.insert(source, weight);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for (source, weight) in &self.0 {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(format!("weight for {source} must be a non-negative number, got {weight}"));
            }
        }
        Ok(())
    }
}

/// Merges normalized metrics into one ranked signal per technology.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    weights: AggregationWeights,
}

impl Aggregator {
    #[must_use]
    pub const fn new(weights: AggregationWeights) -> Self {
        Self { weights }
    }

    /// Group metrics by normalized label and compute a weighted mean per group.
    ///
    /// The output does not depend on the order of `metrics`: it is sorted by
    /// combined score descending with ties broken by label.
    #[must_use]
    pub fn aggregate(&self, metrics: &[NormalizedMetric]) -> Vec<AggregatedSignal> {
        let mut groups: BTreeMap<String, BTreeMap<Source, Vec<f64>>> = BTreeMap::new();
        for metric in metrics {
            let label = normalize_label(&metric.label);
            if label.is_empty() {
                log::debug!(target: LOG_TARGET, "Skipping {} metric with an empty label", metric.source);
                continue;
            }

            groups
                .entry(label)
                .or_default()
                .entry(metric.source)
                .or_default()
                .push(metric.score);
        }

        let mut signals: Vec<_> = groups
            .into_iter()
            .map(|(label, by_source)| {
                let per_source_scores: BTreeMap<Source, f64> = by_source
                    .into_iter()
                    .map(|(source, mut scores)| {
                        // summation order must not depend on input order
                        scores.sort_by(f64::total_cmp);
                        (source, mean(&scores))
                    })
                    .collect();

                AggregatedSignal {
                    combined_score: self.combine(&per_source_scores),
                    contributing_sources: per_source_scores.keys().copied().collect::<BTreeSet<_>>(),
                    per_source_scores,
                    label,
                }
            })
            .collect();

        sort_signals(&mut signals);
        log::debug!(target: LOG_TARGET, "Aggregated {} metrics into {} signals", metrics.len(), signals.len());
        signals
    }

    /// Aggregate metrics and wrap them into a snapshot for `date`.
    #[must_use]
    pub fn snapshot(&self, date: NaiveDate, metrics: &[NormalizedMetric]) -> Snapshot {
        Snapshot::new(date, self.aggregate(metrics))
    }

    fn combine(&self, per_source_scores: &BTreeMap<Source, f64>) -> f64 {
        let total_weight: f64 = per_source_scores.keys().map(|s| self.weights.weight(*s)).sum();
        if total_weight <= 0.0 {
            let scores: Vec<f64> = per_source_scores.values().copied().collect();
            return mean(&scores);
        }

        per_source_scores
            .iter()
            .map(|(source, score)| self.weights.weight(*source) * score)
            .sum::<f64>()
            / total_weight
    }
}

/// Sort signals by combined score descending, then label ascending.
pub fn sort_signals(signals: &mut [AggregatedSignal]) {
    signals.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score).then_with(|| a.label.cmp(&b.label)));
}

#[expect(clippy::cast_precision_loss, reason = "score counts are small")]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
