//! Growth and anomaly signals derived by comparing snapshots.

use super::{Snapshot, stats};
use core::slice;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const LOG_TARGET: &str = "     trend";

/// Growth reported for a label that had no meaningful baseline presence.
///
/// Large enough to rank new entrants above any organic growth while staying finite.
pub const NEW_ENTRANT_GROWTH: f64 = 1_000_000.0;

/// Growth reported for a label that disappeared since the baseline.
pub const DROPOUT_GROWTH: f64 = -1.0;

/// Tuning knobs for [`TrendAnalyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrendSettings {
    /// Floor for the baseline score in the growth-rate denominator.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Multiple of the historical standard deviation that marks an anomaly.
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    /// Historical points required before anomaly detection is attempted.
    #[serde(default = "default_min_history")]
    pub min_history: usize,
}

const fn default_epsilon() -> f64 {
    1e-6
}

const fn default_z_threshold() -> f64 {
    2.0
}

const fn default_min_history() -> usize {
    3
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            z_threshold: default_z_threshold(),
            min_history: default_min_history(),
        }
    }
}

/// How one technology moved between two snapshots.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrendDelta {
    pub label: String,
    pub current_score: f64,
    pub baseline_score: Option<f64>,
    pub growth_rate: f64,
    pub is_new_entrant: bool,

    /// Present in the baseline but missing from the current snapshot.
    #[serde(default)]
    pub is_dropout: bool,
    pub is_anomaly: bool,
}

/// Compares snapshots to compute growth rates and flag anomalies.
#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer {
    settings: TrendSettings,
}

impl TrendAnalyzer {
    #[must_use]
    pub const fn new(settings: TrendSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &TrendSettings {
        &self.settings
    }

    /// Compare two snapshots, using the baseline as the only history point.
    ///
    /// With the default `min_history` this never flags anomalies; use
    /// [`Self::compare_with_history`] when more history is available.
    #[must_use]
    pub fn compare(&self, current: &Snapshot, baseline: &Snapshot) -> Vec<TrendDelta> {
        self.compare_with_history(current, baseline, slice::from_ref(baseline))
    }

    /// Compare two snapshots, judging anomalies against `history`.
    ///
    /// Labels in `current` come first, in snapshot order. Labels only present in
    /// `baseline` follow as dropouts with a current score of 0.
    #[must_use]
    pub fn compare_with_history(&self, current: &Snapshot, baseline: &Snapshot, history: &[Snapshot]) -> Vec<TrendDelta> {
        let mut deltas: Vec<TrendDelta> = current
            .signals
            .iter()
            .map(|signal| self.delta(&signal.label, signal.combined_score, baseline.score(&signal.label), history))
            .collect();

        let present: HashSet<&str> = current.labels().collect();
        deltas.extend(
            baseline
                .signals
                .iter()
                .filter(|s| !present.contains(s.label.as_str()))
                .map(|s| TrendDelta {
                    is_dropout: true,
                    ..self.delta(&s.label, 0.0, Some(s.combined_score), history)
                }),
        );

        let new_entrants = deltas.iter().filter(|d| d.is_new_entrant).count();
        let anomalies = deltas.iter().filter(|d| d.is_anomaly).count();
        log::debug!(
            target: LOG_TARGET,
            "Compared {} against {}: {} labels, {new_entrants} new, {anomalies} anomalous",
            current.date,
            baseline.date,
            deltas.len()
        );

        deltas
    }

    fn delta(&self, label: &str, current_score: f64, baseline_score: Option<f64>, history: &[Snapshot]) -> TrendDelta {
        let epsilon = self.settings.epsilon;
        let is_new_entrant = baseline_score.is_none_or(|b| b < epsilon);

        let growth_rate = match baseline_score {
            Some(b) if !is_new_entrant => stats::growth_rate(current_score, b, epsilon),
            _ => NEW_ENTRANT_GROWTH,
        };

        let past: Vec<f64> = history.iter().filter_map(|s| s.score(label)).collect();

        TrendDelta {
            label: label.to_string(),
            current_score,
            baseline_score,
            growth_rate,
            is_new_entrant,
            is_dropout: false,
            is_anomaly: self.is_anomaly(current_score, &past),
        }
    }

    /// Z-score test of `value` against `history`.
    ///
    /// Too little history or a flat history never produces an anomaly.
    #[must_use]
    pub fn is_anomaly(&self, value: f64, history: &[f64]) -> bool {
        if history.len() < self.settings.min_history.max(2) {
            return false;
        }

        match (stats::mean(history), stats::sample_std_dev(history)) {
            (Some(mean), Some(std_dev)) if std_dev > 0.0 => (value - mean).abs() > self.settings.z_threshold * std_dev,
            _ => false,
        }
    }
}
