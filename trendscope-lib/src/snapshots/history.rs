use crate::analytics::{AggregatedSignal, Snapshot, normalize_label, stats};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One dated observation of a technology.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub signal: AggregatedSignal,
}

/// The signals of one technology across snapshots, oldest first.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TechnologyHistory {
    pub technology: String,
    pub points: Vec<HistoryPoint>,
}

impl TechnologyHistory {
    /// Collect the signals for `technology` from `snapshots`.
    ///
    /// The name is normalized the same way aggregation normalizes labels, and
    /// snapshots that do not mention the technology contribute nothing.
    #[must_use]
    pub fn from_snapshots<'a>(technology: &str, snapshots: impl IntoIterator<Item = &'a Snapshot>) -> Self {
        let technology = normalize_label(technology);
        let mut points: Vec<_> = snapshots
            .into_iter()
            .filter_map(|snapshot| {
                snapshot.signal(&technology).map(|signal| HistoryPoint {
                    date: snapshot.date,
                    signal: signal.clone(),
                })
            })
            .collect();
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);

        Self { technology, points }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn scores(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.signal.combined_score).collect()
    }

    /// Relative change of the combined score from the first to the last point.
    #[must_use]
    pub fn growth(&self) -> f64 {
        stats::series_growth(&self.scores())
    }

    /// Dates whose combined score has a z-score of at least `threshold` within this history.
    #[must_use]
    pub fn anomalies(&self, threshold: f64) -> Vec<NaiveDate> {
        stats::anomaly_indices(&self.scores(), threshold)
            .into_iter()
            .filter_map(|i| self.points.get(i).map(|p| p.date))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Source;
    use std::collections::{BTreeMap, BTreeSet};

    fn snapshot(day: u32, signals: &[(&str, f64)]) -> Snapshot {
        let signals = signals
            .iter()
            .map(|(label, score)| AggregatedSignal {
                label: (*label).to_string(),
                combined_score: *score,
                contributing_sources: BTreeSet::from([Source::Github]),
                per_source_scores: BTreeMap::from([(Source::Github, *score)]),
            })
            .collect();
        Snapshot::new(NaiveDate::from_ymd_opt(2024, 5, day).unwrap(), signals)
    }

    #[test]
    fn collects_points_in_date_order() {
        let snapshots = [
            snapshot(3, &[("python", 70.0)]),
            snapshot(1, &[("python", 50.0), ("go", 10.0)]),
            snapshot(2, &[("go", 12.0)]),
        ];

        let history = TechnologyHistory::from_snapshots(" Python", &snapshots);
        assert_eq!(history.technology, "python");
        let dates: Vec<_> = history.points.iter().map(|p| p.date.to_string()).collect();
        assert_eq!(dates, ["2024-05-01", "2024-05-03"]);
        assert!((history.growth() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn aliases_resolve_to_the_canonical_label() {
        let snapshots = [snapshot(1, &[("javascript", 80.0)])];
        let history = TechnologyHistory::from_snapshots("JS", &snapshots);
        assert_eq!(history.points.len(), 1);
    }

    #[test]
    fn anomalies_within_history() {
        let mut snapshots: Vec<_> = (1..=9).map(|day| snapshot(day, &[("go", 10.0)])).collect();
        snapshots.push(snapshot(10, &[("go", 100.0)]));

        let history = TechnologyHistory::from_snapshots("go", &snapshots);
        assert_eq!(history.anomalies(2.0), vec![NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()]);
    }

    #[test]
    fn unknown_technology_is_empty() {
        let history = TechnologyHistory::from_snapshots("cobol", &[snapshot(1, &[("go", 1.0)])]);
        assert!(history.is_empty());
        assert_eq!(history.growth(), 0.0);
    }
}
