use super::{AggregatedSignal, sort_signals};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The ranked signals for one calendar date.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub signals: Vec<AggregatedSignal>,
}

impl Snapshot {
    /// Create a snapshot, putting `signals` into canonical order.
    #[must_use]
    pub fn new(date: NaiveDate, mut signals: Vec<AggregatedSignal>) -> Self {
        sort_signals(&mut signals);
        Self { date, signals }
    }

    #[must_use]
    pub fn signal(&self, label: &str) -> Option<&AggregatedSignal> {
        self.signals.iter().find(|s| s.label == label)
    }

    #[must_use]
    pub fn score(&self, label: &str) -> Option<f64> {
        self.signal(label).map(|s| s.combined_score)
    }

    #[must_use]
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.signals.iter().map(|s| s.label.as_str())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.signals.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
