use super::{Source, Unit};
use serde::{Deserialize, Serialize};

/// A measurement as reported by a source, before normalization.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawMetric {
    pub source: Source,
    pub label: String,
    pub raw_value: f64,
    pub unit: Unit,
}

impl RawMetric {
    #[must_use]
    pub fn new(source: Source, label: impl Into<String>, raw_value: f64, unit: Unit) -> Self {
        Self {
            source,
            label: label.into(),
            raw_value,
            unit,
        }
    }

    /// Shorthand for a [`Unit::Count`] measurement.
    #[must_use]
    pub fn count(source: Source, label: impl Into<String>, raw_value: f64) -> Self {
        Self::new(source, label, raw_value, Unit::Count)
    }
}
