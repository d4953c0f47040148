//! Common utilities shared across report generators.

use crate::analytics::{Source, TrendDelta};
use std::collections::BTreeSet;

/// Format a 0-100 score with one decimal.
pub fn format_score(score: f64) -> String {
    format!("{score:.1}")
}

/// Format the growth of a trend delta.
///
/// New entrants and dropouts are named rather than shown as their sentinel growth values.
pub fn format_growth(delta: &TrendDelta) -> String {
    if delta.is_new_entrant {
        "new".to_string()
    } else if delta.is_dropout {
        "dropped".to_string()
    } else {
        format!("{:+.1}%", delta.growth_rate * 100.0)
    }
}

/// Format a set of sources as a comma-separated list.
pub fn format_sources(sources: &BTreeSet<Source>) -> String {
    sources.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Width of the widest label in characters, but at least as wide as `header`.
pub fn label_width<'a>(labels: impl IntoIterator<Item = &'a str>, header: &str) -> usize {
    labels
        .into_iter()
        .map(|label| label.chars().count())
        .max()
        .unwrap_or(0)
        .max(header.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::NEW_ENTRANT_GROWTH;

    fn delta(growth_rate: f64, current_score: f64, is_new_entrant: bool) -> TrendDelta {
        TrendDelta {
            label: "rust".to_string(),
            current_score,
            baseline_score: (!is_new_entrant).then_some(50.0),
            growth_rate,
            is_new_entrant,
            is_dropout: false,
            is_anomaly: false,
        }
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(66.5), "66.5");
        assert_eq!(format_score(100.0), "100.0");
        assert_eq!(format_score(0.04), "0.0");
    }

    #[test]
    fn test_format_growth() {
        assert_eq!(format_growth(&delta(0.25, 62.5, false)), "+25.0%");
        assert_eq!(format_growth(&delta(-0.1, 45.0, false)), "-10.0%");
        assert_eq!(format_growth(&delta(NEW_ENTRANT_GROWTH, 10.0, true)), "new");
        assert_eq!(
            format_growth(&TrendDelta {
                is_dropout: true,
                ..delta(-1.0, 0.0, false)
            }),
            "dropped"
        );

        // still listed, only its score fell to zero
        assert_eq!(format_growth(&delta(-1.0, 0.0, false)), "-100.0%");
    }

    #[test]
    fn test_format_sources() {
        let sources = BTreeSet::from([Source::Reddit, Source::Github]);
        assert_eq!(format_sources(&sources), "reddit, github");
        assert_eq!(format_sources(&BTreeSet::new()), "");
    }

    #[test]
    fn test_label_width() {
        assert_eq!(label_width(["go", "typescript"], "technology"), 10);
        assert_eq!(label_width(["go"], "technology"), 10);
        assert_eq!(label_width(["kubernetes-operators"], "technology"), 20);
    }

    #[test]
    fn label_width_counts_characters() {
        assert_eq!(label_width(["c♯"], ""), 2);
        assert_eq!(label_width(["développement-web"], "technology"), 17);
        assert_eq!(label_width(["go"], "tecnología"), 10);
    }
}
