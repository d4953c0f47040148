use super::common;
use crate::Result;
use crate::analytics::{Snapshot, TrendDelta};
use chrono::NaiveDate;
use core::fmt::Write;
use owo_colors::OwoColorize;

const LABEL_HEADER: &str = "technology";

/// Write the top `top` signals of a snapshot as an aligned table.
pub fn generate_snapshot<W: Write>(snapshot: &Snapshot, top: usize, use_colors: bool, writer: &mut W) -> Result<()> {
    let title = format!("Technology trends for {} ({} technologies)", snapshot.date, snapshot.len());
    if use_colors {
        writeln!(writer, "{}", title.bold())?;
    } else {
        writeln!(writer, "{title}")?;
    }

    if snapshot.is_empty() {
        writeln!(writer, "  no data")?;
        return Ok(());
    }

    let shown: Vec<_> = snapshot.signals.iter().take(top).collect();
    let width = common::label_width(shown.iter().map(|s| s.label.as_str()), LABEL_HEADER);

    writeln!(writer)?;
    writeln!(writer, "  {:>3}  {LABEL_HEADER:<width$}  {:>6}  sources", "#", "score")?;
    for (index, signal) in shown.iter().enumerate() {
        let score = format!("{:>6}", common::format_score(signal.combined_score));
        let score = if use_colors {
            match signal.combined_score {
                s if s >= 66.0 => score.green().to_string(),
                s if s >= 33.0 => score.yellow().to_string(),
                _ => score.dimmed().to_string(),
            }
        } else {
            score
        };

        writeln!(
            writer,
            "  {:>3}  {:<width$}  {score}  {}",
            index + 1,
            signal.label,
            common::format_sources(&signal.contributing_sources)
        )?;
    }

    if snapshot.len() > shown.len() {
        writeln!(writer, "  ... and {} more", snapshot.len() - shown.len())?;
    }

    Ok(())
}

/// Write trend deltas between two snapshots as an aligned table.
pub fn generate_trends<W: Write>(date: NaiveDate, baseline: NaiveDate, deltas: &[TrendDelta], use_colors: bool, writer: &mut W) -> Result<()> {
    let title = format!("Trends for {date} against {baseline}");
    if use_colors {
        writeln!(writer, "{}", title.bold())?;
    } else {
        writeln!(writer, "{title}")?;
    }

    if deltas.is_empty() {
        writeln!(writer, "  no data")?;
        return Ok(());
    }

    let width = common::label_width(deltas.iter().map(|d| d.label.as_str()), LABEL_HEADER);

    writeln!(writer)?;
    writeln!(writer, "  {LABEL_HEADER:<width$}  {:>6}  {:>8}  {:>9}", "score", "baseline", "growth")?;
    for delta in deltas {
        let baseline_score = delta.baseline_score.map_or_else(|| "-".to_string(), common::format_score);
        let growth = format!("{:>9}", common::format_growth(delta));
        let growth = if use_colors {
            if delta.is_new_entrant {
                growth.cyan().to_string()
            } else if delta.growth_rate > 0.0 {
                growth.green().to_string()
            } else if delta.growth_rate < 0.0 {
                growth.red().to_string()
            } else {
                growth
            }
        } else {
            growth
        };

        let mut line = format!(
            "  {:<width$}  {:>6}  {baseline_score:>8}  {growth}",
            delta.label,
            common::format_score(delta.current_score)
        );
        if delta.is_anomaly {
            let marker = "anomaly";
            if use_colors {
                write!(line, "  {}", marker.red().bold())?;
            } else {
                write!(line, "  {marker}")?;
            }
        }
        writeln!(writer, "{line}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{Aggregator, NEW_ENTRANT_GROWTH, NormalizedMetric, Source};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn snapshot() -> Snapshot {
        Aggregator::default().snapshot(
            date(1),
            &[
                NormalizedMetric::new(Source::Reddit, "python", 62.0),
                NormalizedMetric::new(Source::Github, "python", 71.0),
                NormalizedMetric::new(Source::Github, "rust", 40.0),
                NormalizedMetric::new(Source::Reddit, "cobol", 1.0),
            ],
        )
    }

    fn delta(label: &str, current_score: f64, baseline_score: Option<f64>, growth_rate: f64, is_anomaly: bool) -> TrendDelta {
        TrendDelta {
            label: label.to_string(),
            current_score,
            baseline_score,
            growth_rate,
            is_new_entrant: baseline_score.is_none(),
            is_dropout: false,
            is_anomaly,
        }
    }

    #[test]
    fn test_generate_snapshot_table() {
        let mut output = String::new();
        generate_snapshot(&snapshot(), 20, false, &mut output).unwrap();

        assert!(output.starts_with("Technology trends for 2024-05-01 (3 technologies)"));
        let python = output.lines().find(|l| l.contains("python")).unwrap();
        assert!(python.contains("66.5"));
        assert!(python.contains("reddit, github"));
        assert!(!output.contains("more"));
    }

    #[test]
    fn test_generate_snapshot_truncates() {
        let mut output = String::new();
        generate_snapshot(&snapshot(), 1, false, &mut output).unwrap();

        assert!(output.contains("python"));
        assert!(!output.contains("rust"));
        assert!(output.contains("... and 2 more"));
    }

    #[test]
    fn test_generate_empty_snapshot() {
        let mut output = String::new();
        generate_snapshot(&Snapshot::new(date(1), Vec::new()), 20, false, &mut output).unwrap();
        assert!(output.contains("no data"));
    }

    #[test]
    fn test_generate_trends_table() {
        let deltas = vec![
            delta("python", 70.0, Some(56.0), 0.25, true),
            delta("zig", 12.0, None, NEW_ENTRANT_GROWTH, false),
            TrendDelta {
                is_dropout: true,
                ..delta("perl", 0.0, Some(8.0), -1.0, false)
            },
            delta("cobol", 0.0, Some(2.0), -1.0, false),
        ];
        let mut output = String::new();
        generate_trends(date(8), date(1), &deltas, false, &mut output).unwrap();

        assert!(output.starts_with("Trends for 2024-05-08 against 2024-05-01"));
        let python = output.lines().find(|l| l.contains("python")).unwrap();
        assert!(python.contains("+25.0%"));
        assert!(python.ends_with("anomaly"));
        assert!(output.lines().any(|l| l.contains("zig") && l.contains("new")));
        assert!(output.lines().any(|l| l.contains("perl") && l.contains("dropped")));
        assert!(output.lines().any(|l| l.contains("cobol") && l.contains("-100.0%")));
    }

    #[test]
    fn test_generate_trends_pads_non_ascii_labels_by_characters() {
        let deltas = vec![
            delta("développement-web", 70.0, Some(56.0), 0.25, false),
            delta("go", 12.0, Some(12.0), 0.0, false),
        ];
        let mut output = String::new();
        generate_trends(date(8), date(1), &deltas, false, &mut output).unwrap();

        let widest = output.lines().find(|l| l.contains("développement-web")).unwrap();
        assert!(widest.starts_with("  développement-web    70.0"));
    }

    #[test]
    fn test_generate_color_mode_never() {
        let mut output = String::new();
        generate_snapshot(&snapshot(), 20, false, &mut output).unwrap();
        generate_trends(date(8), date(1), &[delta("python", 70.0, Some(56.0), 0.25, true)], false, &mut output).unwrap();
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_generate_color_mode_always() {
        let mut output = String::new();
        generate_snapshot(&snapshot(), 20, true, &mut output).unwrap();
        assert!(output.contains("\x1b["));
    }
}
