//! Small descriptive statistics over score series.

/// Arithmetic mean, or `None` for an empty series.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "series are short")]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator), or `None` with fewer than two values.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "series are short")]
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let mean = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Relative change from `previous` to `current`, with `previous` floored at `epsilon`.
#[must_use]
pub fn growth_rate(current: f64, previous: f64, epsilon: f64) -> f64 {
    (current - previous) / previous.max(epsilon)
}

/// Relative growth from the first to the last value of a series, as a fraction.
///
/// Returns 0 for series shorter than two points or a zero starting value.
#[must_use]
pub fn series_growth(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 2 && *first != 0.0 => (last - first) / first.abs(),
        _ => 0.0,
    }
}

/// Indices of values whose z-score reaches `threshold`.
///
/// A series with fewer than two points or no spread has no anomalies.
#[must_use]
pub fn anomaly_indices(values: &[f64], threshold: f64) -> Vec<usize> {
    let (Some(mean), Some(std_dev)) = (mean(values), sample_std_dev(values)) else {
        return Vec::new();
    };

    if std_dev == 0.0 {
        return Vec::new();
    }

    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - mean) / std_dev).abs() >= threshold)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_dev() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(sample_std_dev(&[5.0]), None);

        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn growth_rate_floors_the_denominator() {
        assert!((growth_rate(60.0, 40.0, 1e-6) - 0.5).abs() < 1e-12);
        assert!(growth_rate(10.0, 0.0, 0.5).is_finite());
        assert!((growth_rate(10.0, 0.0, 0.5) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn series_growth_first_to_last() {
        assert!((series_growth(&[50.0, 10.0, 75.0]) - 0.5).abs() < 1e-12);
        assert!((series_growth(&[-20.0, -10.0]) - 0.5).abs() < 1e-12);
        assert_eq!(series_growth(&[10.0]), 0.0);
        assert_eq!(series_growth(&[0.0, 10.0]), 0.0);
    }

    #[test]
    fn anomalies_by_z_score() {
        let values = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 100.0];
        assert_eq!(anomaly_indices(&values, 2.0), vec![9]);
        assert!(anomaly_indices(&values, 5.0).is_empty());
    }

    #[test]
    fn flat_series_has_no_anomalies() {
        assert!(anomaly_indices(&[3.0, 3.0, 3.0], 0.5).is_empty());
        assert!(anomaly_indices(&[3.0], 0.5).is_empty());
    }
}
