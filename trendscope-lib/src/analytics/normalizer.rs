//! Mapping of raw per-source measurements onto a common 0..100 scale.
//!
//! Every scaling rule is monotonic and bounded. All parameters are explicit
//! inputs carried by [`NormalizationParams`], so the same raw value always
//! normalizes to the same score under the same configuration.

use super::{NormalizedMetric, RawMetric, Source, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest score a normalized metric can have.
pub const MAX_SCORE: f64 = 100.0;

/// How a raw value is compressed into the 0..100 range.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ScalingRule {
    /// `100 * ln(1 + x) / ln(1 + saturation)`, for unbounded counts.
    ///
    /// A raw value equal to `saturation` scores exactly 100.
    Logarithmic { saturation: f64 },

    /// `100 * x / max`, for values that already live on a bounded index.
    Linear { max: f64 },

    /// Position of the value inside an explicitly supplied observed range.
    MinMax { min: f64, max: f64 },
}

impl ScalingRule {
    /// Apply the rule to a raw value.
    ///
    /// Negative or non-finite inputs score 0. Results are clamped to `[0, 100]`.
    #[must_use]
    pub fn apply(self, raw_value: f64) -> f64 {
        if !raw_value.is_finite() || raw_value < 0.0 {
            return 0.0;
        }

        let score = match self {
            Self::Logarithmic { saturation } => {
                if saturation <= 0.0 {
                    return 0.0;
                }
                MAX_SCORE * raw_value.ln_1p() / saturation.ln_1p()
            }
            Self::Linear { max } => {
                if max <= 0.0 {
                    return 0.0;
                }
                MAX_SCORE * raw_value / max
            }
            Self::MinMax { min, max } => {
                if max <= min {
                    return 0.0;
                }
                MAX_SCORE * (raw_value - min) / (max - min)
            }
        };

        clamp_score(score)
    }

    /// Check that the rule's parameters describe a usable range.
    pub fn validate(self) -> Result<(), String> {
        match self {
            Self::Logarithmic { saturation } if !(saturation.is_finite() && saturation > 0.0) => {
                Err(format!("logarithmic saturation must be positive, got {saturation}"))
            }
            Self::Linear { max } if !(max.is_finite() && max > 0.0) => Err(format!("linear max must be positive, got {max}")),
            Self::MinMax { min, max } if !(min.is_finite() && max.is_finite() && min < max) => {
                Err(format!("min-max range must satisfy min < max, got [{min}, {max}]"))
            }
            _ => Ok(()),
        }
    }
}

/// Observed range of rank positions. Rank `best` scores 100 and rank `worst` scores 0.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RankRange {
    pub best: f64,
    pub worst: f64,
}

impl Default for RankRange {
    fn default() -> Self {
        Self { best: 1.0, worst: 100.0 }
    }
}

/// Scaling configuration for every source.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NormalizationParams {
    #[serde(default)]
    pub rules: BTreeMap<Source, ScalingRule>,

    #[serde(default)]
    pub rank_range: RankRange,
}

impl Default for NormalizationParams {
    fn default() -> Self {
        let rules = BTreeMap::from([
            (Source::Reddit, ScalingRule::Logarithmic { saturation: 20_000.0 }),
            (Source::Github, ScalingRule::Logarithmic { saturation: 2_000.0 }),
            (Source::Stackoverflow, ScalingRule::Logarithmic { saturation: 100_000.0 }),
            (Source::GoogleTrends, ScalingRule::Linear { max: 100.0 }),
            (Source::Freelance, ScalingRule::Logarithmic { saturation: 5_000.0 }),
        ]);

        Self {
            rules,
            rank_range: RankRange::default(),
        }
    }
}

impl NormalizationParams {
    /// Rule used for a source when none is configured.
    pub const FALLBACK_RULE: ScalingRule = ScalingRule::Logarithmic { saturation: 10_000.0 };

    /// The rule configured for `source`, or [`Self::FALLBACK_RULE`].
    #[must_use]
    pub fn rule_for(&self, source: Source) -> ScalingRule {
        self.rules.get(&source).copied().unwrap_or(Self::FALLBACK_RULE)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (source, rule) in &self.rules {
            rule.validate().map_err(|e| format!("normalization rule for {source}: {e}"))?;
        }

        let RankRange { best, worst } = self.rank_range;
        if !(best.is_finite() && worst.is_finite() && best < worst) {
            return Err(format!("rank range must satisfy best < worst, got [{best}, {worst}]"));
        }

        Ok(())
    }
}

/// Converts raw measurements into scores.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    params: NormalizationParams,
}

impl Normalizer {
    #[must_use]
    pub const fn new(params: NormalizationParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn params(&self) -> &NormalizationParams {
        &self.params
    }

    /// Score a raw value reported by `source` in the given unit.
    ///
    /// Ranks are inverted against the configured rank range; every other unit
    /// goes through the source's scaling rule.
    #[must_use]
    pub fn normalize(&self, source: Source, raw_value: f64, unit: Unit) -> f64 {
        match unit {
            Unit::Rank => {
                let RankRange { best, worst } = self.params.rank_range;
                if !raw_value.is_finite() || best >= worst {
                    return 0.0;
                }
                let position = ScalingRule::MinMax { min: best, max: worst }.apply(raw_value.clamp(best, worst));
                clamp_score(MAX_SCORE - position)
            }
            Unit::Count | Unit::Volume => self.params.rule_for(source).apply(raw_value),
        }
    }

    #[must_use]
    pub fn normalize_metric(&self, metric: &RawMetric) -> NormalizedMetric {
        NormalizedMetric::new(
            metric.source,
            metric.label.clone(),
            self.normalize(metric.source, metric.raw_value, metric.unit),
        )
    }

    #[must_use]
    pub fn normalize_all<'a>(&self, metrics: impl IntoIterator<Item = &'a RawMetric>) -> Vec<NormalizedMetric> {
        metrics.into_iter().map(|m| self.normalize_metric(m)).collect()
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() { 0.0 } else { score.clamp(0.0, MAX_SCORE) }
}
