use crate::Result;
use crate::analytics::{AggregationWeights, NormalizationParams, TrendSettings};
use crate::cache::{CoordinatorSettings, DEFAULT_KEY_PREFIX, StorageKind};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "trendscope.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub normalization: NormalizationParams,

    #[serde(default)]
    pub weights: AggregationWeights,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub storage: StorageKind,

    /// Directory for file storage (default is the platform cache directory)
    #[serde(default)]
    pub directory: Option<Utf8PathBuf>,

    /// Remote server URL, overridden by the `REDIS_URL` environment variable
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub default_ttl: Duration,

    #[serde(default, with = "humantime_serde")]
    pub fetch_timeout: Option<Duration>,

    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    #[serde(default)]
    pub namespace_ttl: BTreeMap<String, humantime_serde::Serde<Duration>>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage: StorageKind::default(),
            directory: None,
            remote_url: None,
            key_prefix: default_key_prefix(),
            default_ttl: default_ttl(),
            fetch_timeout: None,
            max_concurrent_fetches: default_max_concurrent_fetches(),
            namespace_ttl: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    /// Settings for the cache coordinator.
    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            enabled: self.enabled,
            default_ttl: self.default_ttl,
            namespace_ttl: self
                .namespace_ttl
                .iter()
                .map(|(namespace, ttl)| (namespace.clone(), **ttl))
                .collect(),
            fetch_timeout: self.fetch_timeout,
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory of archived snapshots (default is the platform data directory)
    #[serde(default)]
    pub directory: Option<Utf8PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default = "default_z_threshold")]
    pub anomaly_z_threshold: f64,

    #[serde(default = "default_min_history")]
    pub min_history: usize,

    /// Default distance between a snapshot and its baseline
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u64,

    /// Days of history preceding a compared snapshot used for anomaly detection
    #[serde(default = "default_history_window_days")]
    pub history_window_days: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            anomaly_z_threshold: default_z_threshold(),
            min_history: default_min_history(),
            lookback_days: default_lookback_days(),
            history_window_days: default_history_window_days(),
        }
    }
}

impl AnalysisConfig {
    #[must_use]
    pub fn trend_settings(&self) -> TrendSettings {
        TrendSettings {
            z_threshold: self.anomaly_z_threshold,
            min_history: self.min_history,
            ..TrendSettings::default()
        }
    }
}

const fn default_true() -> bool {
    true
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

const fn default_ttl() -> Duration {
    Duration::from_hours(24)
}

const fn default_max_concurrent_fetches() -> usize {
    8
}

const fn default_z_threshold() -> f64 {
    2.0
}

const fn default_min_history() -> usize {
    3
}

const fn default_lookback_days() -> u64 {
    7
}

const fn default_history_window_days() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `trendscope.toml` in `base_dir` is used when present.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading trendscope configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading trendscope configuration file '{path}'")),
            }
        };

        let mut config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.fill_normalization_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Sources without a configured rule keep their built-in rule.
    fn fill_normalization_defaults(&mut self) {
        for (source, rule) in NormalizationParams::default().rules {
            _ = self.normalization.rules.entry(source).or_insert(rule);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.normalization.validate().map_err(|e| app_err!("{e}"))?;
        self.weights.validate().map_err(|e| app_err!("{e}"))?;

        if self.cache.max_concurrent_fetches == 0 {
            return Err(app_err!("cache.max_concurrent_fetches must be at least 1"));
        }

        if self.cache.fetch_timeout.is_some_and(|t| t.is_zero()) {
            return Err(app_err!("cache.fetch_timeout must be greater than zero"));
        }

        if !(self.analysis.anomaly_z_threshold.is_finite() && self.analysis.anomaly_z_threshold > 0.0) {
            return Err(app_err!(
                "analysis.anomaly_z_threshold must be a positive number, got {}",
                self.analysis.anomaly_z_threshold
            ));
        }

        if self.analysis.min_history < 2 {
            return Err(app_err!("analysis.min_history must be at least 2, got {}", self.analysis.min_history));
        }

        if self.analysis.lookback_days == 0 {
            return Err(app_err!("analysis.lookback_days must be at least 1"));
        }

        if self.analysis.history_window_days == 0 {
            return Err(app_err!("analysis.history_window_days must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{ScalingRule, Source};

    fn default_file_config() -> Config {
        let mut config: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        config.fill_normalization_defaults();
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        default_file_config().validate().unwrap();
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_file_matches_builtin_defaults() {
        let config = default_file_config();
        assert_eq!(config.normalization, NormalizationParams::default());
        assert_eq!(config.analysis.trend_settings(), TrendSettings::default());
        assert_eq!(config.cache.storage, StorageKind::File);
        assert_eq!(config.cache.key_prefix, DEFAULT_KEY_PREFIX);
    }

    #[test]
    fn test_namespace_ttl_and_timeouts() {
        let settings = default_file_config().cache.coordinator_settings();
        assert_eq!(settings.default_ttl, Duration::from_hours(24));
        assert_eq!(settings.fetch_timeout, Some(Duration::from_secs(120)));
        assert_eq!(settings.namespace_ttl.get("trends"), Some(&Duration::from_hours(7 * 24)));
        assert_eq!(settings.namespace_ttl.get("history"), Some(&Duration::from_hours(6)));
    }

    #[test]
    fn test_partial_rules_keep_builtin_rules() {
        let mut config: Config = toml::from_str(
            r#"
            [normalization.rules.github]
            rule = "linear"
            max = 50.0
            "#,
        )
        .unwrap();
        config.fill_normalization_defaults();

        assert_eq!(config.normalization.rule_for(Source::Github), ScalingRule::Linear { max: 50.0 });
        assert_eq!(
            config.normalization.rule_for(Source::Reddit),
            NormalizationParams::default().rule_for(Source::Reddit)
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        _ = toml::from_str::<Config>("[cache]\nttl = 3600\n").unwrap_err();
        _ = toml::from_str::<Config>("[server]\nname = \"x\"\n").unwrap_err();
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.cache.max_concurrent_fetches = 0;
        _ = config.validate().unwrap_err();
    }

    #[test]
    fn test_validate_z_threshold() {
        let mut config = Config::default();
        config.analysis.anomaly_z_threshold = 0.0;
        _ = config.validate().unwrap_err();
    }

    #[test]
    fn test_validate_min_history() {
        let mut config = Config::default();
        config.analysis.min_history = 1;
        _ = config.validate().unwrap_err();
    }

    #[test]
    fn test_validate_negative_weight() {
        let config = Config {
            weights: AggregationWeights::default().with(Source::Reddit, -1.0),
            ..Config::default()
        };
        _ = config.validate().unwrap_err();
    }

    #[test]
    fn test_validate_bad_rule() {
        let mut config = Config::default();
        _ = config
            .normalization
            .rules
            .insert(Source::Github, ScalingRule::Logarithmic { saturation: 0.0 });
        _ = config.validate().unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let output_path = base.join(CONFIG_FILE_NAME);
        Config::save_default(&output_path).unwrap();

        let loaded = Config::load(&base, None).unwrap();
        assert_eq!(loaded.analysis.lookback_days, 7);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let config = Config::load(&base, None).unwrap();
        assert!(config.cache.enabled);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_explicit_missing_path_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        _ = Config::load(&base, Some(&base.join("nope.toml"))).unwrap_err();
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_rejects_invalid_values() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(base.join(CONFIG_FILE_NAME), "[analysis]\nanomaly_z_threshold = -1.0\n").unwrap();
        _ = Config::load(&base, None).unwrap_err();
    }
}
