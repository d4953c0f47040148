//! Setup shared by every command that touches the cache or the archive.

use super::Host;
use super::config::{CacheConfig, Config};
use crate::Result;
use crate::analytics::{Aggregator, Normalizer, TrendAnalyzer};
use crate::cache::{CacheCoordinator, FileStorage, MemoryStorage, RemoteStorage, StorageBackend, StorageKind};
use crate::snapshots::{SnapshotArchive, SnapshotStore};
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use directories::BaseDirs;
use ohno::{IntoAppError, app_err};
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "  commands";

/// Environment variable that overrides `cache.remote_url`
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Color mode configuration for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Always use colors
    Always,

    /// Never use colors
    Never,

    /// Use colors if the output is a terminal, otherwise don't use colors
    Auto,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by the commands that use the cache
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to configuration file (default is `trendscope.toml` in the current directory)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Storage medium for cached data, overriding the configuration
    #[arg(long, value_name = "KIND")]
    pub storage: Option<StorageKind>,

    /// Directory used by file storage, overriding the configuration
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Directory of archived snapshots, overriding the configuration
    #[arg(long, value_name = "PATH")]
    pub archive_dir: Option<Utf8PathBuf>,

    /// Bypass cached data for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

pub struct Common<'a, H: Host> {
    pub config: Config,
    pub coordinator: Arc<CacheCoordinator>,
    pub store: SnapshotStore,
    host: &'a mut H,
    color: ColorMode,
}

impl<H: Host> core::fmt::Debug for Common<'_, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Common")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .field("store", &self.store)
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

impl<'a, H: Host> Common<'a, H> {
    /// Initialize logging, load configuration, and open the cache and archive
    pub fn new(host: &'a mut H, args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let base_dir = std::env::current_dir().into_app_err("determining the current directory")?;
        let base_dir = Utf8PathBuf::try_from(base_dir).into_app_err("the current directory is not valid UTF-8")?;
        let mut config = Config::load(&base_dir, args.config.as_ref())?;

        if let Some(storage) = args.storage {
            config.cache.storage = storage;
        }
        if let Some(dir) = &args.cache_dir {
            config.cache.directory = Some(dir.clone());
        }
        if let Some(dir) = &args.archive_dir {
            config.archive.directory = Some(dir.clone());
        }
        if args.no_cache {
            config.cache.enabled = false;
        }

        let storage = open_storage(&config.cache)?;
        log::info!(target: LOG_TARGET, "Using {} cache storage", storage.kind());
        let coordinator = Arc::new(CacheCoordinator::new(storage, config.cache.coordinator_settings()));

        let archive = if config.archive.enabled {
            let dir = match &config.archive.directory {
                Some(dir) => dir.clone().into_std_path_buf(),
                None => default_dir(|dirs| dirs.data_dir().join("trendscope").join("snapshots"))?,
            };
            Some(SnapshotArchive::new(dir)?)
        } else {
            None
        };

        let store = SnapshotStore::new(Arc::clone(&coordinator), archive).with_anomaly_threshold(config.analysis.anomaly_z_threshold);

        Ok(Self {
            config,
            coordinator,
            store,
            host,
            color: args.color,
        })
    }

    pub fn host(&mut self) -> &mut H {
        self.host
    }

    #[must_use]
    pub fn use_colors(&self) -> bool {
        match self.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                use std::io::{IsTerminal, stdout};
                stdout().is_terminal()
            }
        }
    }

    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.config.normalization.clone())
    }

    #[must_use]
    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.config.weights.clone())
    }

    #[must_use]
    pub fn analyzer(&self) -> TrendAnalyzer {
        TrendAnalyzer::new(self.config.analysis.trend_settings())
    }

    /// Log how the cache performed during this run
    pub fn log_stats(&self) {
        log::info!(target: LOG_TARGET, "Cache activity: {}", self.coordinator.stats());
    }
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // a second initialization in the same process keeps the first logger
    _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}

fn open_storage(cache: &CacheConfig) -> Result<Arc<dyn StorageBackend>> {
    // a disabled cache must leave the configured storage untouched
    if !cache.enabled {
        return Ok(Arc::new(MemoryStorage::new()));
    }

    match cache.storage {
        StorageKind::File => {
            let dir = match &cache.directory {
                Some(dir) => dir.clone().into_std_path_buf(),
                None => default_dir(|dirs| dirs.cache_dir().join("trendscope"))?,
            };
            Ok(Arc::new(FileStorage::new(dir)?))
        }

        StorageKind::Remote => {
            let url = std::env::var(REDIS_URL_ENV)
                .ok()
                .filter(|url| !url.is_empty())
                .or_else(|| cache.remote_url.clone())
                .ok_or_else(|| app_err!("remote cache storage needs `cache.remote_url` or the {REDIS_URL_ENV} environment variable"))?;
            Ok(Arc::new(RemoteStorage::new(&url)?.with_key_prefix(cache.key_prefix.clone())))
        }

        StorageKind::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}

fn default_dir(pick: impl FnOnce(&BaseDirs) -> PathBuf) -> Result<PathBuf> {
    let dirs = BaseDirs::new().into_app_err("could not determine the platform directories")?;
    Ok(pick(&dirs))
}
