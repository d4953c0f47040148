//! Command-line interface and orchestration for trendscope
//!
//! This module implements the CLI commands and wires the cache, the analytics
//! pipeline, and the snapshot store together. It handles argument parsing,
//! configuration management, and the high-level workflows.
//!
//! ## Commands
//!
//! - **aggregate**: Feed raw measurement dumps through the cache coordinator,
//!   normalize and merge them, and store the resulting snapshot
//! - **compare**: Compute growth rates and anomalies between two snapshots
//! - **resource**: Resolve `cache://` and `history://` addresses to JSON
//! - **invalidate**: Remove cached entries by key pattern
//! - **init**: Generate a default configuration file
//!
//! The `common` module provides the shared setup: logging, configuration
//! loading, and construction of the storage backend, coordinator, and archive.

mod aggregate;
mod common;
mod compare;
mod config;
mod host;
mod init;
mod invalidate;
mod resource;
mod run;

pub use aggregate::{AggregateArgs, process_aggregate};
pub use common::{ColorMode, CommonArgs, LogLevel, REDIS_URL_ENV};
pub use compare::{CompareArgs, process_compare};
pub use config::{AnalysisConfig, ArchiveConfig, CONFIG_FILE_NAME, CacheConfig, Config, DEFAULT_CONFIG_TOML};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use invalidate::{InvalidateArgs, invalidate_cache};
pub use resource::{ResourceArgs, read_resource};
pub use run::run;
