#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for trendscope
//!
//! This library collects technology popularity measurements from slow,
//! rate-limited sources, caches them behind a deduplicating TTL cache, and
//! turns them into ranked daily snapshots with trend signals.
//!
//! # Module Organization
//!
//! - [`cache`]: TTL storage backends and the fetch coordinator
//! - [`analytics`]: Normalization, aggregation, and trend analysis
//! - [`snapshots`]: Snapshot addressing, archival, and technology history
//! - [`sources`]: Producers that feed raw metrics through the coordinator
//! - [`commands`]: Command-line interface and orchestration
//! - [`reports`]: Console and JSON output

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod analytics;
pub mod cache;
pub mod commands;
pub mod reports;
pub mod snapshots;
pub mod sources;

pub use crate::commands::{Host, run};
