//! Report generation for snapshots and trends
//!
//! Two generators are provided, each with a snapshot and a trends entry point:
//! - **Console**: Aligned terminal tables with optional ANSI colors
//! - **JSON**: Machine-readable structured data
//!
//! Formatting shared by both lives in the `common` module.

mod common;
mod console;
mod json;

pub use console::{generate_snapshot as generate_snapshot_console, generate_trends as generate_trends_console};
pub use json::{generate_snapshot as generate_snapshot_json, generate_trends as generate_trends_json};
