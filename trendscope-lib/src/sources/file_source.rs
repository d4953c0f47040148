//! Raw measurements read from JSON dumps.
//!
//! The network fetchers for the individual sources live outside this crate.
//! They drop their output into a dump directory, either as `{dir}/{date}/{source}.json`
//! or as an undated `{dir}/{source}.json`, and a [`FileSource`] feeds those
//! files through the same path any other producer would take.

use super::MetricSource;
use crate::Result;
use crate::analytics::{RawMetric, Source, Unit};
use crate::cache::{FetchError, FetchKey};
use async_trait::async_trait;
use chrono::NaiveDate;
use ohno::{IntoAppError, app_err};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

const LOG_TARGET: &str = "   sources";

/// One line of a dump file. The source is implied by the file name.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DumpRecord {
    label: String,

    #[serde(alias = "value")]
    raw_value: f64,

    #[serde(default = "default_unit")]
    unit: Unit,
}

const fn default_unit() -> Unit {
    Unit::Count
}

/// Reads one source's measurements from a dump directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    source: Source,
    dir: PathBuf,
}

impl FileSource {
    #[must_use]
    pub fn new(source: Source, dir: impl Into<PathBuf>) -> Self {
        Self { source, dir: dir.into() }
    }

    /// A file source for every [`Source`] that has a dump for `date` in `dir`.
    #[must_use]
    pub fn discover(dir: &Path, date: NaiveDate) -> Vec<Self> {
        Source::iter()
            .map(|source| Self::new(source, dir))
            .filter(|source| source.dump_path(date).is_some())
            .collect()
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The dump file used for `date`, preferring a dated one.
    #[must_use]
    pub fn dump_path(&self, date: NaiveDate) -> Option<PathBuf> {
        let file_name = format!("{}.json", self.source);
        let dated = self.dir.join(date.format("%Y-%m-%d").to_string()).join(&file_name);
        if dated.is_file() {
            return Some(dated);
        }

        let undated = self.dir.join(file_name);
        undated.is_file().then_some(undated)
    }
}

#[async_trait]
impl MetricSource for FileSource {
    fn source(&self) -> Source {
        self.source
    }

    fn fetch_key(&self, date: NaiveDate) -> Result<FetchKey, FetchError> {
        FetchKey::builder(self.source.namespace())
            .date(date)
            .param("dump", self.dir.display().to_string())
            .build()
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<RawMetric>> {
        let path = self
            .dump_path(date)
            .ok_or_else(|| app_err!("no {} dump for {date} in '{}'", self.source, self.dir.display()))?;

        let source = self.source;
        let records = tokio::task::spawn_blocking(move || read_dump(&path))
            .await
            .into_app_err("dump reader task failed")??;

        log::debug!(target: LOG_TARGET, "Read {} {source} measurements for {date}", records.len());
        Ok(records
            .into_iter()
            .map(|record| RawMetric::new(source, record.label, record.raw_value, record.unit))
            .collect())
    }
}

fn read_dump(path: &Path) -> Result<Vec<DumpRecord>> {
    let text = std::fs::read_to_string(path).into_app_err_with(|| format!("reading dump '{}'", path.display()))?;
    serde_json::from_str(&text).into_app_err_with(|| format!("parsing dump '{}'", path.display()))
}
