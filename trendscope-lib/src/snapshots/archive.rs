//! Durable historical store of snapshots.
//!
//! Unlike the cache, the archive never expires anything. It holds one
//! `{date}.json` file per snapshot and is where technology histories and trend
//! baselines come from once cache entries have aged out.

use super::TechnologyHistory;
use crate::Result;
use crate::analytics::Snapshot;
use chrono::NaiveDate;
use ohno::IntoAppError;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   archive";

/// A directory of snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotArchive {
    dir: PathBuf,
}

impl SnapshotArchive {
    /// Open an archive directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).into_app_err_with(|| format!("creating archive directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Path of a hand-maintained history file for `technology`.
    #[must_use]
    pub fn legacy_history_path(&self, technology: &str) -> PathBuf {
        self.dir.join(format!("history_{technology}.json"))
    }

    /// Write a snapshot, replacing any earlier one for the same date.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.snapshot_path(snapshot.date);
        let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));

        let result = write_json(&tmp_path, snapshot)
            .and_then(|()| fs::rename(&tmp_path, &path).into_app_err_with(|| format!("replacing archive file '{}'", path.display())));
        if result.is_err() {
            _ = fs::remove_file(&tmp_path);
        }
        result?;

        log::debug!(target: LOG_TARGET, "Archived snapshot for {} ({} signals)", snapshot.date, snapshot.len());
        Ok(())
    }

    /// Load the snapshot for `date`, if archived.
    pub fn load(&self, date: NaiveDate) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(date);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).into_app_err_with(|| format!("opening archive file '{}'", path.display())),
        };

        let snapshot = serde_json::from_reader(BufReader::new(file))
            .into_app_err_with(|| format!("parsing archive file '{}'", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Dates of all archived snapshots, oldest first.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).into_app_err_with(|| format!("listing archive directory '{}'", self.dir.display())),
        };

        let mut dates: Vec<NaiveDate> = read_dir
            .filter_map(core::result::Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name();
                let stem = name.to_str()?.strip_suffix(".json")?;
                NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
            })
            .collect();
        dates.sort_unstable();
        Ok(dates)
    }

    /// Archived snapshots with `from <= date <= to`, oldest first.
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn load_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        for date in self.dates()?.into_iter().filter(|d| (from..=to).contains(d)) {
            match self.load(date) {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {}
                Err(e) => log::warn!(target: LOG_TARGET, "Skipping archived snapshot for {date}: {e:#}"),
            }
        }
        Ok(snapshots)
    }

    /// History of `technology` across every archived snapshot.
    pub fn technology_history(&self, technology: &str) -> Result<TechnologyHistory> {
        let dates = self.dates()?;
        let snapshots = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => self.load_range(*first, *last)?,
            _ => Vec::new(),
        };
        Ok(TechnologyHistory::from_snapshots(technology, &snapshots))
    }

    /// Contents of a hand-maintained `history_{name}.json` file, if present and readable.
    #[must_use]
    pub fn legacy_history(&self, technology: &str) -> Option<serde_json::Value> {
        let path = self.legacy_history_path(technology);
        let file = File::open(&path).ok()?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!(target: LOG_TARGET, "Failed reading history file '{}': {e:#}", path.display());
                None
            }
        }
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).into_app_err_with(|| format!("creating archive file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).into_app_err_with(|| format!("writing archive file '{}'", path.display()))?;
    writer
        .flush()
        .into_app_err_with(|| format!("flushing archive file '{}'", path.display()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::analytics::{Aggregator, NormalizedMetric, Source};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn snapshot(day: u32, python: f64) -> Snapshot {
        Aggregator::default().snapshot(
            date(day),
            &[
                NormalizedMetric::new(Source::Reddit, "python", python),
                NormalizedMetric::new(Source::Github, "rust", 40.0),
            ],
        )
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(tmp.path()).unwrap();

        archive.save(&snapshot(1, 50.0)).unwrap();
        assert_eq!(archive.load(date(1)).unwrap(), Some(snapshot(1, 50.0)));
        assert_eq!(archive.load(date(2)).unwrap(), None);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn range_and_history() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(tmp.path()).unwrap();
        for (day, score) in [(3, 70.0), (1, 50.0), (2, 60.0)] {
            archive.save(&snapshot(day, score)).unwrap();
        }
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(archive.dates().unwrap(), vec![date(1), date(2), date(3)]);
        assert_eq!(archive.load_range(date(2), date(3)).unwrap().len(), 2);

        let history = archive.technology_history("Python").unwrap();
        assert_eq!(history.scores(), vec![50.0, 60.0, 70.0]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn corrupt_snapshots_are_skipped_in_ranges() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(tmp.path()).unwrap();
        archive.save(&snapshot(1, 50.0)).unwrap();
        fs::write(tmp.path().join("2024-05-02.json"), "{").unwrap();

        _ = archive.load(date(2)).unwrap_err();
        assert_eq!(archive.load_range(date(1), date(2)).unwrap().len(), 1);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn legacy_history_files() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(tmp.path()).unwrap();

        assert!(archive.legacy_history("python").is_none());
        fs::write(archive.legacy_history_path("python"), r#"{"technology":"python","history":[1,2]}"#).unwrap();
        assert_eq!(archive.legacy_history("python").unwrap()["history"], serde_json::json!([1, 2]));
    }
}
