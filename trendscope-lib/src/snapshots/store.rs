use super::{ResourceUri, SnapshotArchive, TechnologyHistory};
use crate::Result;
use crate::analytics::{Snapshot, normalize_label};
use crate::cache::{CacheCoordinator, FetchError, FetchKey, FetchOrigin};
use chrono::{Days, NaiveDate};
use ohno::IntoAppError;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

const LOG_TARGET: &str = " snapshots";

/// z-score used for history anomaly dates unless configured otherwise.
const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;

/// A technology history as served at `history://technology/{name}`.
#[derive(Serialize)]
struct HistoryDocument<'a> {
    #[serde(flatten)]
    history: &'a TechnologyHistory,
    growth: f64,
    anomalies: Vec<NaiveDate>,
}

/// Snapshot access through the cache, backed by an optional durable archive.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    coordinator: Arc<CacheCoordinator>,
    archive: Option<SnapshotArchive>,
    anomaly_threshold: f64,
}

impl SnapshotStore {
    #[must_use]
    pub const fn new(coordinator: Arc<CacheCoordinator>, archive: Option<SnapshotArchive>) -> Self {
        Self {
            coordinator,
            archive,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
        }
    }

    /// Set the z-score at which a history point is reported as an anomaly.
    #[must_use]
    pub const fn with_anomaly_threshold(mut self, threshold: f64) -> Self {
        self.anomaly_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.coordinator
    }

    #[must_use]
    pub const fn archive(&self) -> Option<&SnapshotArchive> {
        self.archive.as_ref()
    }

    /// Load the snapshot for `date` from the cache, falling back to the archive.
    ///
    /// A cache failure is reported as [`FetchError::StorageUnavailable`] rather than as "no data".
    pub async fn load(&self, date: NaiveDate) -> Result<Option<Snapshot>, FetchError> {
        if let Some(snapshot) = self.coordinator.lookup::<Snapshot>(&FetchKey::snapshot(date)).await? {
            return Ok(Some(snapshot));
        }

        match &self.archive {
            Some(archive) => archive.load(date).map_err(FetchError::storage),
            None => Ok(None),
        }
    }

    /// Cache and archive a snapshot.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let key = FetchKey::snapshot(snapshot.date);
        self.coordinator
            .store(&key, snapshot, self.coordinator.ttl_for(&key))
            .await
            .into_app_err_with(|| format!("caching snapshot for {}", snapshot.date))?;
        self.archive_snapshot(snapshot)?;
        self.forget_histories(snapshot).await;
        Ok(())
    }

    /// Return the snapshot for `date`, building it with `build` at most once across
    /// concurrent callers. Freshly built snapshots are also archived.
    pub async fn get_or_build<F, Fut>(&self, date: NaiveDate, build: F) -> Result<Snapshot, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Snapshot>>,
    {
        let key = FetchKey::snapshot(date);
        let fetched = self
            .coordinator
            .get_or_fetch_detailed(&key, self.coordinator.ttl_for(&key), build)
            .await?;

        if matches!(fetched.origin, FetchOrigin::Producer { .. }) {
            if let Err(e) = self.archive_snapshot(&fetched.value) {
                log::warn!(target: LOG_TARGET, "Unable to archive snapshot for {date}: {e:#}");
            }
            self.forget_histories(&fetched.value).await;
        }

        Ok(fetched.value)
    }

    /// Drop cached histories of every technology in `snapshot`, so the next read sees it.
    async fn forget_histories(&self, snapshot: &Snapshot) {
        for label in snapshot.labels() {
            // labels that cannot form a key never had a cached history
            let Ok(key) = FetchKey::history(label) else {
                continue;
            };
            if let Err(e) = self.coordinator.delete(&key).await {
                log::warn!(target: LOG_TARGET, "Unable to drop cached history for '{label}': {e:#}");
            }
        }
    }

    fn archive_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        match &self.archive {
            Some(archive) => archive.save(snapshot),
            None => Ok(()),
        }
    }

    /// Snapshots for the `days` dates before `end` (exclusive), oldest first. Missing dates are skipped.
    pub async fn window(&self, end: NaiveDate, days: u64) -> Result<Vec<Snapshot>, FetchError> {
        let mut snapshots = Vec::new();
        for offset in (1..=days).rev() {
            let Some(date) = end.checked_sub_days(Days::new(offset)) else {
                continue;
            };
            if let Some(snapshot) = self.load(date).await? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    /// History of a technology from the cache, then the archive.
    pub async fn history(&self, technology: &str) -> Result<Option<TechnologyHistory>> {
        let name = normalize_label(technology);
        let key = FetchKey::history(&name)?;

        match self.coordinator.lookup::<TechnologyHistory>(&key).await {
            Ok(Some(history)) => return Ok(Some(history)),
            Ok(None) => {}
            Err(e) => log::warn!(target: LOG_TARGET, "Cached history for '{name}' unavailable: {e:#}"),
        }

        let Some(archive) = &self.archive else {
            return Ok(None);
        };

        let history = archive.technology_history(&name)?;
        if history.is_empty() {
            return Ok(None);
        }

        if let Err(e) = self.coordinator.store(&key, &history, self.coordinator.ttl_for(&key)).await {
            log::warn!(target: LOG_TARGET, "Unable to cache history for '{name}': {e:#}");
        }
        Ok(Some(history))
    }

    /// Resolve a resource address to its JSON document.
    ///
    /// Absent snapshots resolve to `{"error": "not_found", "key": ...}` and
    /// absent histories to `{"technology": ..., "history": [], "note": "no data"}`.
    /// Histories found in the cache or archive also carry their first-to-last
    /// `growth` and the dates of anomalous `points`.
    pub async fn resolve(&self, uri: &ResourceUri) -> Result<serde_json::Value> {
        match uri {
            ResourceUri::Trends(date) => {
                let key = FetchKey::snapshot(*date);
                match self.load(*date).await? {
                    Some(snapshot) => serde_json::to_value(&snapshot).into_app_err("encoding snapshot"),
                    None => Ok(json!({"error": "not_found", "key": key.to_string()})),
                }
            }

            ResourceUri::TechnologyHistory(name) => {
                if let Some(history) = self.history(name).await? {
                    let document = HistoryDocument {
                        growth: history.growth(),
                        anomalies: history.anomalies(self.anomaly_threshold),
                        history: &history,
                    };
                    return serde_json::to_value(&document).into_app_err("encoding technology history");
                }

                if let Some(legacy) = self.archive.as_ref().and_then(|a| a.legacy_history(name)) {
                    return Ok(legacy);
                }

                Ok(json!({"technology": name, "history": [], "note": "no data"}))
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::analytics::{Aggregator, NormalizedMetric, Source};
    use crate::cache::{CoordinatorSettings, MemoryStorage};
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn snapshot(day: u32, python: f64) -> Snapshot {
        Aggregator::default().snapshot(date(day), &[NormalizedMetric::new(Source::Reddit, "python", python)])
    }

    fn store(archive: Option<SnapshotArchive>) -> SnapshotStore {
        let coordinator = Arc::new(CacheCoordinator::new(Arc::new(MemoryStorage::new()), CoordinatorSettings::default()));
        SnapshotStore::new(coordinator, archive)
    }

    #[tokio::test]
    async fn save_then_resolve() {
        let store = store(None);
        store.save(&snapshot(1, 42.0)).await.unwrap();

        let doc = store.resolve(&"cache://trends/2024-05-01".parse().unwrap()).await.unwrap();
        assert_eq!(doc["date"], "2024-05-01");
        assert_eq!(doc["signals"][0]["label"], "python");
    }

    #[tokio::test]
    async fn missing_snapshot_resolves_to_not_found() {
        let doc = store(None).resolve(&"cache://trends/2024-05-09".parse().unwrap()).await.unwrap();
        assert_eq!(doc, json!({"error": "not_found", "key": "trends:2024-05-09"}));
    }

    #[tokio::test]
    async fn missing_history_resolves_to_no_data() {
        let doc = store(None).resolve(&"history://technology/zig".parse().unwrap()).await.unwrap();
        assert_eq!(doc, json!({"technology": "zig", "history": [], "note": "no data"}));
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn archive_backs_loads_and_histories() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(tmp.path()).unwrap();
        archive.save(&snapshot(1, 30.0)).unwrap();
        archive.save(&snapshot(2, 45.0)).unwrap();
        let store = store(Some(archive));

        assert_eq!(store.load(date(1)).await.unwrap(), Some(snapshot(1, 30.0)));

        let history = store.history("Python").await.unwrap().unwrap();
        assert_eq!(history.scores(), vec![30.0, 45.0]);

        let cached = store
            .coordinator()
            .lookup::<TechnologyHistory>(&FetchKey::history("python").unwrap())
            .await
            .unwrap();
        assert_eq!(cached, Some(history));
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn new_snapshots_refresh_cached_histories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(Some(SnapshotArchive::new(tmp.path()).unwrap()));

        for (day, score) in [(1, 10.0), (2, 20.0)] {
            _ = store.get_or_build(date(day), || async move { Ok(snapshot(day, score)) }).await.unwrap();
        }
        let before = store.history("python").await.unwrap().unwrap();
        assert_eq!(before.scores(), vec![10.0, 20.0]);

        _ = store.get_or_build(date(3), || async { Ok(snapshot(3, 30.0)) }).await.unwrap();
        let after = store.history("python").await.unwrap().unwrap();
        assert_eq!(after.scores(), vec![10.0, 20.0, 30.0]);

        store.save(&snapshot(4, 40.0)).await.unwrap();
        let doc = store.resolve(&"history://technology/python".parse().unwrap()).await.unwrap();
        assert_eq!(doc["points"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn history_document_reports_growth_and_anomalies() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(tmp.path()).unwrap();
        for day in 1..=9 {
            archive.save(&snapshot(day, 10.0)).unwrap();
        }
        archive.save(&snapshot(10, 100.0)).unwrap();

        let doc = store(Some(archive))
            .with_anomaly_threshold(2.0)
            .resolve(&"history://technology/python".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(doc["technology"], "python");
        assert_eq!(doc["points"].as_array().unwrap().len(), 10);
        assert_eq!(doc["growth"], 9.0);
        assert_eq!(doc["anomalies"], json!(["2024-05-10"]));
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn legacy_history_file_is_the_last_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = SnapshotArchive::new(tmp.path()).unwrap();
        std::fs::write(archive.legacy_history_path("cobol"), r#"{"technology":"cobol","history":[{"score":1}]}"#).unwrap();

        let doc = store(Some(archive))
            .resolve(&"history://technology/cobol".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(doc["history"][0]["score"], 1);
    }

    #[tokio::test]
    async fn window_skips_missing_dates() {
        let store = store(None);
        store.save(&snapshot(1, 10.0)).await.unwrap();
        store.save(&snapshot(3, 30.0)).await.unwrap();

        let window = store.window(date(5), 4).await.unwrap();
        let dates: Vec<_> = window.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![date(1), date(3)]);
    }

    #[tokio::test]
    async fn get_or_build_runs_once() {
        let store = store(None);
        let builds = AtomicUsize::new(0);

        for _ in 0..2 {
            let snapshot = store
                .get_or_build(date(1), || async {
                    _ = builds.fetch_add(1, Ordering::SeqCst);
                    Ok(snapshot(1, 10.0))
                })
                .await
                .unwrap();
            assert_eq!(snapshot.date, date(1));
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
