//! End-to-end tests from raw source measurements to trend deltas.

use async_trait::async_trait;
use chrono::NaiveDate;
use core::sync::atomic::{AtomicUsize, Ordering};
use ohno::app_err;
use std::collections::BTreeMap;
use std::sync::Arc;
use trendscope_lib::Result;
use trendscope_lib::analytics::{
    Aggregator, NormalizationParams, Normalizer, RankRange, RawMetric, ScalingRule, Source, TrendAnalyzer, TrendSettings,
};
use trendscope_lib::cache::{CacheCoordinator, CoordinatorSettings, FetchKey, MemoryStorage};
use trendscope_lib::snapshots::{ResourceUri, SnapshotArchive, SnapshotStore};
use trendscope_lib::sources::{Collector, MetricSource};

/// A source that replays fixed measurements per date.
#[derive(Debug)]
struct ReplaySource {
    source: Source,
    by_date: BTreeMap<NaiveDate, Vec<(&'static str, f64)>>,
    calls: AtomicUsize,
}

impl ReplaySource {
    fn new(source: Source) -> Self {
        Self {
            source,
            by_date: BTreeMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn on(mut self, date: NaiveDate, values: &[(&'static str, f64)]) -> Self {
        _ = self.by_date.insert(date, values.to_vec());
        self
    }
}

#[async_trait]
impl MetricSource for ReplaySource {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<RawMetric>> {
        _ = self.calls.fetch_add(1, Ordering::SeqCst);
        let values = self
            .by_date
            .get(&date)
            .ok_or_else(|| app_err!("{} has no data for {date}", self.source))?;
        Ok(values.iter().map(|(label, value)| RawMetric::count(self.source, *label, *value)).collect())
    }
}

fn day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

fn linear_normalizer() -> Normalizer {
    Normalizer::new(NormalizationParams {
        rules: BTreeMap::from([
            (Source::Reddit, ScalingRule::Linear { max: 100.0 }),
            (Source::Github, ScalingRule::Linear { max: 100.0 }),
        ]),
        rank_range: RankRange::default(),
    })
}

fn coordinator() -> Arc<CacheCoordinator> {
    Arc::new(CacheCoordinator::new(Arc::new(MemoryStorage::new()), CoordinatorSettings::default()))
}

async fn build(store: &SnapshotStore, sources: Vec<Arc<dyn MetricSource>>, date: NaiveDate) -> trendscope_lib::analytics::Snapshot {
    let collector = Collector::new(Arc::clone(store.coordinator()), sources);
    let normalizer = linear_normalizer();
    let aggregator = Aggregator::default();
    store
        .get_or_build(date, || async move {
            let (snapshot, _failures) = collector.build_snapshot(date, &normalizer, &aggregator).await?;
            Ok(snapshot)
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn sources_merge_into_one_signal() {
    let reddit = Arc::new(ReplaySource::new(Source::Reddit).on(day(1), &[("Python", 62.0), ("rust", 30.0)]));
    let github = Arc::new(ReplaySource::new(Source::Github).on(day(1), &[("python", 71.0)]));
    let store = SnapshotStore::new(coordinator(), None);

    let sources: Vec<Arc<dyn MetricSource>> = vec![Arc::clone(&reddit) as Arc<dyn MetricSource>, Arc::clone(&github) as Arc<dyn MetricSource>];
    let snapshot = build(&store, sources.clone(), day(1)).await;

    let python = snapshot.signal("python").unwrap();
    assert!((python.combined_score - 66.5).abs() < 1e-9);
    assert_eq!(python.coverage(), 2);
    assert_eq!(snapshot.signals[0].label, "python");
    assert_eq!(snapshot.score("rust"), Some(30.0));

    // a second build is served from the cached snapshot
    let again = build(&store, sources, day(1)).await;
    assert_eq!(again, snapshot);
    assert_eq!(reddit.calls.load(Ordering::SeqCst), 1);
    assert_eq!(github.calls.load(Ordering::SeqCst), 1);

    let document = store.resolve(&"cache://trends/2024-05-01".parse::<ResourceUri>().unwrap()).await.unwrap();
    assert_eq!(document["signals"][0]["label"], "python");
}

#[tokio::test]
async fn calibrated_counts_merge_into_one_signal() {
    // rules calibrated so that 500 reddit mentions score 62 and 30 github repositories score 71
    let normalizer = Normalizer::new(NormalizationParams {
        rules: BTreeMap::from([
            (Source::Reddit, ScalingRule::Linear { max: 500.0 / 0.62 }),
            (Source::Github, ScalingRule::Linear { max: 30.0 / 0.71 }),
        ]),
        rank_range: RankRange::default(),
    });
    let reddit = Arc::new(ReplaySource::new(Source::Reddit).on(day(1), &[("python", 500.0)]));
    let github = Arc::new(ReplaySource::new(Source::Github).on(day(1), &[("python", 30.0)]));
    let collector = Collector::new(coordinator(), vec![reddit as Arc<dyn MetricSource>, github as Arc<dyn MetricSource>]);

    let (snapshot, failures) = collector.build_snapshot(day(1), &normalizer, &Aggregator::default()).await.unwrap();
    assert!(failures.is_empty());
    assert_eq!(snapshot.len(), 1);

    let python = snapshot.signal("python").unwrap();
    assert!((python.per_source_scores[&Source::Reddit] - 62.0).abs() < 1e-9);
    assert!((python.per_source_scores[&Source::Github] - 71.0).abs() < 1e-9);
    assert!((python.combined_score - 66.5).abs() < 1e-9);
    assert_eq!(python.contributing_sources.iter().copied().collect::<Vec<_>>(), vec![Source::Reddit, Source::Github]);
}

#[tokio::test]
async fn failing_source_yields_partial_snapshot_and_is_retried() {
    let reddit = Arc::new(ReplaySource::new(Source::Reddit).on(day(1), &[("python", 62.0)]));
    let github = Arc::new(ReplaySource::new(Source::Github));
    let coordinator = coordinator();
    let collector = Collector::new(
        Arc::clone(&coordinator),
        vec![Arc::clone(&reddit) as Arc<dyn MetricSource>, Arc::clone(&github) as Arc<dyn MetricSource>],
    );

    let (snapshot, failures) = collector
        .build_snapshot(day(1), &linear_normalizer(), &Aggregator::default())
        .await
        .unwrap();
    assert_eq!(snapshot.score("python"), Some(62.0));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source, Source::Github);
    assert!(failures[0].error.is_producer_failure());

    // the failure was not cached, the success was
    let github_key = FetchKey::builder(Source::Github.namespace()).date(day(1)).build().unwrap();
    assert!(coordinator.lookup::<Vec<RawMetric>>(&github_key).await.unwrap().is_none());

    let collection = collector.collect(day(1)).await;
    assert!(collection.is_partial());
    assert_eq!(reddit.calls.load(Ordering::SeqCst), 1);
    assert_eq!(github.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn no_source_means_no_snapshot() {
    let github = Arc::new(ReplaySource::new(Source::Github));
    let store = SnapshotStore::new(coordinator(), None);
    let collector = Collector::new(Arc::clone(store.coordinator()), vec![Arc::clone(&github) as Arc<dyn MetricSource>]);
    let normalizer = linear_normalizer();
    let aggregator = Aggregator::default();

    let error = store
        .get_or_build(day(1), || async move {
            let (snapshot, _failures) = collector.build_snapshot(day(1), &normalizer, &aggregator).await?;
            Ok(snapshot)
        })
        .await
        .unwrap_err();
    assert!(error.is_producer_failure());
    assert!(store.load(day(1)).await.unwrap().is_none());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn archived_snapshots_drive_trends_and_history() {
    let tmp = tempfile::tempdir().unwrap();
    let reddit = Arc::new(
        ReplaySource::new(Source::Reddit)
            .on(day(1), &[("python", 40.0), ("perl", 10.0)])
            .on(day(2), &[("python", 42.0), ("perl", 10.0)])
            .on(day(3), &[("python", 41.0), ("perl", 9.0)])
            .on(day(8), &[("python", 50.0), ("zig", 5.0)]),
    );
    let store = SnapshotStore::new(coordinator(), Some(SnapshotArchive::new(tmp.path()).unwrap()));

    for date in [day(1), day(2), day(3), day(8)] {
        _ = build(&store, vec![Arc::clone(&reddit) as Arc<dyn MetricSource>], date).await;
    }

    // a fresh cache still finds everything in the archive
    let reopened = SnapshotStore::new(coordinator(), Some(SnapshotArchive::new(tmp.path()).unwrap()));
    let current = reopened.load(day(8)).await.unwrap().unwrap();
    let baseline = reopened.load(day(1)).await.unwrap().unwrap();
    let window = reopened.window(day(8), 30).await.unwrap();
    assert_eq!(window.iter().map(|s| s.date).collect::<Vec<_>>(), vec![day(1), day(2), day(3)]);

    let deltas = TrendAnalyzer::new(TrendSettings::default()).compare_with_history(&current, &baseline, &window);
    let python = deltas.iter().find(|d| d.label == "python").unwrap();
    assert!((python.growth_rate - 0.25).abs() < 1e-9);
    assert!(python.is_anomaly);

    let zig = deltas.iter().find(|d| d.label == "zig").unwrap();
    assert!(zig.is_new_entrant);

    let perl = deltas.iter().find(|d| d.label == "perl").unwrap();
    assert!(perl.is_dropout);

    let history = reopened.history("Python").await.unwrap().unwrap();
    assert_eq!(history.technology, "python");
    assert_eq!(history.points.len(), 4);
    assert_eq!(history.scores(), vec![40.0, 42.0, 41.0, 50.0]);
}
