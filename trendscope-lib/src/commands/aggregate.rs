use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::analytics::Snapshot;
use crate::cache::{FetchKey, SNAPSHOT_NAMESPACE};
use crate::reports::{generate_snapshot_console, generate_snapshot_json};
use crate::sources::{Collector, FileSource, MetricSource, SourceFailure};
use camino::Utf8PathBuf;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use ohno::{IntoAppError, bail};
use std::fs;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = " aggregate";

#[derive(Parser, Debug)]
pub struct AggregateArgs {
    /// Directory of raw measurement dumps (`{source}.json` or `{date}/{source}.json`)
    #[arg(long, value_name = "PATH")]
    pub input: Utf8PathBuf,

    /// Date of the snapshot (default is today, UTC)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Rebuild the snapshot even if one is already cached
    #[arg(long)]
    pub refresh: bool,

    /// Number of technologies to show on the console
    #[arg(long, value_name = "N", default_value_t = 20)]
    pub top: usize,

    /// Write the snapshot to a JSON file
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_aggregate<H: Host>(host: &mut H, args: &AggregateArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common)?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());

    let sources = FileSource::discover(args.input.as_std_path(), date);
    if sources.is_empty() {
        bail!("no measurement dumps for {date} found in '{}'", args.input);
    }

    if args.refresh {
        let removed = common.coordinator.delete(&FetchKey::snapshot(date)).await?;
        for source in &sources {
            _ = common.coordinator.delete(&source.fetch_key(date)?).await?;
        }
        log::info!(target: LOG_TARGET, "Refreshing {SNAPSHOT_NAMESPACE} for {date} (cached snapshot removed: {removed})");
    }

    let collector = Collector::new(
        Arc::clone(&common.coordinator),
        sources.into_iter().map(|s| Arc::new(s) as Arc<dyn MetricSource>).collect(),
    );

    let normalizer = common.normalizer();
    let aggregator = common.aggregator();
    let mut failures: Vec<SourceFailure> = Vec::new();
    let failures_slot = &mut failures;

    let snapshot = common
        .store
        .get_or_build(date, move || async move {
            let (snapshot, failures) = collector.build_snapshot(date, &normalizer, &aggregator).await?;
            *failures_slot = failures;
            Ok(snapshot)
        })
        .await?;

    if !failures.is_empty() {
        let _ = writeln!(common.host().error(), "Partial data for {date}, {} source(s) unavailable", failures.len());
        for failure in &failures {
            let _ = writeln!(common.host().error(), "  {}: {}", failure.source, failure.error);
        }
    }

    report(&mut common, &snapshot, args)?;
    common.log_stats();
    Ok(())
}

fn report<H: Host>(common: &mut Common<'_, H>, snapshot: &Snapshot, args: &AggregateArgs) -> Result<()> {
    if let Some(path) = &args.json {
        let mut json = String::new();
        generate_snapshot_json(snapshot, &mut json)?;
        fs::write(path, json).into_app_err_with(|| format!("writing snapshot to '{path}'"))?;
    }

    let mut console = String::new();
    generate_snapshot_console(snapshot, args.top, common.use_colors(), &mut console)?;
    let _ = write!(common.host().output(), "{console}");
    Ok(())
}
