use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::reports::{generate_trends_console, generate_trends_json};
use camino::Utf8PathBuf;
use chrono::{Days, NaiveDate, Utc};
use clap::Parser;
use ohno::{IntoAppError, app_err};
use std::fs;
use std::io::Write;

const LOG_TARGET: &str = "   compare";

#[derive(Parser, Debug)]
pub struct CompareArgs {
    /// Date of the current snapshot (default is today, UTC)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Date of the baseline snapshot (default is `analysis.lookback_days` before the current one)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub baseline: Option<NaiveDate>,

    /// Write the trend deltas to a JSON file
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn process_compare<H: Host>(host: &mut H, args: &CompareArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common)?;
    let analysis = &common.config.analysis;

    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let baseline_date = match args.baseline {
        Some(baseline) => baseline,
        None => date
            .checked_sub_days(Days::new(analysis.lookback_days))
            .ok_or_else(|| app_err!("cannot go back {} days from {date}", analysis.lookback_days))?,
    };
    let window_days = analysis.history_window_days;

    let current = common
        .store
        .load(date)
        .await?
        .ok_or_else(|| app_err!("no snapshot for {date}, run `trendscope aggregate` first"))?;
    let baseline = common
        .store
        .load(baseline_date)
        .await?
        .ok_or_else(|| app_err!("no baseline snapshot for {baseline_date}"))?;
    let history = common.store.window(date, window_days).await?;

    log::info!(
        target: LOG_TARGET,
        "Comparing {date} against {baseline_date} with {} historical snapshot(s)",
        history.len()
    );

    let deltas = common.analyzer().compare_with_history(&current, &baseline, &history);

    if let Some(path) = &args.json {
        let mut json = String::new();
        generate_trends_json(date, baseline_date, &deltas, &mut json)?;
        fs::write(path, json).into_app_err_with(|| format!("writing trends to '{path}'"))?;
    }

    let mut console = String::new();
    generate_trends_console(date, baseline_date, &deltas, common.use_colors(), &mut console)?;
    let _ = write!(common.host().output(), "{console}");

    common.log_stats();
    Ok(())
}
