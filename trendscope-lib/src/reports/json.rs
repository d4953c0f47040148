use crate::Result;
use crate::analytics::{Snapshot, TrendDelta};
use chrono::NaiveDate;
use core::fmt::Write;
use serde_json::json;

/// Write a snapshot as pretty-printed JSON.
pub fn generate_snapshot<W: Write>(snapshot: &Snapshot, writer: &mut W) -> Result<()> {
    write!(writer, "{}", serde_json::to_string_pretty(snapshot)?)?;
    Ok(())
}

/// Write trend deltas, together with the dates they compare, as pretty-printed JSON.
pub fn generate_trends<W: Write>(date: NaiveDate, baseline: NaiveDate, deltas: &[TrendDelta], writer: &mut W) -> Result<()> {
    let output = json!({
        "date": date,
        "baseline": baseline,
        "trends": deltas,
    });

    write!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}
