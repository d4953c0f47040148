use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    /// Keys to remove, where `*` matches any run of characters (for example `reddit:*` or `trends:2025-10-*`)
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn invalidate_cache<H: Host>(host: &mut H, args: &InvalidateArgs) -> Result<()> {
    let mut common = Common::new(host, &args.common)?;
    let removed = common.coordinator.invalidate(&args.pattern).await?;

    let _ = writeln!(common.host().output(), "Removed {removed} cached entries matching '{}'", args.pattern);
    Ok(())
}
