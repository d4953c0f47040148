use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::snapshots::ResourceUri;
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ResourceArgs {
    /// Resource to read: `cache://trends/{date}` or `history://technology/{name}`
    #[arg(value_name = "URI")]
    pub uri: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn read_resource<H: Host>(host: &mut H, args: &ResourceArgs) -> Result<()> {
    let uri: ResourceUri = args.uri.parse()?;
    let mut common = Common::new(host, &args.common)?;
    let document = common.store.resolve(&uri).await?;
    let text = serde_json::to_string_pretty(&document).into_app_err("encoding resource")?;

    let _ = writeln!(common.host().output(), "{text}");
    common.log_stats();
    Ok(())
}
