//! Command dispatch logic for trendscope

use super::{
    AggregateArgs, CompareArgs, InitArgs, InvalidateArgs, ResourceArgs, init_config, invalidate_cache, process_aggregate, process_compare,
    read_resource,
};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use std::io::Write;

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "trendscope", author, version, long_about = None)]
#[command(about = "Track technology popularity across rate-limited sources")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: TrendscopeSubcommand,
}

#[derive(Subcommand, Debug)]
enum TrendscopeSubcommand {
    /// Build the ranked snapshot for a date from raw measurement dumps
    Aggregate(Box<AggregateArgs>),
    /// Compare a snapshot against an earlier one
    Compare(Box<CompareArgs>),
    /// Print a resource such as `cache://trends/2025-10-21` as JSON
    Resource(Box<ResourceArgs>),
    /// Remove cached entries whose keys match a pattern
    Invalidate(Box<InvalidateArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            if e.use_stderr() {
                let _ = write!(host.error(), "{}", e.render());
            } else {
                let _ = write!(host.output(), "{}", e.render());
            }
            host.exit(e.exit_code());
            return Ok(());
        }
    };

    match &cli.command {
        TrendscopeSubcommand::Aggregate(args) => process_aggregate(host, args).await,
        TrendscopeSubcommand::Compare(args) => process_compare(host, args).await,
        TrendscopeSubcommand::Resource(args) => read_resource(host, args).await,
        TrendscopeSubcommand::Invalidate(args) => invalidate_cache(host, args).await,
        TrendscopeSubcommand::Init(args) => init_config(host, args),
    }
}
