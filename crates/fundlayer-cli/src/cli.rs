//! CLI argument definitions for fundlayer.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Fetch any registered data type with fallback |
//! | `fund-price` | Latest fund price |
//! | `fund-history` | Fund net asset value history |
//! | `sector-flow` | Sector capital flow ranking |
//! | `news` | Finance news for a topic |
//! | `sources` | Source health for a data type |
//! | `cache` | Sweep, clear or inspect the persistent cache |
//!
//! # Examples
//!
//! ```bash
//! fundlayer fund-price 008888 --pretty
//! fundlayer fetch board_flow --param indicator=today --shape array
//! fundlayer sources fund_realtime
//! fundlayer cache sweep
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fundlayer_core::{FlowIndicator, PayloadShape, SectorType};

/// Resilient multi-source market data fetcher with a persistent cache.
#[derive(Debug, Parser)]
#[command(name = "fundlayer", author, version, about)]
pub struct Cli {
    /// Source manifest (JSON). Defaults to `$FUNDLAYER_HOME/sources.json`.
    #[arg(long, global = true)]
    pub sources: Option<PathBuf>,

    /// Cache database file. Overrides `FUNDLAYER_CACHE_PATH`.
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is not set. Logs go to stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a data type through the fallback chain.
    ///
    ///   fundlayer fetch fund_realtime --param code=008888 --shape number:price
    Fetch(FetchArgs),

    /// Latest (estimated) price for one fund.
    FundPrice(FundPriceArgs),

    /// Net asset value history for one fund.
    FundHistory(FundHistoryArgs),

    /// Sector capital flow ranking.
    SectorFlow(SectorFlowArgs),

    /// Finance news for a topic.
    News(NewsArgs),

    /// Show registered sources and their circuit state for a data type.
    Sources(SourcesArgs),

    /// Manage the persistent cache.
    Cache(CacheArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Logical data type, e.g. `fund_realtime`.
    pub data_type: String,

    /// Request parameter as `key=value`; repeatable.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Skip the fresh-cache read; the result is still cached.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Do not read, write or fall back to the cache.
    #[arg(long, default_value_t = false, conflicts_with = "no_cache")]
    pub bypass_cache: bool,

    /// Cache TTL in seconds for this request.
    #[arg(long)]
    pub ttl_secs: Option<u64>,

    /// Expected payload shape: any, array, fields:<a,b>, number:<field>.
    #[arg(long, default_value = "any")]
    pub shape: PayloadShape,
}

#[derive(Debug, Args)]
pub struct FundPriceArgs {
    /// Fund code, e.g. `008888`.
    pub code: String,
}

#[derive(Debug, Args)]
pub struct FundHistoryArgs {
    pub code: String,

    #[arg(long, default_value_t = 180)]
    pub lookback_days: u32,
}

#[derive(Debug, Args)]
pub struct SectorFlowArgs {
    /// Aggregation window: today, 5d, 10d.
    #[arg(long, default_value = "today")]
    pub indicator: FlowIndicator,

    /// Board family: industry, concept, region.
    #[arg(long, default_value = "industry")]
    pub sector_type: SectorType,
}

#[derive(Debug, Args)]
pub struct NewsArgs {
    pub topic: String,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    pub data_type: String,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CacheCommand {
    /// Delete entries that have expired.
    Sweep(SweepArgs),
    /// Delete every entry.
    Clear,
    /// Count fresh and stale entries.
    Stats,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct SweepArgs {
    /// Keep sweeping on an interval until interrupted.
    #[arg(long, default_value_t = false)]
    pub watch: bool,

    /// Interval for `--watch`. Defaults to `FUNDLAYER_SWEEP_INTERVAL_SECS` or 600.
    #[arg(long, requires = "watch", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_secs: Option<u64>,
}
