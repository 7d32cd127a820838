//! CLI argument definitions for spotvol.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `serve` | Run the HTTP read API with the periodic refresh driver |
//! | `refresh` | Fetch all prices once and store them |
//! | `history` | Print stored history and rank for one pair |
//! | `pairs` | List the supported pairs |
//! | `volatility` | Print the current volatility ranking |
//!
//! # Examples
//!
//! ```bash
//! spotvol serve --port 8000 --refresh-secs 120
//! spotvol refresh --pretty
//! spotvol history btc usd --hours 6
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Spot price tracking and volatility ranking for crypto pairs.
#[derive(Debug, Parser)]
#[command(name = "spotvol", author, version, about)]
pub struct Cli {
    /// DuckDB database file (default: $SPOTVOL_HOME/data/prices.duckdb).
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP read API.
    ///
    ///   spotvol serve
    ///   spotvol serve --host 0.0.0.0 --port 9000 --no-refresh
    Serve(ServeArgs),

    /// Fetch current prices for every pair and store them.
    Refresh,

    /// Show stored price history and volatility rank for a pair.
    ///
    ///   spotvol history eth btc --hours 12
    History(HistoryArgs),

    /// List supported pairs and their price source ids.
    Pairs,

    /// Show the 24 hour volatility ranking.
    Volatility,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Bind host (default: $API_HOST or 127.0.0.1).
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (default: $API_PORT or 8000).
    #[arg(long)]
    pub port: Option<u16>,

    /// Seconds between scheduled refreshes.
    #[arg(long, default_value_t = 120)]
    pub refresh_secs: u64,

    /// Disable the scheduled refresh driver.
    #[arg(long, default_value_t = false)]
    pub no_refresh: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Base currency, e.g. btc.
    pub base: String,

    /// Quote currency, e.g. usd.
    pub quote: String,

    /// Lookback window in hours. Defaults to `SPOTVOL_HISTORY_HOURS`, else 24.
    #[arg(long)]
    pub hours: Option<u32>,
}
