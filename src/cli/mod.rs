//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "perp-trader")]
#[command(author, version, about = "Decision-driven perpetual swap trader")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", env = "TRADING_CONFIG")]
    pub config: PathBuf,

    /// Log level; defaults to the configured level
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute EMA and ATR over a CSV of candles
    Indicators(IndicatorsArgs),
    /// Route a decision feed through the paper exchange
    Paper(PaperArgs),
    /// Poll candles, replay a decision feed per instrument and dispatch on
    /// the paper exchange or OKX
    Run(RunArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct IndicatorsArgs {
    /// Candle file (CSV)
    #[arg(short, long)]
    pub data: PathBuf,

    /// EMA period; defaults to trade.ema_period
    #[arg(long)]
    pub ema_period: Option<usize>,

    /// ATR period; defaults to trade.atr_period
    #[arg(long)]
    pub atr_period: Option<usize>,

    /// Only print the N most recent rows
    #[arg(long)]
    pub last: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Paper exchange setup shared by `paper` and `run`.
#[derive(clap::Args)]
pub struct PaperExchangeArgs {
    /// Last prices, e.g. BTC-USDT-SWAP=50000,ETH-USDT-SWAP=3000
    #[arg(short, long, value_delimiter = ',')]
    pub prices: Vec<String>,

    /// Initial quote balance; defaults to paper.initial_balance
    #[arg(long)]
    pub balance: Option<Decimal>,
}

#[derive(clap::Args)]
pub struct PaperArgs {
    /// Decision feed (JSON lines)
    #[arg(short, long)]
    pub decisions: PathBuf,

    /// Instruments to run workers for (comma-separated); defaults to trade.symbols
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    #[command(flatten)]
    pub exchange: PaperExchangeArgs,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Decision feed (JSON lines), replayed one decision per instrument per cycle
    #[arg(short, long)]
    pub decisions: PathBuf,

    /// Instruments to poll (comma-separated); defaults to trade.symbols
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Candle history per instrument, e.g. BTC-USDT-SWAP=data/btc.csv
    #[arg(long, value_delimiter = ',')]
    pub candles: Vec<String>,

    /// Cycles per instrument; polls until Ctrl-C when unset
    #[arg(short = 'n', long)]
    pub cycles: Option<usize>,

    /// Seconds between cycles; defaults to trade.poll_interval_secs
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Trade on OKX with the credentials named in the exchange section
    /// (demo trading while exchange.simulated is set)
    #[arg(long, conflicts_with_all = ["candles", "prices", "balance"])]
    pub live: bool,

    #[command(flatten)]
    pub exchange: PaperExchangeArgs,
}
