//! Indicators command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;
use trading_config::AppConfig;
use trading_core::types::Candle;
use trading_data::CsvDataSource;
use trading_indicators::{calculate_atr, calculate_atr_percentage, calculate_ema, SeriesOrder};

use crate::cli::{IndicatorsArgs, OutputFormat};

/// One candle with the indicator values computed for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub timestamp: i64,
    pub close: f64,
    pub ema: Option<f64>,
    pub atr: Option<f64>,
    pub atr_pct: Option<f64>,
}

pub fn run(args: IndicatorsArgs, config: AppConfig) -> Result<()> {
    let ema_period = args.ema_period.unwrap_or(config.trade.ema_period);
    let atr_period = args.atr_period.unwrap_or(config.trade.atr_period);
    if ema_period == 0 || atr_period == 0 {
        anyhow::bail!("Indicator periods must be greater than 0");
    }

    let source = CsvDataSource::new(&args.data)
        .with_context(|| format!("Data file '{}' does not exist", args.data.display()))?;
    let candles = source.load().context("Failed to load candles")?;
    info!(
        path = %args.data.display(),
        candles = candles.len(),
        ema_period,
        atr_period,
        "Computing indicators"
    );

    let mut rows = indicator_rows(&candles, ema_period, atr_period);
    if let Some(n) = args.last {
        rows = most_recent(rows, SeriesOrder::of_candles(&candles), n);
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => print_table(&rows, ema_period, atr_period),
    }

    Ok(())
}

/// Rows in the file's own order.
pub fn indicator_rows(candles: &[Candle], ema_period: usize, atr_period: usize) -> Vec<IndicatorRow> {
    let ema = calculate_ema(candles, ema_period);
    let atr = calculate_atr(candles, atr_period);
    let atr_pct = calculate_atr_percentage(candles, atr_period);

    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| IndicatorRow {
            timestamp: candle.timestamp,
            close: candle.close,
            ema: ema[i],
            atr: atr[i],
            atr_pct: atr_pct[i],
        })
        .collect()
}

/// Keep the `n` newest rows without changing their order.
fn most_recent(mut rows: Vec<IndicatorRow>, order: SeriesOrder, n: usize) -> Vec<IndicatorRow> {
    let n = n.min(rows.len());
    match order {
        SeriesOrder::NewestFirst => {
            rows.truncate(n);
            rows
        }
        SeriesOrder::OldestFirst => rows.split_off(rows.len() - n),
    }
}

fn print_table(rows: &[IndicatorRow], ema_period: usize, atr_period: usize) {
    let fmt = |value: Option<f64>, precision: usize| match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    };

    println!(
        "{:<16} {:>14} {:>14} {:>14} {:>8}",
        "timestamp",
        "close",
        format!("EMA({})", ema_period),
        format!("ATR({})", atr_period),
        "ATR%"
    );
    for row in rows {
        println!(
            "{:<16} {:>14.4} {:>14} {:>14} {:>8}",
            row.timestamp,
            row.close,
            fmt(row.ema, 4),
            fmt(row.atr, 4),
            fmt(row.atr_pct, 2)
        );
    }
}
