//! Polling run command implementation.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use trading_broker::{HttpTransport, OkxCredentials, OkxGateway};
use trading_config::AppConfig;
use trading_core::traits::ExchangeGateway;
use trading_data::{load_csv, load_decisions, DecisionQueue};
use trading_execution::{CycleSettings, CycleWorkers, TradingCycle};

use super::paper::{open_paper_exchange, print_book};
use crate::cli::RunArgs;

pub async fn run(args: RunArgs, config: AppConfig) -> Result<()> {
    let trade = &config.trade;
    let symbols = if args.symbols.is_empty() {
        trade.symbols.clone()
    } else {
        args.symbols.clone()
    };
    let interval_secs = args.interval_secs.unwrap_or(trade.poll_interval_secs);
    if interval_secs == 0 {
        anyhow::bail!("Poll interval must be greater than 0");
    }

    let (gateway, paper) = if args.live {
        let okx: Arc<dyn ExchangeGateway> = Arc::new(open_okx(&config).await?);
        (okx, None)
    } else {
        let paper = open_paper_exchange(&args.exchange, &config).await?;
        for (instrument, path) in parse_candle_files(&args.candles)? {
            let candles = load_csv(&path)
                .with_context(|| format!("Failed to load candles from {}", path.display()))?;
            info!(instrument = %instrument, candles = candles.len(), "Candle history loaded");
            paper.set_candles(&instrument, candles);
        }
        let gateway: Arc<dyn ExchangeGateway> = paper.clone();
        (gateway, Some(paper))
    };

    let decisions = load_decisions(&args.decisions)
        .with_context(|| format!("Failed to read decisions from {}", args.decisions.display()))?;
    let source = Arc::new(DecisionQueue::new(decisions));
    for instrument in source.instruments() {
        if !symbols.contains(&instrument) {
            warn!(
                instrument = %instrument,
                queued = source.remaining(&instrument),
                "Decisions for an instrument that is not polled"
            );
        }
    }

    let settings = CycleSettings {
        timeframe: trade.timeframe,
        candle_limit: trade.candle_limit,
        ema_period: trade.ema_period,
        atr_period: trade.atr_period,
        poll_interval: Duration::from_secs(interval_secs),
        max_cycles: args.cycles,
    };
    let cycle = Arc::new(TradingCycle::new(gateway.clone(), source.clone(), settings));
    let workers = CycleWorkers::spawn(cycle, symbols.clone());

    let reports = workers
        .join_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                // Without a signal handler only the cycle limit ends the run
                std::future::pending::<()>().await;
            }
        })
        .await;

    println!("Run complete");
    println!();
    for report in &reports {
        println!(
            "{:<20} cycles={} dispatched={} idle={} failed={} queued={}",
            report.instrument,
            report.cycles,
            report.dispatched,
            report.idle,
            report.failed,
            source.remaining(&report.instrument)
        );
    }

    match paper {
        Some(paper) => print_book(&paper, &trade.quote_currency).await,
        None => print_exchange_book(gateway.as_ref(), &symbols, &trade.quote_currency).await,
    }
}

/// Connect to OKX and check the account answers a balance query.
async fn open_okx(config: &AppConfig) -> Result<OkxGateway> {
    let exchange = &config.exchange;
    let credentials = OkxCredentials::from_env(
        &exchange.api_key_env,
        &exchange.api_secret_env,
        &exchange.passphrase_env,
    )
    .context("OKX credentials are not configured")?;
    let transport = HttpTransport::new(credentials, exchange.simulated)
        .context("Failed to create the OKX HTTP client")?;
    let gateway = OkxGateway::new(Arc::new(transport)).with_margin_mode(exchange.margin_mode);

    let balance = gateway
        .balance(&config.trade.quote_currency)
        .await
        .context("OKX balance check failed")?;
    info!(
        exchange = gateway.name(),
        simulated = exchange.simulated,
        balance = %balance,
        "Exchange reachable"
    );

    Ok(gateway)
}

async fn print_exchange_book(
    gateway: &dyn ExchangeGateway,
    symbols: &[String],
    quote: &str,
) -> Result<()> {
    println!();
    for symbol in symbols {
        match gateway.positions(symbol).await {
            Ok(positions) if positions.is_empty() => println!("{:<20} flat", symbol),
            Ok(positions) => positions.iter().for_each(|p| println!("{}", p)),
            Err(e) => println!("{:<20} positions unavailable ({})", symbol, e),
        }
    }

    let balance = gateway.balance(quote).await?;
    println!();
    println!("{}", balance);

    Ok(())
}

/// Parse `INSTRUMENT=PATH` pairs.
pub fn parse_candle_files(raw: &[String]) -> Result<Vec<(String, PathBuf)>> {
    raw.iter()
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let (instrument, path) = entry
                .split_once('=')
                .with_context(|| format!("Expected INSTRUMENT=PATH, got '{}'", entry))?;
            let (instrument, path) = (instrument.trim(), path.trim());
            if instrument.is_empty() || path.is_empty() {
                anyhow::bail!("Expected INSTRUMENT=PATH, got '{}'", entry);
            }
            Ok((instrument.to_string(), PathBuf::from(path)))
        })
        .collect()
}
