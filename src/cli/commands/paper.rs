//! Paper trading command implementation.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use trading_broker::PaperGateway;
use trading_config::AppConfig;
use trading_core::traits::ExchangeGateway;
use trading_data::load_decisions;
use trading_execution::{DecisionDispatcher, SymbolWorkers};

use crate::cli::{PaperArgs, PaperExchangeArgs};

pub async fn run(args: PaperArgs, config: AppConfig) -> Result<()> {
    let quote = config.trade.quote_currency.clone();
    let symbols = if args.symbols.is_empty() {
        config.trade.symbols.clone()
    } else {
        args.symbols.clone()
    };

    let gateway = open_paper_exchange(&args.exchange, &config).await?;

    let decisions = load_decisions(&args.decisions)
        .with_context(|| format!("Failed to read decisions from {}", args.decisions.display()))?;

    let dispatcher = Arc::new(DecisionDispatcher::new(gateway.clone()));
    let workers = SymbolWorkers::spawn(symbols, dispatcher);
    info!(
        decisions = decisions.len(),
        workers = ?workers.instruments(),
        "Starting paper session"
    );

    let mut unrouted = 0usize;
    for item in decisions {
        if let Err(e) = workers.submit(&item.instrument, item.decision).await {
            unrouted += 1;
            warn!(instrument = %item.instrument, error = %e, "Decision not routed");
        }
    }

    let reports = workers.shutdown().await;

    println!("Paper session complete");
    println!();
    for report in &reports {
        println!(
            "{:<20} dispatched={} failed={}",
            report.instrument, report.dispatched, report.failed
        );
    }
    if unrouted > 0 {
        println!("{:<20} {}", "unrouted", unrouted);
    }

    print_book(&gateway, &quote).await
}

/// Create the paper exchange, seed its prices and check it answers a
/// balance query before anything is routed to it.
pub async fn open_paper_exchange(
    args: &PaperExchangeArgs,
    config: &AppConfig,
) -> Result<Arc<PaperGateway>> {
    let quote = &config.trade.quote_currency;
    let balance = args.balance.unwrap_or(config.paper.initial_balance);

    let gateway = Arc::new(PaperGateway::new(quote.clone(), balance));
    for (instrument, price) in parse_prices(&args.prices)? {
        gateway.set_ticker(&instrument, price);
    }

    let starting = gateway
        .balance(quote)
        .await
        .context("Paper exchange balance check failed")?;
    info!(exchange = gateway.name(), balance = %starting, "Exchange reachable");

    Ok(gateway)
}

/// Print open positions, resting protective orders and the quote balance.
pub async fn print_book(gateway: &PaperGateway, quote: &str) -> Result<()> {
    println!();
    let positions = gateway.open_positions();
    if positions.is_empty() {
        println!("No open positions");
    }
    for position in &positions {
        println!("{}", position);
    }

    for order in gateway.algo_orders() {
        println!(
            "{:<20} {} {} sl={} tp={}",
            order.instrument,
            order.kind,
            order.algo_id,
            display_price(order.stop_trigger_price),
            display_price(order.take_profit_trigger_price)
        );
    }

    let ending = gateway.balance(quote).await?;
    println!();
    println!("{}", ending);

    Ok(())
}

/// Parse `INSTRUMENT=PRICE` pairs.
pub fn parse_prices(raw: &[String]) -> Result<Vec<(String, Decimal)>> {
    raw.iter()
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let (instrument, price) = entry
                .split_once('=')
                .with_context(|| format!("Expected INSTRUMENT=PRICE, got '{}'", entry))?;
            let price = Decimal::from_str(price.trim())
                .with_context(|| format!("Invalid price in '{}'", entry))?;
            if price <= Decimal::ZERO {
                anyhow::bail!("Price must be positive in '{}'", entry);
            }
            Ok((instrument.trim().to_string(), price))
        })
        .collect()
}

fn display_price(price: Option<Decimal>) -> String {
    price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
}
