//! Per-instrument polling cycle.
//!
//! Every tick each instrument fetches its recent candles, computes EMA and
//! ATR over them, asks the decision source what to do and dispatches the
//! answer. Instruments poll independently; cycles for one instrument never
//! overlap. A failed or panicking cycle is logged and counted and the next
//! tick runs as usual.

use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use trading_core::error::TradingError;
use trading_core::traits::{DecisionSource, ExchangeGateway, IndicatorSeries, MarketSnapshot};
use trading_core::types::Timeframe;
use trading_indicators::{calculate_atr, calculate_atr_percentage, calculate_ema, SeriesOrder};

use crate::dispatcher::{DecisionDispatcher, DispatchOutcome};
use crate::scheduler::panic_message;

/// How each instrument polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    pub timeframe: Timeframe,
    pub candle_limit: usize,
    pub ema_period: usize,
    pub atr_period: usize,
    pub poll_interval: Duration,
    /// Stop after this many cycles per instrument; poll until stopped when unset
    pub max_cycles: Option<usize>,
}

/// Per-instrument tally returned when polling stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub instrument: String,
    pub cycles: usize,
    /// Cycles where the source had no decision
    pub idle: usize,
    pub dispatched: usize,
    pub failed: usize,
}

/// One instrument's decision cycle: candles, indicators, decision, dispatch.
pub struct TradingCycle {
    gateway: Arc<dyn ExchangeGateway>,
    dispatcher: DecisionDispatcher,
    source: Arc<dyn DecisionSource>,
    settings: CycleSettings,
}

impl TradingCycle {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        source: Arc<dyn DecisionSource>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            dispatcher: DecisionDispatcher::new(gateway.clone()),
            gateway,
            source,
            settings,
        }
    }

    /// Fetch candles and compute the indicators at the newest one.
    pub async fn snapshot(&self, instrument: &str) -> Result<MarketSnapshot, TradingError> {
        let candles = self
            .gateway
            .candles(instrument, self.settings.timeframe, self.settings.candle_limit)
            .await?;

        let newest = match SeriesOrder::of_candles(&candles) {
            SeriesOrder::NewestFirst => 0,
            SeriesOrder::OldestFirst => candles.len().saturating_sub(1),
        };
        let at_newest = |series: IndicatorSeries| series.get(newest).copied().flatten();

        Ok(MarketSnapshot {
            instrument: instrument.to_string(),
            ema: at_newest(calculate_ema(&candles, self.settings.ema_period)),
            atr: at_newest(calculate_atr(&candles, self.settings.atr_period)),
            atr_pct: at_newest(calculate_atr_percentage(&candles, self.settings.atr_period)),
            candles,
        })
    }

    /// Run one cycle. `None` means the source had nothing to do.
    pub async fn run_once(&self, instrument: &str) -> Result<Option<DispatchOutcome>, TradingError> {
        let snapshot = self.snapshot(instrument).await?;
        info!(
            instrument = %instrument,
            candles = snapshot.candles.len(),
            close = ?snapshot.latest().map(|c| c.close),
            ema = ?snapshot.ema,
            atr_pct = ?snapshot.atr_pct,
            "Market snapshot"
        );

        let decision = match self.source.decide(&snapshot).await? {
            Some(decision) => decision,
            None => {
                debug!(instrument = %instrument, source = self.source.name(), "No decision");
                return Ok(None);
            }
        };

        let outcome = self.dispatcher.dispatch(instrument, &decision).await?;
        Ok(Some(outcome))
    }
}

/// Handles to the running polling loops.
pub struct CycleWorkers {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<CycleReport>>,
}

impl CycleWorkers {
    /// Start one polling loop per distinct instrument.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<I, S>(cycle: Arc<TradingCycle>, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (stop, _) = watch::channel(false);
        let mut seen = HashSet::new();
        let mut handles = Vec::new();

        for instrument in instruments {
            let instrument = instrument.into();
            if !seen.insert(instrument.clone()) {
                continue;
            }
            handles.push(tokio::spawn(poll_instrument(
                instrument,
                cycle.clone(),
                stop.subscribe(),
            )));
        }

        info!(
            workers = handles.len(),
            interval_ms = cycle.settings.poll_interval.as_millis() as u64,
            max_cycles = ?cycle.settings.max_cycles,
            "Polling started"
        );
        Self { stop, handles }
    }

    /// Ask every loop to finish after its current cycle.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Wait for every loop to finish and collect their reports sorted by
    /// instrument. Loops without a cycle limit only finish once stopped.
    pub async fn join(self) -> Vec<CycleReport> {
        self.join_until(std::future::pending()).await
    }

    /// Like [`join`](Self::join), but stop every loop once `shutdown`
    /// completes.
    pub async fn join_until<F>(self, shutdown: F) -> Vec<CycleReport>
    where
        F: Future<Output = ()>,
    {
        let Self { stop, handles } = self;
        let all = join_all(handles);
        tokio::pin!(all);

        let results = tokio::select! {
            results = &mut all => results,
            _ = shutdown => {
                info!("Shutdown requested, finishing current cycles");
                stop.send_replace(true);
                all.await
            }
        };

        let mut reports = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Polling loop terminated abnormally"),
            }
        }

        reports.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        info!(workers = reports.len(), "Polling stopped");
        reports
    }
}

async fn poll_instrument(
    instrument: String,
    cycle: Arc<TradingCycle>,
    mut stop: watch::Receiver<bool>,
) -> CycleReport {
    let mut report = CycleReport {
        instrument,
        ..Default::default()
    };
    let mut interval = tokio::time::interval(cycle.settings.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if cycle.settings.max_cycles.is_some_and(|max| report.cycles >= max) || *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.changed() => break,
        }

        report.cycles += 1;
        let run = cycle.run_once(&report.instrument);
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(Some(outcome))) => {
                report.dispatched += 1;
                debug!(instrument = %report.instrument, outcome = ?outcome, "Cycle dispatched");
            }
            Ok(Ok(None)) => report.idle += 1,
            Ok(Err(e)) => {
                report.failed += 1;
                error!(
                    instrument = %report.instrument,
                    cycle = report.cycles,
                    error = %e,
                    "Cycle failed"
                );
            }
            Err(panic) => {
                report.failed += 1;
                error!(
                    instrument = %report.instrument,
                    cycle = report.cycles,
                    panic = panic_message(panic.as_ref()),
                    "Cycle panicked"
                );
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use trading_broker::{GatewayCall, GatewayOperation, PaperGateway};
    use trading_core::error::GatewayError;
    use trading_core::types::{Candle, Decision, DecisionAction, InstrumentDecision};
    use trading_data::DecisionQueue;

    const BTC: &str = "BTC-USDT-SWAP";
    const ETH: &str = "ETH-USDT-SWAP";

    fn settings(max_cycles: Option<usize>) -> CycleSettings {
        CycleSettings {
            timeframe: Timeframe::Hour1,
            candle_limit: 30,
            ema_period: 5,
            atr_period: 3,
            poll_interval: Duration::from_millis(5),
            max_cycles,
        }
    }

    fn rising_candles(count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle::new(1_700_000_000_000 + i * 3_600_000, close, close + 2.0, close - 2.0, close, 10.0)
            })
            .collect()
    }

    fn gateway() -> Arc<PaperGateway> {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(100000)));
        gateway.set_ticker(BTC, dec!(150));
        gateway.set_ticker(ETH, dec!(150));
        gateway.set_candles(BTC, rising_candles(50));
        gateway.set_candles(ETH, rising_candles(50));
        gateway
    }

    fn queue(items: &[(&str, Decision)]) -> Arc<DecisionQueue> {
        Arc::new(DecisionQueue::new(items.iter().map(|(instrument, decision)| {
            InstrumentDecision {
                instrument: instrument.to_string(),
                decision: decision.clone(),
            }
        })))
    }

    /// Remembers every snapshot it is shown and never decides.
    #[derive(Default)]
    struct RecordingSource {
        seen: Mutex<Vec<MarketSnapshot>>,
    }

    #[async_trait]
    impl DecisionSource for RecordingSource {
        async fn decide(&self, snapshot: &MarketSnapshot) -> Result<Option<Decision>, TradingError> {
            self.seen.lock().unwrap().push(snapshot.clone());
            Ok(None)
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    /// Panics on its first call, then holds.
    #[derive(Default)]
    struct FlakySource {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl DecisionSource for FlakySource {
        async fn decide(&self, _snapshot: &MarketSnapshot) -> Result<Option<Decision>, TradingError> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls == 1
            };
            if first {
                panic!("decision model unavailable");
            }
            Ok(Some(Decision::new(DecisionAction::NoOp)))
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_snapshot_uses_configured_window() {
        let gateway = gateway();
        let source = Arc::new(RecordingSource::default());
        let cycle = TradingCycle::new(gateway.clone(), source.clone(), settings(None));

        assert_eq!(cycle.run_once(BTC).await.unwrap(), None);

        assert_eq!(
            gateway.calls_of(GatewayOperation::Candles),
            vec![GatewayCall::Candles {
                instrument: BTC.to_string(),
                timeframe: Timeframe::Hour1,
                limit: 30,
            }]
        );

        let seen = source.seen.lock().unwrap();
        let snapshot = &seen[0];
        assert_eq!(snapshot.candles.len(), 30);
        assert_eq!(snapshot.latest().map(|c| c.close), Some(149.0));

        // Newest-first series: the indicator value at the newest candle sits at index 0
        let expected_ema = calculate_ema(&snapshot.candles, 5)[0];
        assert_eq!(snapshot.ema, expected_ema);
        assert!(snapshot.ema.is_some());
        assert!(snapshot.atr.is_some());
        assert!(snapshot.atr_pct.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_without_candles() {
        let gateway = Arc::new(PaperGateway::new("USDT", dec!(1000)));
        let source = Arc::new(RecordingSource::default());
        let cycle = TradingCycle::new(gateway, source, settings(None));

        let snapshot = cycle.snapshot(BTC).await.unwrap();

        assert!(snapshot.candles.is_empty());
        assert_eq!(snapshot.ema, None);
        assert_eq!(snapshot.atr_pct, None);
    }

    #[tokio::test]
    async fn test_run_once_dispatches_decision() {
        let gateway = gateway();
        let source = queue(&[(BTC, Decision::entry_long(dec!(2)).with_stop_loss(dec!(140)))]);
        let cycle = TradingCycle::new(gateway.clone(), source, settings(None));

        let outcome = cycle.run_once(BTC).await.unwrap();

        assert!(matches!(
            outcome,
            Some(DispatchOutcome::OrderPlaced { protected: true, .. })
        ));
        assert_eq!(gateway.open_positions()[0].quantity, dec!(2));
        assert_eq!(cycle.run_once(BTC).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_workers_stop_after_max_cycles() {
        let gateway = gateway();
        let source = queue(&[
            (BTC, Decision::entry_long(dec!(1))),
            (ETH, Decision::entry_short(dec!(1))),
            (BTC, Decision::new(DecisionAction::ExitLong)),
        ]);
        let cycle = Arc::new(TradingCycle::new(gateway.clone(), source, settings(Some(3))));

        let reports = CycleWorkers::spawn(cycle, [BTC, ETH, BTC]).join().await;

        assert_eq!(
            reports,
            vec![
                CycleReport {
                    instrument: BTC.to_string(),
                    cycles: 3,
                    idle: 1,
                    dispatched: 2,
                    failed: 0
                },
                CycleReport {
                    instrument: ETH.to_string(),
                    cycles: 3,
                    idle: 2,
                    dispatched: 1,
                    failed: 0
                },
            ]
        );
        assert_eq!(gateway.calls_of(GatewayOperation::Candles).len(), 6);
        let positions = gateway.open_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].instrument, ETH);
    }

    #[tokio::test]
    async fn test_failed_cycle_does_not_stop_polling() {
        let gateway = gateway();
        gateway.fail_next(
            GatewayOperation::Candles,
            GatewayError::Timeout("candles".to_string()),
        );
        let source = queue(&[
            (BTC, Decision::entry_long(dec!(1))),
            (BTC, Decision::entry_long(dec!(1))),
        ]);
        let cycle = Arc::new(TradingCycle::new(gateway.clone(), source, settings(Some(3))));

        let reports = CycleWorkers::spawn(cycle, [BTC]).join().await;

        assert_eq!(reports[0].cycles, 3);
        assert_eq!(reports[0].failed, 1);
        assert_eq!(reports[0].dispatched, 2);
        assert_eq!(gateway.open_positions()[0].quantity, dec!(2));
    }

    #[tokio::test]
    async fn test_panicking_cycle_is_contained() {
        let cycle = Arc::new(TradingCycle::new(
            gateway(),
            Arc::new(FlakySource::default()),
            settings(Some(3)),
        ));

        let reports = CycleWorkers::spawn(cycle, [BTC]).join().await;

        assert_eq!(reports[0].cycles, 3);
        assert_eq!(reports[0].failed, 1);
        assert_eq!(reports[0].dispatched, 2);
    }

    #[tokio::test]
    async fn test_shutdown_future_stops_polling() {
        let source = Arc::new(RecordingSource::default());
        let cycle = Arc::new(TradingCycle::new(gateway(), source, settings(None)));

        let workers = CycleWorkers::spawn(cycle, [BTC]);
        let reports = workers
            .join_until(tokio::time::sleep(Duration::from_millis(30)))
            .await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].cycles >= 1);
        assert_eq!(reports[0].failed, 0);
    }

    #[tokio::test]
    async fn test_stop_ends_unbounded_polling() {
        let source = Arc::new(RecordingSource::default());
        let cycle = Arc::new(TradingCycle::new(gateway(), source, settings(None)));

        let workers = CycleWorkers::spawn(cycle, [BTC, ETH]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        workers.stop();
        let reports = workers.join().await;

        assert_eq!(reports.len(), 2);
        for report in &reports {
            assert!(report.cycles >= 1);
            assert_eq!(report.idle, report.cycles);
        }
    }
}
