//! JSON-lines decision feed.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use trading_core::error::{DataError, MalformedInputError, TradingError};
use trading_core::traits::{DecisionSource, MarketSnapshot};
use trading_core::types::{Decision, InstrumentDecision};

/// Load decisions from a JSON-lines file.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn load_decisions(path: impl AsRef<Path>) -> Result<Vec<InstrumentDecision>, DataError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let decisions = parse_decisions(BufReader::new(file))?;
    debug!(path = %path.display(), decisions = decisions.len(), "Loaded decisions");
    Ok(decisions)
}

/// Parse decisions from JSON lines; a malformed line fails with its number.
pub fn parse_decisions<R: BufRead>(reader: R) -> Result<Vec<InstrumentDecision>, DataError> {
    let mut decisions = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let decision = serde_json::from_str::<InstrumentDecision>(trimmed).map_err(|e| {
            DataError::Malformed {
                line: index + 1,
                source: MalformedInputError::Decision(e.to_string()),
            }
        })?;
        decisions.push(decision);
    }

    Ok(decisions)
}

/// Replays a decision feed as a [`DecisionSource`].
///
/// Each instrument gets its own decisions back in feed order, one per cycle,
/// and `None` once its queue is empty.
#[derive(Debug, Default)]
pub struct DecisionQueue {
    queues: Mutex<HashMap<String, VecDeque<Decision>>>,
}

impl DecisionQueue {
    pub fn new(decisions: impl IntoIterator<Item = InstrumentDecision>) -> Self {
        let mut queues: HashMap<String, VecDeque<Decision>> = HashMap::new();
        for item in decisions {
            queues.entry(item.instrument).or_default().push_back(item.decision);
        }
        Self {
            queues: Mutex::new(queues),
        }
    }

    /// Decisions still queued for the instrument.
    pub fn remaining(&self, instrument: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(instrument)
            .map_or(0, VecDeque::len)
    }

    /// Instruments with queued decisions, sorted.
    pub fn instruments(&self) -> Vec<String> {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let mut instruments: Vec<String> = queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(instrument, _)| instrument.clone())
            .collect();
        instruments.sort_unstable();
        instruments
    }
}

#[async_trait]
impl DecisionSource for DecisionQueue {
    async fn decide(&self, snapshot: &MarketSnapshot) -> Result<Option<Decision>, TradingError> {
        Ok(self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&snapshot.instrument)
            .and_then(VecDeque::pop_front))
    }

    fn name(&self) -> &str {
        "decision-feed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading_core::types::DecisionAction;

    #[test]
    fn test_parse_decisions() {
        let feed = r#"
# morning batch
{"instrument":"BTC-USDT-SWAP","action":"ENTRY_LONG","quantity":"0.5","stopLoss":49500}
{"symbol":"ETH-USDT-SWAP","action":"UPDATE_STOP_LOSS","stop_loss":"3100.5"}

{"instId":"SOL-USDT-SWAP","action":"HODL"}
"#;
        let decisions = parse_decisions(feed.as_bytes()).unwrap();

        assert_eq!(decisions.len(), 3);
        assert_eq!(decisions[0].instrument, "BTC-USDT-SWAP");
        assert_eq!(decisions[0].decision.quantity, Some(dec!(0.5)));
        assert_eq!(decisions[0].decision.stop_loss, Some(dec!(49500)));
        assert_eq!(decisions[1].decision.action, DecisionAction::UpdateStopLoss);
        assert_eq!(decisions[1].decision.stop_loss, Some(dec!(3100.5)));
        assert_eq!(
            decisions[2].decision.action,
            DecisionAction::Unknown("HODL".to_string())
        );
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let feed = "{\"instrument\":\"BTC-USDT-SWAP\",\"action\":\"NO_OP\"}\n{\"action\":\"NO_OP\"}\n";

        match parse_decisions(feed.as_bytes()) {
            Err(DataError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a malformed line, got {:?}", other),
        }
    }

    fn snapshot(instrument: &str) -> MarketSnapshot {
        MarketSnapshot {
            instrument: instrument.to_string(),
            candles: Vec::new(),
            ema: None,
            atr: None,
            atr_pct: None,
        }
    }

    #[tokio::test]
    async fn test_queue_replays_per_instrument_in_order() {
        let feed = r#"
{"instrument":"BTC-USDT-SWAP","action":"ENTRY_LONG","quantity":"1"}
{"instrument":"ETH-USDT-SWAP","action":"NO_OP"}
{"instrument":"BTC-USDT-SWAP","action":"EXIT_LONG"}
"#;
        let queue = DecisionQueue::new(parse_decisions(feed.as_bytes()).unwrap());

        assert_eq!(queue.instruments(), vec!["BTC-USDT-SWAP", "ETH-USDT-SWAP"]);
        assert_eq!(queue.remaining("BTC-USDT-SWAP"), 2);

        let btc = snapshot("BTC-USDT-SWAP");
        let first = queue.decide(&btc).await.unwrap().unwrap();
        assert_eq!(first.action, DecisionAction::EntryLong);
        let second = queue.decide(&btc).await.unwrap().unwrap();
        assert_eq!(second.action, DecisionAction::ExitLong);
        assert!(queue.decide(&btc).await.unwrap().is_none());

        assert!(queue.decide(&snapshot("SOL-USDT-SWAP")).await.unwrap().is_none());
        assert_eq!(queue.instruments(), vec!["ETH-USDT-SWAP"]);
        assert_eq!(queue.name(), "decision-feed");
    }
}
