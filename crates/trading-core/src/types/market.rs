//! Ticker, balance and position snapshots read from the exchange.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::MarginMode;

/// Latest market snapshot for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub instrument: String,
    /// Last traded price
    pub last: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl Ticker {
    pub fn new(instrument: impl Into<String>, last: Decimal) -> Self {
        Self {
            instrument: instrument.into(),
            last,
            bid: None,
            ask: None,
            timestamp: 0,
        }
    }

    /// Last price, when it is usable for validation (strictly positive).
    pub fn current_price(&self) -> Option<Decimal> {
        Some(self.last).filter(|p| *p > Decimal::ZERO)
    }
}

/// Balance of a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    /// Available balance
    pub free: Decimal,
    /// Frozen in orders or margin
    pub used: Decimal,
    pub total: Decimal,
}

impl Balance {
    pub fn new(currency: impl Into<String>, free: Decimal, used: Decimal) -> Self {
        Self {
            currency: currency.into(),
            free,
            used,
            total: free + used,
        }
    }
}

impl std::fmt::Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} balance: total={:.4}, free={:.4}, used={:.4}",
            self.currency, self.total, self.free, self.used
        )
    }
}

/// Position side as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// One-way mode; the sign of the quantity gives the direction
    #[default]
    Net,
    Long,
    Short,
}

/// An open derivatives position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub side: PositionSide,
    /// Contracts; negative for a short in net mode
    pub quantity: Decimal,
    pub avg_entry_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub leverage: Decimal,
    pub margin_mode: MarginMode,
    pub mark_price: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
}

impl Position {
    /// Create a net-mode cross-margin position.
    pub fn net(instrument: impl Into<String>, quantity: Decimal, avg_entry_price: Decimal) -> Self {
        Self {
            instrument: instrument.into(),
            side: PositionSide::Net,
            quantity,
            avg_entry_price,
            unrealized_pnl: Decimal::ZERO,
            leverage: Decimal::ONE,
            margin_mode: MarginMode::Cross,
            mark_price: None,
            liquidation_price: None,
        }
    }

    /// Check if anything is held.
    pub fn has_position(&self) -> bool {
        !self.quantity.is_zero()
    }

    pub fn is_long(&self) -> bool {
        match self.side {
            PositionSide::Long => self.has_position(),
            PositionSide::Short => false,
            PositionSide::Net => self.quantity > Decimal::ZERO,
        }
    }

    pub fn is_short(&self) -> bool {
        match self.side {
            PositionSide::Short => self.has_position(),
            PositionSide::Long => false,
            PositionSide::Net => self.quantity < Decimal::ZERO,
        }
    }

    /// Get the absolute quantity.
    pub fn abs_quantity(&self) -> Decimal {
        self.quantity.abs()
    }

    /// Refresh the mark price and unrealized P&L.
    ///
    /// Returns `None`, leaving the position untouched, when the P&L does not
    /// fit in a `Decimal`.
    pub fn update_price(&mut self, price: Decimal) -> Option<Decimal> {
        let pnl = price
            .checked_sub(self.avg_entry_price)?
            .checked_mul(self.quantity)?;
        self.mark_price = Some(price);
        self.unrealized_pnl = pnl;
        Some(pnl)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = if self.is_long() {
            "long"
        } else if self.is_short() {
            "short"
        } else {
            "flat"
        };
        write!(
            f,
            "{} {} qty={} entry={} upl={}",
            self.instrument, direction, self.quantity, self.avg_entry_price, self.unrealized_pnl
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_current_price() {
        assert_eq!(Ticker::new("BTC-USDT-SWAP", dec!(50000)).current_price(), Some(dec!(50000)));
        assert_eq!(Ticker::new("BTC-USDT-SWAP", dec!(0)).current_price(), None);
    }

    #[test]
    fn test_net_position_direction() {
        let mut position = Position::net("BTC-USDT-SWAP", dec!(-2), dec!(50000));
        assert!(position.is_short());
        assert!(!position.is_long());
        assert_eq!(position.abs_quantity(), dec!(2));

        assert_eq!(position.update_price(dec!(49000)), Some(dec!(2000)));
        assert_eq!(position.unrealized_pnl, dec!(2000));
    }

    #[test]
    fn test_update_price_overflow_leaves_position_untouched() {
        let mut position = Position::net("BTC-USDT-SWAP", Decimal::MAX, dec!(1));
        assert_eq!(position.update_price(dec!(3)), None);
        assert_eq!(position.mark_price, None);
        assert_eq!(position.unrealized_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_hedge_mode_position_direction() {
        let mut position = Position::net("ETH-USDT-SWAP", dec!(3), dec!(3000));
        position.side = PositionSide::Short;
        assert!(position.is_short());
        assert!(!position.is_long());
    }

    #[test]
    fn test_balance_total() {
        let balance = Balance::new("USDT", dec!(900), dec!(100));
        assert_eq!(balance.total, dec!(1000));
    }
}
