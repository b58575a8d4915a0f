use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Price, Quantity, Symbol, Timestamp};

/// An open long position held by one strategy in one symbol
///
/// Only entry state is stored; P&L figures are derived from a mark price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Strategy that owns this position
    pub strategy_id: String,
    /// Symbol being held
    pub symbol: Symbol,
    /// Open share count (always positive)
    pub shares: Quantity,
    /// Average entry price
    pub entry_price: Price,
    /// When the position was opened
    pub entry_time: Timestamp,
    /// Protective stop level
    pub stop_loss: Option<Price>,
    /// Profit target level
    pub take_profit: Option<Price>,
}

impl Position {
    /// Market value at a mark price
    pub fn market_value(&self, mark: Price) -> Decimal {
        self.shares * mark
    }

    /// Cost basis at entry
    pub fn cost_basis(&self) -> Decimal {
        self.shares * self.entry_price
    }

    /// Unrealized PnL at a mark price
    pub fn unrealized_pnl(&self, mark: Price) -> Decimal {
        self.shares * (mark - self.entry_price)
    }

    /// Unrealized PnL as a percentage of entry
    pub fn pnl_pct(&self, mark: Price) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (mark - self.entry_price) / self.entry_price * Decimal::ONE_HUNDRED
    }

    /// Dollars lost if the stop is hit (zero without a stop)
    pub fn risk_amount(&self) -> Decimal {
        self.stop_loss
            .map(|stop| (self.entry_price - stop).abs() * self.shares)
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn position(stop: Option<Decimal>) -> Position {
        Position {
            strategy_id: "ma_crossover".to_string(),
            symbol: "AAPL".to_string(),
            shares: dec!(100),
            entry_price: dec!(50),
            entry_time: Utc::now(),
            stop_loss: stop,
            take_profit: None,
        }
    }

    #[test]
    fn test_derived_pnl() {
        let pos = position(None);
        assert_eq!(pos.unrealized_pnl(dec!(55)), dec!(500));
        assert_eq!(pos.pnl_pct(dec!(55)), dec!(10));
        assert_eq!(pos.market_value(dec!(55)), dec!(5500));
    }

    #[test]
    fn test_risk_amount_uses_entry_to_stop_distance() {
        assert_eq!(position(Some(dec!(48))).risk_amount(), dec!(200));
        assert_eq!(position(None).risk_amount(), Decimal::ZERO);
    }
}
