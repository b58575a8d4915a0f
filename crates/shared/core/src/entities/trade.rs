use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Position;
use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Strategy emitted a sell signal
    Signal,
    /// Price reached the protective stop
    StopLoss,
    /// Price reached the profit target
    TakeProfit,
    /// Backtest ended with the position still open
    EndOfRun,
    /// Closed by an emergency stop
    Forced,
}

/// Immutable record of a closed (or partially closed) position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy_id: String,
    pub symbol: Symbol,
    pub shares: Quantity,
    pub entry_price: Price,
    pub exit_price: Price,
    pub entry_time: Timestamp,
    pub exit_time: Timestamp,
    /// Realized PnL: (exit - entry) * shares
    pub pnl: Decimal,
    /// Percentage return on the entry price
    pub return_pct: Decimal,
    pub close_reason: CloseReason,
}

impl TradeRecord {
    /// Build the record for closing `shares` of `position` at `exit_price`
    pub fn from_close(
        position: &Position,
        shares: Quantity,
        exit_price: Price,
        exit_time: Timestamp,
        close_reason: CloseReason,
    ) -> Self {
        let pnl = (exit_price - position.entry_price) * shares;
        let return_pct = if position.entry_price.is_zero() {
            Decimal::ZERO
        } else {
            (exit_price - position.entry_price) / position.entry_price * Decimal::ONE_HUNDRED
        };

        Self {
            strategy_id: position.strategy_id.clone(),
            symbol: position.symbol.clone(),
            shares,
            entry_price: position.entry_price,
            exit_price,
            entry_time: position.entry_time,
            exit_time,
            pnl,
            return_pct,
            close_reason,
        }
    }

    pub fn holding_duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn days_held(&self) -> i64 {
        self.holding_duration().num_days()
    }

    pub fn is_win(&self) -> bool {
        self.pnl > Decimal::ZERO
    }
}
