//! Signal - What strategies output
//!
//! Strategies don't place orders. They emit a signal stating the action they
//! want and how confident they are; sizing and risk gating decide the rest.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::{Price, Symbol, Timestamp};

/// Action requested by a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl SignalAction {
    pub fn is_buy(&self) -> bool {
        matches!(self, SignalAction::Buy | SignalAction::StrongBuy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, SignalAction::Sell | SignalAction::StrongSell)
    }
}

/// Signal from a strategy for one symbol at one evaluation tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Which strategy generated this signal
    pub strategy_id: String,
    /// Symbol to trade
    pub symbol: Symbol,
    pub action: SignalAction,
    /// Confidence in the signal (0.0 - 1.0)
    pub confidence: Decimal,
    /// Reference price at evaluation (last close)
    pub price: Price,
    /// Optional: Stop loss price
    pub stop_loss: Option<Price>,
    /// Optional: Take profit price
    pub take_profit: Option<Price>,
    /// Average true range at evaluation, when available
    pub atr: Option<Price>,
    /// Human-readable explanation
    pub reasoning: String,
    /// When the signal was generated
    pub timestamp: Timestamp,
}

impl Signal {
    /// Create a new signal
    pub fn new(
        strategy_id: impl Into<String>,
        symbol: impl Into<Symbol>,
        action: SignalAction,
        price: Price,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            action,
            confidence: Decimal::ONE,
            price,
            stop_loss: None,
            take_profit: None,
            atr: None,
            reasoning: String::new(),
            timestamp: Utc::now(),
        }
    }

    /// Builder: Set confidence
    pub fn with_confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = confidence.clamp(Decimal::ZERO, Decimal::ONE);
        self
    }

    /// Builder: Set stop loss
    pub fn with_stop_loss(mut self, price: Price) -> Self {
        self.stop_loss = Some(price);
        self
    }

    /// Builder: Set take profit
    pub fn with_take_profit(mut self, price: Price) -> Self {
        self.take_profit = Some(price);
        self
    }

    /// Builder: Set ATR reading
    pub fn with_atr(mut self, atr: Price) -> Self {
        self.atr = Some(atr);
        self
    }

    /// Builder: Set reasoning
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Builder: Set timestamp (bar time in backtests)
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_buy(&self) -> bool {
        self.action.is_buy()
    }

    pub fn is_sell(&self) -> bool {
        self.action.is_sell()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signal_creation() {
        let signal = Signal::new("ma_crossover", "AAPL", SignalAction::Buy, dec!(101.5))
            .with_confidence(dec!(0.8))
            .with_stop_loss(dec!(98))
            .with_reasoning("fast above slow");

        assert_eq!(signal.strategy_id, "ma_crossover");
        assert_eq!(signal.symbol, "AAPL");
        assert_eq!(signal.confidence, dec!(0.8));
        assert_eq!(signal.stop_loss, Some(dec!(98)));
        assert!(signal.is_buy());
        assert!(!signal.is_sell());
    }

    #[test]
    fn test_confidence_clamping() {
        let signal = Signal::new("test", "AAPL", SignalAction::Sell, dec!(10)).with_confidence(dec!(1.5));
        assert_eq!(signal.confidence, Decimal::ONE);

        let signal = Signal::new("test", "AAPL", SignalAction::Sell, dec!(10)).with_confidence(dec!(-0.2));
        assert_eq!(signal.confidence, Decimal::ZERO);
    }

    #[test]
    fn test_strong_actions_count_as_direction() {
        assert!(SignalAction::StrongBuy.is_buy());
        assert!(SignalAction::StrongSell.is_sell());
        assert!(!SignalAction::Hold.is_buy());
        assert!(!SignalAction::Hold.is_sell());
    }
}
