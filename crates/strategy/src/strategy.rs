//! Strategy trait
//!
//! A strategy is a pure function of a feature snapshot. It never sees the
//! account, positions or orders; it only says what it would do and how sure
//! it is.

use meridian_core::SignalAction;

use crate::error::Result;
use crate::features::FeatureSnapshot;

/// Raw strategy output before the generator wraps it into a `Signal`
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: SignalAction,
    /// Unclamped confidence
    pub confidence: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
}

impl Decision {
    pub fn new(action: SignalAction, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            action,
            confidence,
            stop_loss: None,
            take_profit: None,
            reasoning: reasoning.into(),
        }
    }

    pub fn buy(confidence: f64, reasoning: impl Into<String>) -> Self {
        Self::new(SignalAction::Buy, confidence, reasoning)
    }

    pub fn sell(confidence: f64, reasoning: impl Into<String>) -> Self {
        Self::new(SignalAction::Sell, confidence, reasoning)
    }

    pub fn with_stop_loss(mut self, price: f64) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: f64) -> Self {
        self.take_profit = Some(price);
        self
    }
}

/// Signal strategy interface
///
/// `evaluate` returns `Ok(None)` for HOLD.
pub trait Strategy: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Bars needed before `evaluate` can produce anything
    fn lookback(&self) -> usize;

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>>;
}
