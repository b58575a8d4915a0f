//! Signal generator
//!
//! Wraps a strategy decision into a `Signal`: attaches the reference price and
//! ATR, clamps confidence, and stamps the signal with the last bar's time.

use meridian_core::{Price, Signal, SignalAction};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::features::FeatureSnapshot;
use crate::params::StrategyParams;
use crate::strategy::{Decision, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalGenerator {
    /// Minimum bars before any strategy is evaluated
    pub min_bars: usize,
    /// Upper bound on emitted confidence
    pub max_confidence: f64,
    /// ATR period for the volatility reading attached to signals
    pub atr_period: usize,
}

impl Default for SignalGenerator {
    fn default() -> Self {
        Self {
            min_bars: 50,
            max_confidence: 0.95,
            atr_period: 14,
        }
    }
}

fn to_price(value: f64) -> Result<Price> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(4))
        .ok_or_else(|| SignalError::Indicator(format!("value {value} is not representable as a price")))
}

impl SignalGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_bars(mut self, min_bars: usize) -> Self {
        self.min_bars = min_bars;
        self
    }

    pub fn with_max_confidence(mut self, max_confidence: f64) -> Self {
        self.max_confidence = max_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_atr_period(mut self, atr_period: usize) -> Self {
        self.atr_period = atr_period;
        self
    }

    /// Build the strategy from `params` and evaluate it. `Ok(None)` is HOLD.
    pub fn generate(
        &self,
        strategy_id: &str,
        snapshot: &FeatureSnapshot,
        params: &StrategyParams,
    ) -> Result<Option<Signal>> {
        let strategy = params.build()?;
        self.generate_with(strategy_id, strategy.as_ref(), snapshot)
    }

    /// Evaluate an already-built strategy
    pub fn generate_with(
        &self,
        strategy_id: &str,
        strategy: &dyn Strategy,
        snapshot: &FeatureSnapshot,
    ) -> Result<Option<Signal>> {
        let required = self.min_bars.max(strategy.lookback());
        if snapshot.len() < required {
            log::debug!(
                "[{}] {} has {} bars, needs {}",
                strategy_id,
                snapshot.symbol(),
                snapshot.len(),
                required
            );
            return Ok(None);
        }

        let Some(decision) = strategy.evaluate(snapshot)? else {
            return Ok(None);
        };
        if decision.action == SignalAction::Hold {
            return Ok(None);
        }
        self.wrap(strategy_id, snapshot, decision).map(Some)
    }

    fn wrap(&self, strategy_id: &str, snapshot: &FeatureSnapshot, decision: Decision) -> Result<Signal> {
        let bar = snapshot.last_bar().ok_or(SignalError::InsufficientData {
            required: 1,
            available: 0,
        })?;

        let confidence = to_price(decision.confidence.clamp(0.0, self.max_confidence))?;
        let mut signal = Signal::new(strategy_id, snapshot.symbol(), decision.action, bar.close)
            .with_confidence(confidence)
            .with_reasoning(decision.reasoning)
            .with_timestamp(bar.timestamp);

        if let Some(atr) = snapshot.atr(self.atr_period) {
            signal = signal.with_atr(to_price(atr)?);
        }
        if let Some(stop) = decision.stop_loss {
            signal = signal.with_stop_loss(to_price(stop)?);
        }
        if let Some(target) = decision.take_profit {
            signal = signal.with_take_profit(to_price(target)?);
        }

        log::info!(
            "[{}] {:?} {} @ {} (confidence {})",
            strategy_id,
            signal.action,
            signal.symbol,
            signal.price,
            signal.confidence
        );
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossover::CrossoverConfig;
    use crate::features::test_support::snapshot;
    use crate::momentum::QuickTestConfig;
    use rust_decimal_macros::dec;

    const CROSSING: [f64; 7] = [100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 103.0];

    fn fast_crossover() -> StrategyParams {
        StrategyParams::MaCrossover(CrossoverConfig {
            fast_period: 2,
            slow_period: 5,
        })
    }

    #[test]
    fn test_holds_below_min_bars() {
        let generator = SignalGenerator::new();
        let signal = generator
            .generate("trend", &snapshot(&CROSSING), &fast_crossover())
            .unwrap();
        assert!(signal.is_none());
    }

    #[test]
    fn test_wraps_decision() {
        let generator = SignalGenerator::new().with_min_bars(5).with_atr_period(3);
        let snap = snapshot(&CROSSING);
        let signal = generator
            .generate("trend", &snap, &fast_crossover())
            .unwrap()
            .unwrap();

        assert_eq!(signal.strategy_id, "trend");
        assert_eq!(signal.symbol, "TEST");
        assert_eq!(signal.action, SignalAction::Buy);
        assert_eq!(signal.price, dec!(103));
        assert_eq!(signal.timestamp, snap.last_bar().unwrap().timestamp);
        assert!(signal.confidence > dec!(0.6) && signal.confidence < dec!(0.7));
        assert!(signal.atr.is_some());
    }

    #[test]
    fn test_confidence_is_capped() {
        let generator = SignalGenerator::new().with_min_bars(2).with_max_confidence(0.5);
        let signal = generator
            .generate(
                "quick",
                &snapshot(&[100.0, 101.0]),
                &StrategyParams::QuickTest(QuickTestConfig::default()),
            )
            .unwrap()
            .unwrap();
        assert_eq!(signal.confidence, dec!(0.5));
    }

    #[test]
    fn test_invalid_params_error() {
        let bad = StrategyParams::MaCrossover(CrossoverConfig {
            fast_period: 10,
            slow_period: 5,
        });
        let err = SignalGenerator::new()
            .generate("bad", &snapshot(&[100.0; 60]), &bad)
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidParameter(_)));
    }
}
