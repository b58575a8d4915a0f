//! Backtest configuration

use meridian_order_manager::SizingPolicy;
use meridian_strategy::{SignalGenerator, StrategyParams};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Strategy id stamped on orders, positions and trade records
    pub strategy_id: String,
    pub params: StrategyParams,
    pub generator: SignalGenerator,
    /// Split evenly across the symbols that have enough bars
    pub initial_capital: Decimal,
    /// Bars skipped before the first evaluation
    pub warmup_bars: usize,
    /// Trailing bars handed to the strategy each step
    pub lookback_bars: usize,
    /// Entries below this confidence are ignored
    pub min_confidence: Decimal,
    pub sizing: SizingPolicy,
    /// Charged on the notional of every fill
    pub commission_rate: Decimal,
    /// Stop distance in ATRs when the signal carries no stop
    pub stop_multiplier: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            strategy_id: "backtest".to_string(),
            params: StrategyParams::default(),
            generator: SignalGenerator::default(),
            initial_capital: dec!(100000),                        // $100k
            warmup_bars: 50,                                      // indicator warm-up
            lookback_bars: 100,                                   // same window as live
            min_confidence: dec!(0.6),                            // 60%
            sizing: SizingPolicy::FixedPercent { pct: dec!(0.95) }, // 95% of equity
            commission_rate: dec!(0.001),                         // 0.1% per fill
            stop_multiplier: dec!(2),                             // 2 ATR
        }
    }
}

impl BacktestConfig {
    pub fn new(strategy_id: impl Into<String>, params: StrategyParams) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            params,
            ..Self::default()
        }
    }

    pub fn with_generator(mut self, generator: SignalGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_initial_capital(mut self, capital: Decimal) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_warmup_bars(mut self, bars: usize) -> Self {
        self.warmup_bars = bars;
        self
    }

    pub fn with_sizing(mut self, sizing: SizingPolicy) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_commission_rate(mut self, rate: Decimal) -> Self {
        self.commission_rate = rate;
        self
    }

    pub fn with_min_confidence(mut self, confidence: Decimal) -> Self {
        self.min_confidence = confidence;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategy_id.is_empty() {
            return Err(BacktestError::InvalidConfig("strategy_id must not be empty".into()));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::InvalidConfig(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.lookback_bars == 0 {
            return Err(BacktestError::InvalidConfig("lookback_bars must be at least 1".into()));
        }
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(BacktestError::InvalidConfig(format!(
                "commission_rate must be in [0, 1), got {}",
                self.commission_rate
            )));
        }
        if self.min_confidence < Decimal::ZERO || self.min_confidence > Decimal::ONE {
            return Err(BacktestError::InvalidConfig(format!(
                "min_confidence must be in [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.stop_multiplier <= Decimal::ZERO {
            return Err(BacktestError::InvalidConfig(format!(
                "stop_multiplier must be positive, got {}",
                self.stop_multiplier
            )));
        }
        Ok(())
    }
}
