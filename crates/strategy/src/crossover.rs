//! Moving-average crossover

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::features::FeatureSnapshot;
use crate::indicators::sma;
use crate::strategy::{Decision, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            fast_period: 10, // Fast SMA
            slow_period: 30, // Slow SMA
        }
    }
}

/// Buys when the fast SMA crosses above the slow SMA, sells on the reverse
#[derive(Debug, Clone)]
pub struct MaCrossover {
    config: CrossoverConfig,
}

impl MaCrossover {
    pub fn new(config: CrossoverConfig) -> Result<Self> {
        if config.fast_period == 0 || config.fast_period >= config.slow_period {
            return Err(SignalError::InvalidParameter(format!(
                "fast_period ({}) must be positive and below slow_period ({})",
                config.fast_period, config.slow_period
            )));
        }
        Ok(Self { config })
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn lookback(&self) -> usize {
        self.config.slow_period + 1
    }

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>> {
        let close = snapshot.closes();
        let n = close.len();
        if n < self.lookback() {
            return Ok(None);
        }

        let fast = sma(close, self.config.fast_period);
        let slow = sma(close, self.config.slow_period);
        let (prev_fast, prev_slow) = (fast[n - 2], slow[n - 2]);
        let (cur_fast, cur_slow) = (fast[n - 1], slow[n - 1]);

        if cur_slow <= 0.0 {
            return Ok(None);
        }
        let confidence = 0.6 + (10.0 * (cur_fast - cur_slow).abs() / cur_slow).min(0.3);

        if prev_fast <= prev_slow && cur_fast > cur_slow {
            return Ok(Some(Decision::buy(
                confidence,
                format!("fast SMA {cur_fast:.2} crossed above slow SMA {cur_slow:.2}"),
            )));
        }
        if prev_fast >= prev_slow && cur_fast < cur_slow {
            return Ok(Some(Decision::sell(
                confidence,
                format!("fast SMA {cur_fast:.2} crossed below slow SMA {cur_slow:.2}"),
            )));
        }
        Ok(None)
    }
}
