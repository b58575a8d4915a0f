//! Rate-of-change momentum and the one-bar quick test

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::features::FeatureSnapshot;
use crate::strategy::{Decision, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub lookback: usize,
    /// Minimum rate of change to act on
    pub threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            threshold: 0.02, // 2% over the lookback
        }
    }
}

/// Buys above +threshold change over `lookback` bars, sells below -threshold
#[derive(Debug, Clone)]
pub struct Momentum {
    config: MomentumConfig,
}

impl Momentum {
    pub fn new(config: MomentumConfig) -> Result<Self> {
        if config.lookback == 0 {
            return Err(SignalError::InvalidParameter("momentum lookback must be positive".into()));
        }
        if config.threshold <= 0.0 {
            return Err(SignalError::InvalidParameter(format!(
                "momentum threshold must be positive, got {}",
                config.threshold
            )));
        }
        Ok(Self { config })
    }
}

/// Change of the last close versus the close `bars` back
fn rate_of_change(close: &[f64], bars: usize) -> Option<f64> {
    let n = close.len();
    if n <= bars {
        return None;
    }
    let base = close[n - 1 - bars];
    if base == 0.0 {
        return None;
    }
    Some(close[n - 1] / base - 1.0)
}

impl Strategy for Momentum {
    fn name(&self) -> &str {
        "momentum"
    }

    fn lookback(&self) -> usize {
        self.config.lookback + 1
    }

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>> {
        let Some(roc) = rate_of_change(snapshot.closes(), self.config.lookback) else {
            return Ok(None);
        };
        let threshold = self.config.threshold;
        let confidence = 0.6 + ((roc.abs() - threshold) * 5.0).min(0.3);

        if roc > threshold {
            return Ok(Some(Decision::buy(
                confidence,
                format!("{:.2}% over {} bars", roc * 100.0, self.config.lookback),
            )));
        }
        if roc < -threshold {
            return Ok(Some(Decision::sell(
                confidence,
                format!("{:.2}% over {} bars", roc * 100.0, self.config.lookback),
            )));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickTestConfig {
    pub threshold: f64,
}

impl Default for QuickTestConfig {
    fn default() -> Self {
        Self {
            threshold: 0.001, // 0.1% bar to bar
        }
    }
}

/// Fires on any one-bar move beyond the threshold; used to exercise the pipeline
#[derive(Debug, Clone)]
pub struct QuickTest {
    config: QuickTestConfig,
}

impl QuickTest {
    pub fn new(config: QuickTestConfig) -> Result<Self> {
        if config.threshold < 0.0 {
            return Err(SignalError::InvalidParameter(format!(
                "quick test threshold must not be negative, got {}",
                config.threshold
            )));
        }
        Ok(Self { config })
    }
}

impl Strategy for QuickTest {
    fn name(&self) -> &str {
        "quick_test"
    }

    fn lookback(&self) -> usize {
        2
    }

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>> {
        let Some(change) = rate_of_change(snapshot.closes(), 1) else {
            return Ok(None);
        };
        if change > self.config.threshold {
            return Ok(Some(Decision::buy(0.6, format!("up {:.3}% on the bar", change * 100.0))));
        }
        if change < -self.config.threshold {
            return Ok(Some(Decision::sell(0.6, format!("down {:.3}% on the bar", change * 100.0))));
        }
        Ok(None)
    }
}
