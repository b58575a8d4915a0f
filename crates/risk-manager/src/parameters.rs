//! Risk limits
//!
//! All limits are fractions of portfolio value.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Halt when the day's loss reaches this fraction of the starting value
    pub max_daily_loss_pct: Decimal,
    /// Reject entries that would push heat to or past this
    pub max_heat: Decimal,
    /// Halve entries that would push heat to or past this
    pub warning_heat: Decimal,
    /// Cap on a correlated cluster's market value
    pub max_correlated_exposure: Decimal,
    /// Pearson correlation at which two symbols cluster
    pub correlation_threshold: f64,
    /// Return observations used for correlation
    pub lookback_days: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: dec!(0.02),      // 2% daily loss
            max_heat: dec!(0.06),                // 6% of capital at risk
            warning_heat: dec!(0.04),            // 4% starts halving
            max_correlated_exposure: dec!(0.15), // 15% per cluster
            correlation_threshold: 0.7,
            lookback_days: 60,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: Decimal| {
            if v <= Decimal::ZERO || v > Decimal::ONE {
                Err(Error::InvalidLimit(format!("{name} must be within (0, 1], got {v}")))
            } else {
                Ok(())
            }
        };
        fraction("max_daily_loss_pct", self.max_daily_loss_pct)?;
        fraction("max_heat", self.max_heat)?;
        fraction("warning_heat", self.warning_heat)?;
        fraction("max_correlated_exposure", self.max_correlated_exposure)?;

        if self.warning_heat > self.max_heat {
            return Err(Error::InvalidLimit(format!(
                "warning_heat ({}) exceeds max_heat ({})",
                self.warning_heat, self.max_heat
            )));
        }
        if !(-1.0..=1.0).contains(&self.correlation_threshold) {
            return Err(Error::InvalidLimit(format!(
                "correlation_threshold must be within [-1, 1], got {}",
                self.correlation_threshold
            )));
        }
        if self.lookback_days < 2 {
            return Err(Error::InvalidLimit("lookback_days must be at least 2".into()));
        }
        Ok(())
    }
}
