//! RSI band reversion

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::features::FeatureSnapshot;
use crate::indicators::{last_valid, rsi};
use crate::strategy::{Decision, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,   // Buy below
            overbought: 70.0, // Sell above
        }
    }
}

#[derive(Debug, Clone)]
pub struct RsiReversion {
    config: RsiConfig,
}

impl RsiReversion {
    pub fn new(config: RsiConfig) -> Result<Self> {
        if config.period == 0 {
            return Err(SignalError::InvalidParameter("rsi period must be positive".into()));
        }
        if !(0.0..=100.0).contains(&config.oversold)
            || !(0.0..=100.0).contains(&config.overbought)
            || config.oversold >= config.overbought
        {
            return Err(SignalError::InvalidParameter(format!(
                "rsi bands must satisfy 0 <= oversold ({}) < overbought ({}) <= 100",
                config.oversold, config.overbought
            )));
        }
        Ok(Self { config })
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn lookback(&self) -> usize {
        self.config.period + 1
    }

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>> {
        let Some(value) = last_valid(&rsi(snapshot.closes(), self.config.period)) else {
            return Ok(None);
        };

        if value < self.config.oversold {
            let distance = self.config.oversold - value;
            return Ok(Some(Decision::buy(
                0.6 + (distance / 100.0).min(0.3),
                format!("RSI {value:.1} below {}", self.config.oversold),
            )));
        }
        if value > self.config.overbought {
            let distance = value - self.config.overbought;
            return Ok(Some(Decision::sell(
                0.6 + (distance / 100.0).min(0.3),
                format!("RSI {value:.1} above {}", self.config.overbought),
            )));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::snapshot;
    use meridian_core::SignalAction;

    #[test]
    fn test_falling_series_is_oversold() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let s = RsiReversion::new(RsiConfig::default()).unwrap();
        let decision = s.evaluate(&snapshot(&closes)).unwrap().unwrap();
        assert_eq!(decision.action, SignalAction::Buy);
        // RSI 0, distance 30
        assert!((decision.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_rising_series_is_overbought() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let s = RsiReversion::new(RsiConfig::default()).unwrap();
        let decision = s.evaluate(&snapshot(&closes)).unwrap().unwrap();
        assert_eq!(decision.action, SignalAction::Sell);
    }

    #[test]
    fn test_invalid_bands() {
        let config = RsiConfig {
            oversold: 80.0,
            overbought: 20.0,
            ..Default::default()
        };
        assert!(RsiReversion::new(config).is_err());
    }
}
