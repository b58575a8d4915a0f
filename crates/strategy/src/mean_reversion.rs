//! Z-score mean reversion
//!
//! Buys when the close sits far below its rolling mean (expects a move back
//! up), sells when it sits far above.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::features::FeatureSnapshot;
use crate::indicators::{mean, sample_std};
use crate::strategy::{Decision, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    /// Window for mean and standard deviation
    pub lookback: usize,
    /// Entry threshold in standard deviations
    pub z_threshold: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            z_threshold: 2.0, // 2 sigma from the mean
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeanReversion {
    config: MeanReversionConfig,
}

impl MeanReversion {
    pub fn new(config: MeanReversionConfig) -> Result<Self> {
        if config.lookback < 2 {
            return Err(SignalError::InvalidParameter(
                "mean reversion lookback must be at least 2".into(),
            ));
        }
        if config.z_threshold <= 0.0 {
            return Err(SignalError::InvalidParameter(format!(
                "z_threshold must be positive, got {}",
                config.z_threshold
            )));
        }
        Ok(Self { config })
    }

    /// Z-score of the last close against the lookback window
    fn z_score(&self, close: &[f64]) -> Option<f64> {
        if close.len() < self.config.lookback {
            return None;
        }
        let window = &close[close.len() - self.config.lookback..];
        let std = sample_std(window);
        if std == 0.0 {
            return None;
        }
        Some((window[window.len() - 1] - mean(window)) / std)
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn lookback(&self) -> usize {
        self.config.lookback
    }

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>> {
        let Some(z) = self.z_score(snapshot.closes()) else {
            return Ok(None);
        };
        let threshold = self.config.z_threshold;
        let confidence = 0.6 + ((z.abs() - threshold) / 10.0).min(0.3);

        if z < -threshold {
            log::debug!("[MeanReversion] {} z={:.2} below -{}", snapshot.symbol(), z, threshold);
            return Ok(Some(Decision::buy(confidence, format!("z-score {z:.2} below -{threshold}"))));
        }
        if z > threshold {
            log::debug!("[MeanReversion] {} z={:.2} above {}", snapshot.symbol(), z, threshold);
            return Ok(Some(Decision::sell(confidence, format!("z-score {z:.2} above {threshold}"))));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::snapshot;
    use meridian_core::SignalAction;

    fn strategy() -> MeanReversion {
        MeanReversion::new(MeanReversionConfig::default()).unwrap()
    }

    #[test]
    fn test_flat_series_holds() {
        // std = 0
        assert!(strategy().evaluate(&snapshot(&[50.0; 25])).unwrap().is_none());
    }

    #[test]
    fn test_drop_below_band_buys() {
        let mut closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        closes[19] = 90.0;
        let decision = strategy().evaluate(&snapshot(&closes)).unwrap().unwrap();
        assert_eq!(decision.action, SignalAction::Buy);
        assert!(decision.confidence >= 0.6);
    }

    #[test]
    fn test_spike_above_band_sells() {
        let mut closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        closes[19] = 110.0;
        let decision = strategy().evaluate(&snapshot(&closes)).unwrap().unwrap();
        assert_eq!(decision.action, SignalAction::Sell);
    }

    #[test]
    fn test_rejects_nonpositive_threshold() {
        let config = MeanReversionConfig {
            z_threshold: 0.0,
            ..Default::default()
        };
        assert!(MeanReversion::new(config).is_err());
    }
}
