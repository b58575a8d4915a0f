//! Volatility breakout
//!
//! Bands sit one ATR multiple beyond the recent range. A close through a band
//! is a breakout, optionally confirmed by a volume surge.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::features::FeatureSnapshot;
use crate::indicators::{atr, last_valid, mean};
use crate::strategy::{Decision, Strategy};

const VOLUME_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakoutConfig {
    pub atr_period: usize,
    /// ATR multiple added beyond the range
    pub multiplier: f64,
    /// Bars forming the range, excluding the current bar
    pub range_lookback: usize,
    pub volume_confirmation: bool,
    /// Required volume as a multiple of the 20-bar average
    pub volume_surge: f64,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            multiplier: 2.0,
            range_lookback: 20,
            volume_confirmation: true,
            volume_surge: 1.5, // 150% of average volume
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolatilityBreakout {
    config: BreakoutConfig,
}

impl VolatilityBreakout {
    pub fn new(config: BreakoutConfig) -> Result<Self> {
        if config.atr_period == 0 || config.range_lookback == 0 {
            return Err(SignalError::InvalidParameter(
                "breakout periods must be positive".into(),
            ));
        }
        if config.multiplier <= 0.0 {
            return Err(SignalError::InvalidParameter(format!(
                "breakout multiplier must be positive, got {}",
                config.multiplier
            )));
        }
        Ok(Self { config })
    }

    fn volume_confirmed(&self, volume: &[f64]) -> bool {
        if volume.len() < VOLUME_WINDOW {
            return false;
        }
        let avg = mean(&volume[volume.len() - VOLUME_WINDOW..]);
        volume[volume.len() - 1] > avg * self.config.volume_surge
    }
}

impl Strategy for VolatilityBreakout {
    fn name(&self) -> &str {
        "volatility_breakout"
    }

    fn lookback(&self) -> usize {
        self.config
            .range_lookback
            .max(self.config.atr_period)
            .max(VOLUME_WINDOW)
            + 1
    }

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>> {
        let (high, low, close) = (snapshot.highs(), snapshot.lows(), snapshot.closes());
        let n = close.len();
        if n < self.config.range_lookback + 2 {
            return Ok(None);
        }
        let Some(atr) = last_valid(&atr(high, low, close, self.config.atr_period)) else {
            return Ok(None);
        };

        let range = n - 1 - self.config.range_lookback..n - 1;
        let recent_high = high[range.clone()].iter().copied().fold(f64::MIN, f64::max);
        let recent_low = low[range].iter().copied().fold(f64::MAX, f64::min);

        let band = atr * self.config.multiplier;
        let upper = recent_high + band;
        let lower = recent_low - band;
        let (price, prev) = (close[n - 1], close[n - 2]);

        let confirmed = self.volume_confirmed(snapshot.volumes());
        if self.config.volume_confirmation && !confirmed {
            if price > upper || price < lower {
                log::debug!(
                    "[Breakout] {} band break at {:.2} without volume surge",
                    snapshot.symbol(),
                    price
                );
            }
            return Ok(None);
        }
        let confidence = if self.config.volume_confirmation { 0.8 } else { 0.7 };

        if price > upper && prev <= upper {
            return Ok(Some(
                Decision::buy(confidence, format!("close {price:.2} broke above {upper:.2}"))
                    .with_stop_loss(price - band),
            ));
        }
        if price < lower && prev >= lower {
            return Ok(Some(
                Decision::sell(confidence, format!("close {price:.2} broke below {lower:.2}"))
                    .with_stop_loss(price + band),
            ));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::bars_with_volume;
    use meridian_core::SignalAction;

    fn snapshot(last_close: f64, last_volume: f64) -> FeatureSnapshot {
        let mut closes = vec![100.0; 30];
        let mut volumes = vec![1_000.0; 30];
        closes[29] = last_close;
        volumes[29] = last_volume;
        FeatureSnapshot::new("BRK", bars_with_volume(&closes, &volumes))
    }

    #[test]
    fn test_upside_breakout_with_volume() {
        let s = VolatilityBreakout::new(BreakoutConfig::default()).unwrap();
        let decision = s.evaluate(&snapshot(104.0, 5_000.0)).unwrap().unwrap();

        assert_eq!(decision.action, SignalAction::Buy);
        assert!((decision.confidence - 0.8).abs() < 1e-9);
        // ATR = (13 * 1.0 + 4.5) / 14 = 1.25, band = 2.5
        let stop = decision.stop_loss.unwrap();
        assert!((stop - 101.5).abs() < 1e-9, "stop={stop}");
    }

    #[test]
    fn test_breakout_without_volume_is_ignored() {
        let s = VolatilityBreakout::new(BreakoutConfig::default()).unwrap();
        assert!(s.evaluate(&snapshot(104.0, 1_000.0)).unwrap().is_none());

        let s = VolatilityBreakout::new(BreakoutConfig {
            volume_confirmation: false,
            ..Default::default()
        })
        .unwrap();
        let decision = s.evaluate(&snapshot(104.0, 1_000.0)).unwrap().unwrap();
        assert!((decision.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_downside_breakout_uses_range_low() {
        let s = VolatilityBreakout::new(BreakoutConfig::default()).unwrap();
        let decision = s.evaluate(&snapshot(96.0, 5_000.0)).unwrap().unwrap();
        assert_eq!(decision.action, SignalAction::Sell);
        assert!(decision.stop_loss.unwrap() > 96.0);
    }

    #[test]
    fn test_inside_range_holds() {
        let s = VolatilityBreakout::new(BreakoutConfig::default()).unwrap();
        assert!(s.evaluate(&snapshot(101.0, 5_000.0)).unwrap().is_none());
    }
}
