//! Multi-timeframe trend alignment
//!
//! Three moving averages stand in for the daily, hourly and intraday views.
//! Price above an average is a bullish vote. The strategy only acts when most
//! votes agree, then scales confidence by regime and volume.

use meridian_core::SignalAction;
use serde::{Deserialize, Serialize};

use crate::analysis::{self, MarketRegime, VolumeSignal};
use crate::error::{Result, SignalError};
use crate::features::FeatureSnapshot;
use crate::indicators::{atr, last_valid, sma};
use crate::strategy::{Decision, Strategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiTimeframeConfig {
    pub daily_period: usize,
    pub hourly_period: usize,
    pub intraday_period: usize,
    /// Fraction of votes that must agree
    pub min_alignment: f64,
    pub min_confidence: f64,
    /// Stop distance in ATRs
    pub stop_atr: f64,
    /// Target distance in ATRs
    pub target_atr: f64,
    pub adx_period: usize,
    pub atr_period: usize,
}

impl Default for MultiTimeframeConfig {
    fn default() -> Self {
        Self {
            daily_period: 50,
            hourly_period: 20,
            intraday_period: 5,
            min_alignment: 0.66, // Two of three
            min_confidence: 0.6,
            stop_atr: 2.5,   // Wider stop than single-timeframe
            target_atr: 4.0, // 1.6 reward:risk
            adx_period: 14,
            atr_period: 14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiTimeframe {
    config: MultiTimeframeConfig,
}

impl MultiTimeframe {
    pub fn new(config: MultiTimeframeConfig) -> Result<Self> {
        let periods = [
            config.daily_period,
            config.hourly_period,
            config.intraday_period,
            config.adx_period,
            config.atr_period,
        ];
        if periods.contains(&0) {
            return Err(SignalError::InvalidParameter(
                "multi-timeframe periods must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&config.min_alignment) {
            return Err(SignalError::InvalidParameter(format!(
                "min_alignment must be within [0, 1], got {}",
                config.min_alignment
            )));
        }
        if config.stop_atr <= 0.0 || config.target_atr <= 0.0 {
            return Err(SignalError::InvalidParameter(
                "stop_atr and target_atr must be positive".into(),
            ));
        }
        Ok(Self { config })
    }

    /// (bullish votes, bearish votes)
    fn votes(&self, close: &[f64]) -> Option<(usize, usize)> {
        let price = *close.last()?;
        let mut bull = 0;
        let mut bear = 0;
        for period in [
            self.config.daily_period,
            self.config.hourly_period,
            self.config.intraday_period,
        ] {
            let avg = last_valid(&sma(close, period))?;
            if price > avg {
                bull += 1;
            } else if price < avg {
                bear += 1;
            }
        }
        Some((bull, bear))
    }
}

impl Strategy for MultiTimeframe {
    fn name(&self) -> &str {
        "multi_timeframe"
    }

    fn lookback(&self) -> usize {
        self.config
            .daily_period
            .max(self.config.hourly_period)
            .max(2 * self.config.adx_period + 1)
    }

    fn evaluate(&self, snapshot: &FeatureSnapshot) -> Result<Option<Decision>> {
        let close = snapshot.closes();
        let Some((bull, bear)) = self.votes(close) else {
            return Ok(None);
        };
        if bull == bear {
            return Ok(None);
        }
        let buying = bull > bear;
        let alignment = bull.max(bear) as f64 / 3.0;
        if alignment < self.config.min_alignment {
            return Ok(None);
        }

        let regime = analysis::detect_regime(snapshot);
        let volume = analysis::analyze_volume(snapshot);

        let trend_agrees = matches!(
            (buying, regime.regime),
            (true, MarketRegime::TrendingUp) | (false, MarketRegime::TrendingDown)
        );

        let mut confidence = alignment;
        if trend_agrees {
            confidence *= 1.2;
        } else if regime.regime == MarketRegime::Ranging {
            confidence *= 0.8;
        }
        confidence *= match volume.signal {
            VolumeSignal::Strong => 1.15,
            VolumeSignal::Weak => 0.7,
            VolumeSignal::Divergence => 0.6,
            VolumeSignal::Normal => 1.0,
        };
        let confidence = confidence.min(0.95);
        if confidence < self.config.min_confidence {
            return Ok(None);
        }

        let strong = alignment >= 0.85 && trend_agrees;
        let action = match (buying, strong) {
            (true, true) => SignalAction::StrongBuy,
            (true, false) => SignalAction::Buy,
            (false, true) => SignalAction::StrongSell,
            (false, false) => SignalAction::Sell,
        };

        let price = close[close.len() - 1];
        let atr = last_valid(&atr(
            snapshot.highs(),
            snapshot.lows(),
            close,
            self.config.atr_period,
        ))
        .unwrap_or(price * 0.02);
        let (stop, target) = if buying {
            (price - self.config.stop_atr * atr, price + self.config.target_atr * atr)
        } else {
            (price + self.config.stop_atr * atr, price - self.config.target_atr * atr)
        };

        let reasoning = format!(
            "{bull} bullish / {bear} bearish timeframes, regime {:?} ({:.2}), volume {:?}",
            regime.regime, regime.confidence, volume.signal
        );
        Ok(Some(
            Decision::new(action, confidence, reasoning)
                .with_stop_loss(stop)
                .with_take_profit(target),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::snapshot;

    fn strategy() -> MultiTimeframe {
        MultiTimeframe::new(MultiTimeframeConfig::default()).unwrap()
    }

    #[test]
    fn test_aligned_uptrend_is_strong_buy() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let decision = strategy().evaluate(&snapshot(&closes)).unwrap().unwrap();

        assert_eq!(decision.action, SignalAction::StrongBuy);
        assert_eq!(decision.confidence, 0.95);
        // ATR 1.5: stop 159 - 3.75, target 159 + 6
        assert!((decision.stop_loss.unwrap() - 155.25).abs() < 1e-9);
        assert!((decision.take_profit.unwrap() - 165.0).abs() < 1e-9);
    }

    #[test]
    fn test_aligned_downtrend_is_strong_sell() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let decision = strategy().evaluate(&snapshot(&closes)).unwrap().unwrap();
        assert_eq!(decision.action, SignalAction::StrongSell);
        assert!(decision.stop_loss.unwrap() > 141.0);
    }

    #[test]
    fn test_flat_market_holds() {
        assert!(strategy().evaluate(&snapshot(&[100.0; 60])).unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_alignment() {
        let config = MultiTimeframeConfig {
            min_alignment: 1.5,
            ..Default::default()
        };
        assert!(MultiTimeframe::new(config).is_err());
    }
}
