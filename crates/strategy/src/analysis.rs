//! Market regime and volume analysis
//!
//! Both readings are advisory: strategies use them to scale confidence, never
//! to produce a signal on their own.

use serde::{Deserialize, Serialize};

use crate::features::FeatureSnapshot;
use crate::indicators;

/// Broad market character over the recent window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    TrendingUp,
    TrendingDown,
    Ranging,
    Volatile,
    Quiet,
    Mixed,
}

impl MarketRegime {
    pub fn is_trending(&self) -> bool {
        matches!(self, MarketRegime::TrendingUp | MarketRegime::TrendingDown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeReading {
    pub regime: MarketRegime,
    pub confidence: f64,
    pub adx: f64,
    pub atr_percentile: f64,
}

/// Volume confirmation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSignal {
    Strong,
    Normal,
    Weak,
    /// High volume without a matching price move
    Divergence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeReading {
    pub signal: VolumeSignal,
    pub confidence: f64,
    pub ratio: f64,
}

const ADX_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const SLOPE_WINDOW: usize = 20;
const ATR_HISTORY: usize = 100;
const VOLUME_WINDOW: usize = 20;

/// Classify the regime from ADX, normalized close slope and ATR percentile
pub fn detect_regime(snapshot: &FeatureSnapshot) -> RegimeReading {
    let (high, low, close) = (snapshot.highs(), snapshot.lows(), snapshot.closes());

    // Missing ADX reads as a weak trend
    let adx = indicators::last_valid(&indicators::adx(high, low, close, ADX_PERIOD)).unwrap_or(20.0);

    let price = close.last().copied().unwrap_or(0.0);
    let window = &close[close.len().saturating_sub(SLOPE_WINDOW)..];
    let slope = if price > 0.0 {
        indicators::linear_slope(window) / price
    } else {
        0.0
    };

    let (mut regime, mut confidence) = if adx > 25.0 {
        if slope > 0.001 {
            (MarketRegime::TrendingUp, (adx / 50.0).min(0.95))
        } else if slope < -0.001 {
            (MarketRegime::TrendingDown, (adx / 50.0).min(0.95))
        } else {
            (MarketRegime::Mixed, 0.5)
        }
    } else if adx < 15.0 {
        (MarketRegime::Ranging, ((25.0 - adx) / 25.0).min(0.9))
    } else {
        (MarketRegime::Mixed, 0.5)
    };

    let atr: Vec<f64> = indicators::atr(high, low, close, ATR_PERIOD)
        .into_iter()
        .filter(|v| !v.is_nan())
        .collect();
    let atr_percentile = match atr.last() {
        Some(current) if atr.len() >= ATR_HISTORY => {
            indicators::percentile_rank(&atr[atr.len() - ATR_HISTORY..], *current)
        }
        _ => 0.5,
    };

    if atr_percentile > 0.8 {
        regime = MarketRegime::Volatile;
        confidence = atr_percentile;
    } else if atr_percentile < 0.2 {
        regime = MarketRegime::Quiet;
        confidence = 1.0 - atr_percentile;
    }

    RegimeReading {
        regime,
        confidence,
        adx,
        atr_percentile,
    }
}

/// Compare the latest volume with its 20-bar average
pub fn analyze_volume(snapshot: &FeatureSnapshot) -> VolumeReading {
    let volume = snapshot.volumes();
    let close = snapshot.closes();

    if volume.len() < VOLUME_WINDOW {
        return VolumeReading {
            signal: VolumeSignal::Normal,
            confidence: 0.5,
            ratio: 1.0,
        };
    }

    let current = volume[volume.len() - 1];
    let avg = indicators::mean(&volume[volume.len() - VOLUME_WINDOW..]);
    let ratio = if avg > 0.0 { current / avg } else { 1.0 };

    let change = indicators::pct_returns(&close[close.len() - 2..])
        .first()
        .copied()
        .unwrap_or(0.0);

    let (signal, confidence) = if ratio > 1.5 {
        if change.abs() > 0.015 {
            (VolumeSignal::Strong, (ratio / 2.0).min(0.95))
        } else {
            (VolumeSignal::Divergence, 0.7)
        }
    } else if ratio < 0.5 {
        (VolumeSignal::Weak, 0.3)
    } else {
        (VolumeSignal::Normal, 0.6)
    };

    VolumeReading {
        signal,
        confidence,
        ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::*;

    #[test]
    fn test_steady_uptrend_reads_trending_up() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 2.0 * i as f64).collect();
        let reading = detect_regime(&snapshot(&closes));
        assert_eq!(reading.regime, MarketRegime::TrendingUp);
        assert!(reading.confidence > 0.5 && reading.confidence <= 0.95);
        // Fewer than 100 ATR values
        assert_eq!(reading.atr_percentile, 0.5);
    }

    #[test]
    fn test_steady_downtrend_reads_trending_down() {
        let closes: Vec<f64> = (0..60).map(|i| 300.0 - 2.0 * i as f64).collect();
        let reading = detect_regime(&snapshot(&closes));
        assert_eq!(reading.regime, MarketRegime::TrendingDown);
    }

    #[test]
    fn test_short_history_is_mixed() {
        let reading = detect_regime(&snapshot(&[100.0; 10]));
        assert_eq!(reading.regime, MarketRegime::Mixed);
        assert_eq!(reading.adx, 20.0);
    }

    #[test]
    fn test_volume_classification() {
        let closes = vec![100.0; 25];
        let mut volumes = vec![1_000.0; 25];

        let reading = analyze_volume(&FeatureSnapshot::new("T", bars_with_volume(&closes, &volumes)));
        assert_eq!(reading.signal, VolumeSignal::Normal);

        volumes[24] = 100.0;
        let reading = analyze_volume(&FeatureSnapshot::new("T", bars_with_volume(&closes, &volumes)));
        assert_eq!(reading.signal, VolumeSignal::Weak);

        // Surge on a flat close
        volumes[24] = 5_000.0;
        let reading = analyze_volume(&FeatureSnapshot::new("T", bars_with_volume(&closes, &volumes)));
        assert_eq!(reading.signal, VolumeSignal::Divergence);

        // Surge with a 3% move
        let mut moved = closes.clone();
        moved[24] = 103.0;
        let reading = analyze_volume(&FeatureSnapshot::new("T", bars_with_volume(&moved, &volumes)));
        assert_eq!(reading.signal, VolumeSignal::Strong);
        assert_eq!(reading.confidence, 0.95);
    }
}
