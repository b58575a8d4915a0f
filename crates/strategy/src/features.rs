//! Feature snapshot - the bars a strategy sees at one evaluation tick
//!
//! Prices arrive as `Decimal` bars. Indicator math runs on `f64` series, so the
//! snapshot converts once and hands out plain slices.

use meridian_core::{Bar, Price, Symbol};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::indicators;

/// OHLCV history for one symbol, oldest bar first
#[derive(Debug, Clone)]
pub struct FeatureSnapshot {
    symbol: Symbol,
    bars: Vec<Bar>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

impl FeatureSnapshot {
    pub fn new(symbol: impl Into<Symbol>, bars: Vec<Bar>) -> Self {
        let open = bars.iter().map(|b| to_f64(b.open)).collect();
        let high = bars.iter().map(|b| to_f64(b.high)).collect();
        let low = bars.iter().map(|b| to_f64(b.low)).collect();
        let close = bars.iter().map(|b| to_f64(b.close)).collect();
        let volume = bars.iter().map(|b| to_f64(b.volume)).collect();

        Self {
            symbol: symbol.into(),
            bars,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn opens(&self) -> &[f64] {
        &self.open
    }

    pub fn highs(&self) -> &[f64] {
        &self.high
    }

    pub fn lows(&self) -> &[f64] {
        &self.low
    }

    pub fn closes(&self) -> &[f64] {
        &self.close
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volume
    }

    /// Last close as an exact price
    pub fn last_close_price(&self) -> Option<Price> {
        self.bars.last().map(|b| b.close)
    }

    /// First `len` bars, the view a backtest has at bar `len - 1`
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.min(self.bars.len());
        Self {
            symbol: self.symbol.clone(),
            bars: self.bars[..len].to_vec(),
            open: self.open[..len].to_vec(),
            high: self.high[..len].to_vec(),
            low: self.low[..len].to_vec(),
            close: self.close[..len].to_vec(),
            volume: self.volume[..len].to_vec(),
        }
    }

    /// ATR at the last bar, if defined
    pub fn atr(&self, period: usize) -> Option<f64> {
        indicators::last_valid(&indicators::atr(&self.high, &self.low, &self.close, period))
    }

    /// Latest reading of the standard indicator set
    pub fn indicators(&self) -> IndicatorSnapshot {
        let close = &self.close;
        let macd = indicators::macd(close, 12, 26, 9);
        let bands = indicators::bollinger(close, 20, 2.0);

        IndicatorSnapshot {
            sma_20: indicators::last_valid(&indicators::sma(close, 20)),
            sma_50: indicators::last_valid(&indicators::sma(close, 50)),
            ema_12: indicators::last_valid(&indicators::ema(close, 12)),
            ema_26: indicators::last_valid(&indicators::ema(close, 26)),
            rsi_14: indicators::last_valid(&indicators::rsi(close, 14)),
            macd: indicators::last_valid(&macd.macd),
            macd_signal: indicators::last_valid(&macd.signal),
            bb_upper: indicators::last_valid(&bands.upper),
            bb_lower: indicators::last_valid(&bands.lower),
            atr_14: self.atr(14),
            adx_14: indicators::last_valid(&indicators::adx(&self.high, &self.low, close, 14)),
        }
    }
}

/// Latest values of the standard indicator set
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr_14: Option<f64>,
    pub adx_14: Option<f64>,
}


#[cfg(test)]
mod tests {
    use super::test_support::*;

    #[test]
    fn test_series_conversion() {
        let snap = snapshot(&[100.0, 101.0, 102.5]);
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.closes(), &[100.0, 101.0, 102.5]);
        assert_eq!(snap.highs()[0], 100.5);
        assert_eq!(snap.lows()[2], 102.0);
    }

    #[test]
    fn test_truncated_view() {
        let snap = snapshot(&[1.0, 2.0, 3.0, 4.0]);
        let head = snap.truncated(2);
        assert_eq!(head.closes(), &[1.0, 2.0]);
        assert_eq!(head.bars().len(), 2);
        assert_eq!(snap.truncated(10).len(), 4);
    }

    #[test]
    fn test_indicator_snapshot_warmup() {
        let short = snapshot(&[100.0; 10]);
        let ind = short.indicators();
        assert!(ind.sma_20.is_none());
        assert!(ind.rsi_14.is_none());

        let long = snapshot(&[100.0; 60]);
        let ind = long.indicators();
        assert_eq!(ind.sma_50, Some(100.0));
        assert_eq!(ind.atr_14, Some(1.0));
    }
}
