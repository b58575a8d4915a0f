//! Replay market data
//!
//! Serves bars held in memory. Tests and paper sessions push bars one at a
//! time to move the visible history forward.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_core::{Bar, Quote, Symbol};
use meridian_ports::{DataError, DataResult, MarketData};

#[derive(Clone, Default)]
pub struct ReplayMarketData {
    bars: Arc<DashMap<Symbol, Vec<Bar>>>,
    failures: Arc<DashMap<Symbol, DataError>>,
}

impl ReplayMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: Load a full series for `symbol`
    pub fn with_bars(self, symbol: impl Into<Symbol>, bars: Vec<Bar>) -> Self {
        self.set_bars(symbol, bars);
        self
    }

    /// Replace the series for `symbol` (kept in timestamp order)
    pub fn set_bars(&self, symbol: impl Into<Symbol>, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.bars.insert(symbol.into(), bars);
    }

    /// Append one bar to the end of the series
    pub fn push_bar(&self, symbol: impl Into<Symbol>, bar: Bar) {
        self.bars.entry(symbol.into()).or_default().push(bar);
    }

    pub fn last_bar(&self, symbol: &str) -> Option<Bar> {
        self.bars.get(symbol).and_then(|b| b.last().cloned())
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.bars.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    /// Make every fetch for `symbol` fail with `error`
    pub fn fail_symbol(&self, symbol: impl Into<Symbol>, error: DataError) {
        self.failures.insert(symbol.into(), error);
    }

    pub fn clear_failure(&self, symbol: &str) {
        self.failures.remove(symbol);
    }

    fn check_failure(&self, symbol: &str) -> DataResult<()> {
        match self.failures.get(symbol) {
            Some(error) => Err(error.value().clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketData for ReplayMarketData {
    /// Up to `lookback` most recent bars; fewer when the series is shorter
    async fn fetch_bars(&self, symbol: &str, lookback: usize) -> DataResult<Vec<Bar>> {
        self.check_failure(symbol)?;
        let series = self
            .bars
            .get(symbol)
            .ok_or_else(|| DataError::UnknownSymbol(symbol.to_string()))?;
        let start = series.len().saturating_sub(lookback);
        Ok(series[start..].to_vec())
    }

    async fn fetch_quote(&self, symbol: &str) -> DataResult<Quote> {
        self.check_failure(symbol)?;
        let bar = self
            .last_bar(symbol)
            .ok_or_else(|| DataError::UnknownSymbol(symbol.to_string()))?;
        Ok(Quote {
            symbol: symbol.to_string(),
            price: bar.close,
            bid: None,
            ask: None,
            volume: bar.volume,
            timestamp: bar.timestamp,
        })
    }
}
