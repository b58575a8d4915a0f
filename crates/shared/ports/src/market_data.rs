use async_trait::async_trait;
use meridian_core::{Bar, Quote};

use crate::error::DataResult;

/// Port to a source of bars and quotes
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent `lookback` bars, oldest first
    async fn fetch_bars(&self, symbol: &str, lookback: usize) -> DataResult<Vec<Bar>>;

    /// Latest quote
    async fn fetch_quote(&self, symbol: &str) -> DataResult<Quote>;
}
