//! Paper adapters
//!
//! In-process `Broker` and `MarketData` implementations used for paper
//! trading sessions and as test doubles.

mod broker;
mod market_data;

pub use broker::PaperBroker;
pub use market_data::ReplayMarketData;
