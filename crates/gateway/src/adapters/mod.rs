//! Venue adapters
//!
//! Implementations of the `Broker` and `MarketData` ports.

pub mod paper;

pub use paper::{PaperBroker, ReplayMarketData};
