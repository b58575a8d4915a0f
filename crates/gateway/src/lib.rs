//! Meridian Gateway
//!
//! Adapters behind the `meridian-ports` traits. Currently in-process only:
//!
//! ```text
//!   OrderRouter ──► Broker ◄──────── PaperBroker (fills at marked prices)
//!   Scheduler   ──► MarketData ◄──── ReplayMarketData (bars from memory)
//! ```
//!
//! Live venues plug in by implementing the same two traits.

pub mod adapters;

pub use adapters::{PaperBroker, ReplayMarketData};
