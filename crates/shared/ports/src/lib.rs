//! Meridian Ports
//!
//! Port definitions (traits) for the Meridian trading runtime.
//! These define the boundaries between domain logic and infrastructure:
//!
//! - [`Broker`]: order placement, cancels, account and position queries
//! - [`MarketData`]: historical bars and latest quotes
//! - [`Notifier`]: outbound alerts (delivery mechanics live elsewhere)
//! - [`Clock`]: time source

mod broker;
mod clock;
mod error;
mod market_data;
mod notify;

pub use broker::{Broker, BrokerPosition, OrderAck, OrderTicket};
pub use clock::Clock;
pub use error::{BrokerError, BrokerResult, DataError, DataResult};
pub use market_data::MarketData;
pub use notify::{Alert, AlertKind, AlertLevel, Notifier};
