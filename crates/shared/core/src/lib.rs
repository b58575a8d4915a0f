//! Meridian Core Domain
//!
//! Pure domain types for the Meridian trading runtime: bars, signals,
//! orders and their state machine, positions and closed-trade records.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    AccountState,
    Bar,
    CloseReason,
    // Orders
    Order,
    OrderId,
    OrderRequest,
    OrderStatus,
    OrderTransition,
    OrderType,
    // Positions & trades
    Position,
    Quote,
    Side,
    // Signals
    Signal,
    SignalAction,
    TimeInForce,
    TradeRecord,
};
pub use error::OrderError;
pub use values::{Price, Quantity, StrategyId, Symbol, Timestamp};
