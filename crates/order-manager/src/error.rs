//! Order Manager errors

use meridian_core::{OrderError, OrderId, Quantity};
use meridian_ports::BrokerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Unknown order: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {0} has no broker id")]
    NotSubmitted(OrderId),

    #[error("Position already open for {strategy_id}/{symbol}")]
    PositionExists { strategy_id: String, symbol: String },

    #[error("No open position for {strategy_id}/{symbol}")]
    PositionNotFound { strategy_id: String, symbol: String },

    #[error("Close of {requested} {symbol} exceeds open position {open}")]
    CloseExceedsPosition {
        symbol: String,
        requested: Quantity,
        open: Quantity,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(Quantity),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
