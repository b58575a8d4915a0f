//! Error types for the runner crate

use std::time::Duration;

use meridian_core::{OrderStatus, Quantity, Symbol};
use meridian_ports::BrokerError;
use meridian_strategy::SignalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Strategy {0} is already running")]
    AlreadyRunning(String),

    #[error("Strategy {0} is not running")]
    NotRunning(String),

    #[error("Strategy {id} did not stop within {timeout:?}; task aborted")]
    Unresponsive { id: String, timeout: Duration },

    #[error("Invalid strategy parameters: {0}")]
    Strategy(#[from] SignalError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Order(#[from] meridian_order_manager::Error),

    #[error("Exit for {symbol} not filled: {filled} of {requested} sold ({status:?})")]
    ExitNotFilled {
        symbol: Symbol,
        status: OrderStatus,
        filled: Quantity,
        requested: Quantity,
    },

    #[error("Strategy {id} stopped after {errors} consecutive errors; last: {last}")]
    TooManyErrors { id: String, errors: u32, last: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
