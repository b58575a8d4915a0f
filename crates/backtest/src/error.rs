//! Backtester errors

use meridian_strategy::SignalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Invalid backtest config: {0}")]
    InvalidConfig(String),

    #[error("No symbol has the {warmup} bars needed to start")]
    NoData { warmup: usize },

    #[error("Invalid strategy parameters: {0}")]
    Strategy(#[from] SignalError),

    #[error(transparent)]
    Order(#[from] meridian_order_manager::Error),
}

pub type Result<T> = std::result::Result<T, BacktestError>;
