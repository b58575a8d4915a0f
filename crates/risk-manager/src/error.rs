//! Risk manager errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Trading halted: {reason}")]
    TradingHalted { reason: String },

    #[error("Invalid risk limit: {0}")]
    InvalidLimit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
