//! Signal generation errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Invalid strategy parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient data: need {required} bars, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Indicator error: {0}")]
    Indicator(String),
}

pub type Result<T> = std::result::Result<T, SignalError>;
