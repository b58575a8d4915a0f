use thiserror::Error;

/// Failures at the broker boundary
///
/// None of these are fatal to the scheduler: an order that hits one is
/// marked rejected with the message and the worker moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Failures at the market-data boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Insufficient history for {symbol}: need {required}, have {available}")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        available: usize,
    },

    #[error("Market data unavailable: {0}")]
    Unavailable(String),
}

pub type DataResult<T> = std::result::Result<T, DataError>;
