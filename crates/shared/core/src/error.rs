//! Domain errors

use crate::entities::{OrderStatus, OrderType};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while building or transitioning an order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("{order_type:?} order requires a limit price")]
    MissingLimitPrice { order_type: OrderType },

    #[error("{order_type:?} order requires a stop price")]
    MissingStopPrice { order_type: OrderType },

    #[error("Order quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("Order price must be positive, got {0}")]
    InvalidPrice(Decimal),

    #[error("Invalid order transition: {from:?} -> {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Fill of {fill} would exceed order quantity {quantity} (already filled {filled})")]
    Overfill {
        fill: Decimal,
        filled: Decimal,
        quantity: Decimal,
    },
}
