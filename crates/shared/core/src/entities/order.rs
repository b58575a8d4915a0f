use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, OrderType, Side, TimeInForce};
use crate::error::OrderError;
use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Unique identifier for an order
pub type OrderId = Uuid;

/// What a caller asks for before an order exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub order_type: OrderType,
    /// Required for Limit and StopLimit orders
    pub limit_price: Option<Price>,
    /// Required for Stop, StopLimit and TrailingStop orders
    pub stop_price: Option<Price>,
    pub time_in_force: TimeInForce,
    /// Strategy that originated the order (None for manual orders)
    pub strategy_id: Option<String>,
}

impl OrderRequest {
    pub fn new(symbol: impl Into<Symbol>, side: Side, quantity: Quantity, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::default(),
            strategy_id: None,
        }
    }

    /// Market order request
    pub fn market(symbol: impl Into<Symbol>, side: Side, quantity: Quantity) -> Self {
        Self::new(symbol, side, quantity, OrderType::Market)
    }

    /// Limit order request
    pub fn limit(symbol: impl Into<Symbol>, side: Side, quantity: Quantity, limit: Price) -> Self {
        Self::new(symbol, side, quantity, OrderType::Limit).with_limit_price(limit)
    }

    /// Stop (market-on-trigger) order request
    pub fn stop(symbol: impl Into<Symbol>, side: Side, quantity: Quantity, stop: Price) -> Self {
        Self::new(symbol, side, quantity, OrderType::Stop).with_stop_price(stop)
    }

    pub fn with_limit_price(mut self, price: Price) -> Self {
        self.limit_price = Some(price);
        self
    }

    pub fn with_stop_price(mut self, price: Price) -> Self {
        self.stop_price = Some(price);
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_strategy(mut self, strategy_id: impl Into<String>) -> Self {
        self.strategy_id = Some(strategy_id.into());
        self
    }

    /// Validate the request based on order type requirements
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidQuantity(self.quantity));
        }
        if self.order_type.requires_limit_price() {
            match self.limit_price {
                None => {
                    return Err(OrderError::MissingLimitPrice {
                        order_type: self.order_type,
                    });
                }
                Some(p) if p <= Decimal::ZERO => return Err(OrderError::InvalidPrice(p)),
                Some(_) => {}
            }
        }
        if self.order_type.requires_stop_price() {
            match self.stop_price {
                None => {
                    return Err(OrderError::MissingStopPrice {
                        order_type: self.order_type,
                    });
                }
                Some(p) if p <= Decimal::ZERO => return Err(OrderError::InvalidPrice(p)),
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// A recorded status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransition {
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub at: Timestamp,
}

/// Full order details
///
/// Fields only change through the transition methods below, which enforce
/// the status graph in [`OrderStatus::can_transition_to`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Client-side identifier sent to the broker
    pub client_order_id: String,
    pub strategy_id: Option<String>,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub limit_price: Option<Price>,
    pub stop_price: Option<Price>,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    /// Identifier assigned by the broker on acceptance
    pub broker_order_id: Option<String>,
    pub filled_quantity: Quantity,
    /// Quantity-weighted average over all fills
    pub filled_avg_price: Option<Price>,
    pub created_at: Timestamp,
    pub submitted_at: Option<Timestamp>,
    pub filled_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    /// Broker or validation message for rejected orders
    pub error_message: Option<String>,
    pub transitions: Vec<OrderTransition>,
}

impl Order {
    /// Create a validated order in `Pending`
    pub fn new(request: OrderRequest, created_at: Timestamp) -> Result<Self, OrderError> {
        request.validate()?;

        let id = Uuid::new_v4();
        let client_order_id = format!(
            "mrd_{}_{}",
            created_at.timestamp_millis(),
            &id.simple().to_string()[..8]
        );

        Ok(Self {
            id,
            client_order_id,
            strategy_id: request.strategy_id,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            time_in_force: request.time_in_force,
            status: OrderStatus::Pending,
            broker_order_id: None,
            filled_quantity: Decimal::ZERO,
            filled_avg_price: None,
            created_at,
            submitted_at: None,
            filled_at: None,
            canceled_at: None,
            error_message: None,
            transitions: vec![OrderTransition {
                from: None,
                to: OrderStatus::Pending,
                at: created_at,
            }],
        })
    }

    fn transition(&mut self, to: OrderStatus, at: Timestamp) -> Result<(), OrderError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        if self.status != to {
            self.transitions.push(OrderTransition {
                from: Some(self.status),
                to,
                at,
            });
            self.status = to;
        }
        Ok(())
    }

    /// Pending -> Submitted on broker acceptance
    pub fn mark_submitted(
        &mut self,
        broker_order_id: impl Into<String>,
        at: Timestamp,
    ) -> Result<(), OrderError> {
        self.transition(OrderStatus::Submitted, at)?;
        self.broker_order_id = Some(broker_order_id.into());
        self.submitted_at = Some(at);
        Ok(())
    }

    /// Record an incremental fill
    pub fn apply_fill(
        &mut self,
        quantity: Quantity,
        price: Price,
        at: Timestamp,
    ) -> Result<(), OrderError> {
        if quantity <= Decimal::ZERO {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if price <= Decimal::ZERO {
            return Err(OrderError::InvalidPrice(price));
        }
        if self.filled_quantity + quantity > self.quantity {
            return Err(OrderError::Overfill {
                fill: quantity,
                filled: self.filled_quantity,
                quantity: self.quantity,
            });
        }

        let new_filled = self.filled_quantity + quantity;
        let next = if new_filled == self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.transition(next, at)?;

        let prior_cost = self.filled_quantity * self.filled_avg_price.unwrap_or(Decimal::ZERO);
        self.filled_avg_price = Some((prior_cost + quantity * price) / new_filled);
        self.filled_quantity = new_filled;
        if next == OrderStatus::Filled {
            self.filled_at = Some(at);
        }
        Ok(())
    }

    /// Reconcile with a broker report of cumulative fill state
    ///
    /// Brokers report total filled quantity and overall average price, so the
    /// increment is derived from the difference. Reports that do not advance
    /// the filled quantity are ignored.
    pub fn apply_cumulative_fill(
        &mut self,
        cumulative_quantity: Quantity,
        avg_price: Price,
        at: Timestamp,
    ) -> Result<(), OrderError> {
        let delta = cumulative_quantity - self.filled_quantity;
        if delta <= Decimal::ZERO {
            return Ok(());
        }
        let prior_cost = self.filled_quantity * self.filled_avg_price.unwrap_or(Decimal::ZERO);
        let increment_price = (cumulative_quantity * avg_price - prior_cost) / delta;
        self.apply_fill(delta, increment_price, at)?;
        self.filled_avg_price = Some(avg_price);
        Ok(())
    }

    /// Submitted | PartiallyFilled -> Canceled
    pub fn cancel(&mut self, at: Timestamp) -> Result<(), OrderError> {
        self.transition(OrderStatus::Canceled, at)?;
        self.canceled_at = Some(at);
        Ok(())
    }

    /// Pending | Submitted -> Rejected, keeping the message verbatim
    pub fn reject(&mut self, message: impl Into<String>, at: Timestamp) -> Result<(), OrderError> {
        self.transition(OrderStatus::Rejected, at)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Submitted | PartiallyFilled -> Expired
    pub fn expire(&mut self, at: Timestamp) -> Result<(), OrderError> {
        self.transition(OrderStatus::Expired, at)
    }

    /// Returns remaining quantity to be filled
    pub fn remaining_quantity(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    /// Returns true if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Filled notional at the average price
    pub fn filled_notional(&self) -> Decimal {
        self.filled_quantity * self.filled_avg_price.unwrap_or(Decimal::ZERO)
    }
}
