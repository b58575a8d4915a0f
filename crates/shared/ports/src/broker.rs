use async_trait::async_trait;
use meridian_core::{AccountState, OrderStatus, OrderType, Price, Quantity, Side, Symbol, TimeInForce};
use serde::{Deserialize, Serialize};

use crate::error::BrokerResult;

/// Order as sent across the broker boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub client_order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    pub order_type: OrderType,
    pub limit_price: Option<Price>,
    pub stop_price: Option<Price>,
    pub time_in_force: TimeInForce,
}

/// Broker acknowledgement of an order (cumulative fill state)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub broker_order_id: String,
    pub status: OrderStatus,
    pub filled_qty: Quantity,
    pub avg_price: Option<Price>,
}

/// Position as reported by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: Symbol,
    pub qty: Quantity,
    pub avg_entry_price: Price,
    pub current_price: Price,
}

/// Port to an execution venue
#[async_trait]
pub trait Broker: Send + Sync {
    /// Submit an order
    async fn place_order(&self, ticket: &OrderTicket) -> BrokerResult<OrderAck>;

    /// Cancel a live order
    async fn cancel_order(&self, broker_order_id: &str) -> BrokerResult<()>;

    /// Current state of an order
    async fn get_order(&self, broker_order_id: &str) -> BrokerResult<OrderAck>;

    /// Account balances
    async fn get_account(&self) -> BrokerResult<AccountState>;

    /// Open positions held at the broker
    async fn get_positions(&self) -> BrokerResult<Vec<BrokerPosition>>;
}
