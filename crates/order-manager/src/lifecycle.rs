//! Order Lifecycle
//!
//! Synchronous order store. Every state change goes through the transition
//! methods on `Order`, so the status graph is enforced in one place; this
//! module adds lookup, logging and the collapsed submit-and-fill path used by
//! backtests.

use std::collections::HashMap;

use chrono::Duration;
use log::{debug, info, warn};
use meridian_core::{Order, OrderId, OrderRequest, OrderStatus, Price, Quantity, Timestamp};

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct OrderManager {
    orders: HashMap<OrderId, Order>,
    /// Creation order, for stable query results
    sequence: Vec<OrderId>,
}

impl OrderManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut(&mut self, id: OrderId) -> Result<&mut Order> {
        self.orders.get_mut(&id).ok_or(Error::OrderNotFound(id))
    }

    /// Validate and store a new order in `Pending`
    pub fn create(&mut self, request: OrderRequest, at: Timestamp) -> Result<OrderId> {
        let order = Order::new(request, at)?;
        let id = order.id;
        info!(
            "[ORDER] Created {} {} {} {} ({:?})",
            order.client_order_id,
            order.side.as_str(),
            order.quantity,
            order.symbol,
            order.order_type
        );
        self.sequence.push(id);
        self.orders.insert(id, order);
        Ok(id)
    }

    pub fn mark_submitted(&mut self, id: OrderId, broker_order_id: &str, at: Timestamp) -> Result<()> {
        let order = self.get_mut(id)?;
        order.mark_submitted(broker_order_id, at)?;
        debug!("[ORDER] {} submitted as {}", order.client_order_id, broker_order_id);
        Ok(())
    }

    pub fn reject(&mut self, id: OrderId, message: &str, at: Timestamp) -> Result<()> {
        let order = self.get_mut(id)?;
        order.reject(message, at)?;
        warn!("[ORDER] {} rejected: {}", order.client_order_id, message);
        Ok(())
    }

    pub fn apply_fill(&mut self, id: OrderId, quantity: Quantity, price: Price, at: Timestamp) -> Result<()> {
        let order = self.get_mut(id)?;
        order.apply_fill(quantity, price, at)?;
        info!(
            "[ORDER] {} filled {} @ {} ({}/{})",
            order.client_order_id, quantity, price, order.filled_quantity, order.quantity
        );
        Ok(())
    }

    /// Apply a broker's cumulative fill report
    pub fn apply_cumulative_fill(
        &mut self,
        id: OrderId,
        cumulative: Quantity,
        avg_price: Price,
        at: Timestamp,
    ) -> Result<()> {
        let order = self.get_mut(id)?;
        let before = order.filled_quantity;
        order.apply_cumulative_fill(cumulative, avg_price, at)?;
        if order.filled_quantity > before {
            info!(
                "[ORDER] {} filled to {}/{} @ {}",
                order.client_order_id, order.filled_quantity, order.quantity, avg_price
            );
        }
        Ok(())
    }

    /// Cancel a live order; canceling a terminal order is an error
    pub fn cancel(&mut self, id: OrderId, at: Timestamp) -> Result<()> {
        let order = self.get_mut(id)?;
        order.cancel(at)?;
        info!("[ORDER] {} canceled", order.client_order_id);
        Ok(())
    }

    pub fn expire(&mut self, id: OrderId, at: Timestamp) -> Result<()> {
        let order = self.get_mut(id)?;
        order.expire(at)?;
        info!("[ORDER] {} expired", order.client_order_id);
        Ok(())
    }

    /// Create, submit and completely fill an order in one step
    ///
    /// For backtests, where there is no broker round trip.
    pub fn simulate_fill(&mut self, request: OrderRequest, price: Price, at: Timestamp) -> Result<Order> {
        let id = self.create(request, at)?;
        let order = self.get_mut(id)?;
        let broker_id = format!("sim-{}", order.client_order_id);
        order.mark_submitted(broker_id, at)?;
        let quantity = order.quantity;
        order.apply_fill(quantity, price, at)?;
        Ok(order.clone())
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn find_by_client_id(&self, client_order_id: &str) -> Option<&Order> {
        self.orders.values().find(|o| o.client_order_id == client_order_id)
    }

    fn iter(&self) -> impl Iterator<Item = &Order> {
        self.sequence.iter().filter_map(|id| self.orders.get(id))
    }

    /// Orders not yet in a terminal state
    pub fn open_orders(&self) -> Vec<&Order> {
        self.iter().filter(|o| !o.status.is_terminal()).collect()
    }

    pub fn filled_orders(&self) -> Vec<&Order> {
        self.iter().filter(|o| o.status == OrderStatus::Filled).collect()
    }

    pub fn orders_for_symbol(&self, symbol: &str) -> Vec<&Order> {
        self.iter().filter(|o| o.symbol == symbol).collect()
    }

    pub fn orders_for_strategy(&self, strategy_id: &str) -> Vec<&Order> {
        self.iter()
            .filter(|o| o.strategy_id.as_deref() == Some(strategy_id))
            .collect()
    }

    /// Drop terminal orders created more than `days` before `now`
    pub fn clear_old_orders(&mut self, days: i64, now: Timestamp) -> usize {
        let cutoff = now - Duration::days(days);
        let before = self.orders.len();
        self.orders
            .retain(|_, o| !(o.status.is_terminal() && o.created_at < cutoff));
        let orders = &self.orders;
        self.sequence.retain(|id| orders.contains_key(id));

        let removed = before - self.orders.len();
        if removed > 0 {
            info!("[ORDER] Cleared {} orders older than {} days", removed, days);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use meridian_core::{OrderError, OrderType, Side};
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_full_lifecycle() {
        let mut manager = OrderManager::new();
        let id = manager
            .create(OrderRequest::market("AAPL", Side::Buy, dec!(100)), t0())
            .unwrap();
        assert_eq!(manager.get(id).unwrap().status, OrderStatus::Pending);

        manager.mark_submitted(id, "B-1", t0()).unwrap();
        manager.apply_fill(id, dec!(40), dec!(10), t0()).unwrap();
        assert_eq!(manager.get(id).unwrap().status, OrderStatus::PartiallyFilled);
        assert_eq!(manager.open_orders().len(), 1);

        manager.apply_fill(id, dec!(60), dec!(11), t0()).unwrap();
        let order = manager.get(id).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_avg_price, Some(dec!(10.6)));
        assert!(manager.open_orders().is_empty());
        assert_eq!(manager.filled_orders().len(), 1);
    }

    #[test]
    fn test_invalid_request_never_reaches_pending() {
        let mut manager = OrderManager::new();
        let request = OrderRequest::new("AAPL", Side::Buy, dec!(10), OrderType::Limit);
        let err = manager.create(request, t0()).unwrap_err();
        assert!(matches!(err, Error::Order(OrderError::MissingLimitPrice { .. })));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_cancel_terminal_is_error() {
        let mut manager = OrderManager::new();
        let id = manager
            .create(OrderRequest::market("AAPL", Side::Buy, dec!(10)), t0())
            .unwrap();
        manager.reject(id, "insufficient buying power", t0()).unwrap();

        let err = manager.cancel(id, t0()).unwrap_err();
        assert!(matches!(err, Error::Order(OrderError::InvalidTransition { .. })));
        assert_eq!(
            manager.get(id).unwrap().error_message.as_deref(),
            Some("insufficient buying power")
        );
    }

    #[test]
    fn test_simulate_fill() {
        let mut manager = OrderManager::new();
        let order = manager
            .simulate_fill(
                OrderRequest::market("MSFT", Side::Buy, dec!(25)).with_strategy("bt"),
                dec!(300),
                t0(),
            )
            .unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, dec!(25));
        assert_eq!(order.filled_avg_price, Some(dec!(300)));
        let statuses: Vec<_> = order.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            statuses,
            vec![OrderStatus::Pending, OrderStatus::Submitted, OrderStatus::Filled]
        );
        assert_eq!(manager.orders_for_strategy("bt").len(), 1);
        assert_eq!(manager.orders_for_symbol("MSFT").len(), 1);
    }

    #[test]
    fn test_clear_old_orders_keeps_live_ones() {
        let mut manager = OrderManager::new();
        let old_filled = manager
            .simulate_fill(OrderRequest::market("A", Side::Buy, dec!(1)), dec!(10), t0())
            .unwrap()
            .id;
        let old_live = manager
            .create(OrderRequest::market("B", Side::Buy, dec!(1)), t0())
            .unwrap();
        manager.mark_submitted(old_live, "B-2", t0()).unwrap();

        let removed = manager.clear_old_orders(7, t0() + Duration::days(30));
        assert_eq!(removed, 1);
        assert!(manager.get(old_filled).is_none());
        assert!(manager.get(old_live).is_some());
    }
}
