//! Order Routing
//!
//! Async boundary between the order store and the broker. The store lock is
//! held only to read or mutate orders; every broker call happens with the
//! lock released.

use std::sync::Arc;

use log::{info, warn};
use meridian_core::{Order, OrderId, OrderRequest, OrderStatus};
use meridian_ports::{Broker, Clock, OrderAck, OrderTicket};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::lifecycle::OrderManager;

fn ticket(order: &Order) -> OrderTicket {
    OrderTicket {
        client_order_id: order.client_order_id.clone(),
        symbol: order.symbol.clone(),
        side: order.side,
        quantity: order.quantity,
        order_type: order.order_type,
        limit_price: order.limit_price,
        stop_price: order.stop_price,
        time_in_force: order.time_in_force,
    }
}

/// Reconcile a stored order with a broker acknowledgement
fn apply_ack(orders: &mut OrderManager, id: OrderId, ack: &OrderAck, clock: &dyn Clock) -> Result<()> {
    let now = clock.now();
    let status = orders.get(id).map(|o| o.status).ok_or(Error::OrderNotFound(id))?;

    if ack.status == OrderStatus::Rejected {
        if !status.is_terminal() {
            orders.reject(id, "rejected by broker", now)?;
        }
        return Ok(());
    }
    if status == OrderStatus::Pending {
        orders.mark_submitted(id, &ack.broker_order_id, now)?;
    }
    if let Some(avg_price) = ack.avg_price
        && ack.filled_qty > rust_decimal::Decimal::ZERO
    {
        orders.apply_cumulative_fill(id, ack.filled_qty, avg_price, now)?;
    }

    let status = orders.get(id).map(|o| o.status).ok_or(Error::OrderNotFound(id))?;
    match ack.status {
        OrderStatus::Canceled if status.is_active() => orders.cancel(id, now)?,
        OrderStatus::Expired if status.is_active() => orders.expire(id, now)?,
        _ => {}
    }
    Ok(())
}

/// Submits, cancels and reconciles orders against a broker
#[derive(Clone)]
pub struct OrderRouter {
    orders: Arc<Mutex<OrderManager>>,
    broker: Arc<dyn Broker>,
    clock: Arc<dyn Clock>,
}

impl OrderRouter {
    pub fn new(orders: Arc<Mutex<OrderManager>>, broker: Arc<dyn Broker>, clock: Arc<dyn Clock>) -> Self {
        Self { orders, broker, clock }
    }

    pub fn orders(&self) -> &Arc<Mutex<OrderManager>> {
        &self.orders
    }

    /// Create and place an order
    ///
    /// A broker error does not fail the call: the order is returned in
    /// `Rejected` with the broker's message. Validation failures are errors
    /// and never reach the store.
    pub async fn submit(&self, request: OrderRequest) -> Result<Order> {
        let (id, ticket) = {
            let mut orders = self.orders.lock().await;
            let id = orders.create(request, self.clock.now())?;
            let order = orders.get(id).ok_or(Error::OrderNotFound(id))?;
            (id, ticket(order))
        };

        let placed = self.broker.place_order(&ticket).await;

        let mut orders = self.orders.lock().await;
        match placed {
            Ok(ack) => {
                apply_ack(&mut orders, id, &ack, self.clock.as_ref())?;
                info!(
                    "[ORDER] {} placed as {} ({:?})",
                    ticket.client_order_id, ack.broker_order_id, ack.status
                );
            }
            Err(e) => {
                warn!("[ORDER] {} failed at broker: {}", ticket.client_order_id, e);
                orders.reject(id, &e.to_string(), self.clock.now())?;
            }
        }
        orders.get(id).cloned().ok_or(Error::OrderNotFound(id))
    }

    async fn broker_id(&self, id: OrderId) -> Result<String> {
        let orders = self.orders.lock().await;
        let order = orders.get(id).ok_or(Error::OrderNotFound(id))?;
        order.broker_order_id.clone().ok_or(Error::NotSubmitted(id))
    }

    /// Cancel at the broker, then reconcile with its final report
    pub async fn cancel(&self, id: OrderId) -> Result<Order> {
        let broker_id = self.broker_id(id).await?;
        self.broker.cancel_order(&broker_id).await?;
        let ack = self.broker.get_order(&broker_id).await?;

        let mut orders = self.orders.lock().await;
        apply_ack(&mut orders, id, &ack, self.clock.as_ref())?;
        let order = orders.get(id).cloned().ok_or(Error::OrderNotFound(id))?;
        if order.status.is_active() {
            // Broker confirmed the cancel but still reports the order live
            orders.cancel(id, self.clock.now())?;
            return orders.get(id).cloned().ok_or(Error::OrderNotFound(id));
        }
        Ok(order)
    }

    /// Poll the broker and apply any new fills or terminal status
    pub async fn sync(&self, id: OrderId) -> Result<Order> {
        let broker_id = self.broker_id(id).await?;
        let ack = self.broker.get_order(&broker_id).await?;

        let mut orders = self.orders.lock().await;
        apply_ack(&mut orders, id, &ack, self.clock.as_ref())?;
        orders.get(id).cloned().ok_or(Error::OrderNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meridian_core::{AccountState, Side};
    use meridian_ports::{BrokerError, BrokerPosition, BrokerResult};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex as StdMutex;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> meridian_core::Timestamp {
            chrono::Utc::now()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Scripted broker: returns queued acks or a fixed error
    struct ScriptedBroker {
        place: StdMutex<Vec<BrokerResult<OrderAck>>>,
        report: StdMutex<Option<OrderAck>>,
    }

    impl ScriptedBroker {
        fn new(place: Vec<BrokerResult<OrderAck>>) -> Self {
            Self {
                place: StdMutex::new(place),
                report: StdMutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Broker for ScriptedBroker {
        async fn place_order(&self, _ticket: &OrderTicket) -> BrokerResult<OrderAck> {
            self.place.lock().unwrap().remove(0)
        }

        async fn cancel_order(&self, _id: &str) -> BrokerResult<()> {
            Ok(())
        }

        async fn get_order(&self, id: &str) -> BrokerResult<OrderAck> {
            self.report
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| BrokerError::NotFound(id.to_string()))
        }

        async fn get_account(&self) -> BrokerResult<AccountState> {
            Ok(AccountState::with_cash(dec!(100000)))
        }

        async fn get_positions(&self) -> BrokerResult<Vec<BrokerPosition>> {
            Ok(Vec::new())
        }
    }

    fn router(broker: Arc<ScriptedBroker>) -> OrderRouter {
        OrderRouter::new(Arc::new(Mutex::new(OrderManager::new())), broker, Arc::new(FixedClock))
    }

    fn ack(status: OrderStatus, filled: Decimal, avg: Option<Decimal>) -> OrderAck {
        OrderAck {
            broker_order_id: "B-7".into(),
            status,
            filled_qty: filled,
            avg_price: avg,
        }
    }

    #[tokio::test]
    async fn test_submit_filled_immediately() {
        let broker = Arc::new(ScriptedBroker::new(vec![Ok(ack(
            OrderStatus::Filled,
            dec!(10),
            Some(dec!(50)),
        ))]));
        let order = router(broker)
            .submit(OrderRequest::market("AAPL", Side::Buy, dec!(10)))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.broker_order_id.as_deref(), Some("B-7"));
        assert_eq!(order.filled_avg_price, Some(dec!(50)));
    }

    #[tokio::test]
    async fn test_broker_error_rejects_with_message() {
        let broker = Arc::new(ScriptedBroker::new(vec![Err(BrokerError::Rejected(
            "insufficient buying power".into(),
        ))]));
        let order = router(broker)
            .submit(OrderRequest::market("AAPL", Side::Buy, dec!(10)))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(order.error_message.unwrap().contains("insufficient buying power"));
    }

    #[tokio::test]
    async fn test_sync_applies_later_fill() {
        let broker = Arc::new(ScriptedBroker::new(vec![Ok(ack(
            OrderStatus::Submitted,
            Decimal::ZERO,
            None,
        ))]));
        let router = router(broker.clone());
        let order = router
            .submit(OrderRequest::limit("AAPL", Side::Buy, dec!(10), dec!(49)))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Submitted);

        *broker.report.lock().unwrap() = Some(ack(OrderStatus::PartiallyFilled, dec!(4), Some(dec!(49))));
        let order = router.sync(order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.filled_quantity, dec!(4));

        *broker.report.lock().unwrap() = Some(ack(OrderStatus::Canceled, dec!(4), Some(dec!(49))));
        let order = router.cancel(order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.filled_quantity, dec!(4));
    }
}
