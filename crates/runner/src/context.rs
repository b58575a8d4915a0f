//! Trading context
//!
//! Shared state handed to every strategy worker. Each mutable component
//! sits behind its own tokio `Mutex`; none of them is held across a broker
//! or market-data call.

use std::sync::Arc;

use meridian_order_manager::{OrderManager, OrderRouter, PositionLedger, TradeHistory};
use meridian_ports::{Alert, Broker, Clock, MarketData, Notifier};
use meridian_risk_manager::RiskGate;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct TradingContext {
    pub ledger: Arc<Mutex<PositionLedger>>,
    pub risk: Arc<Mutex<RiskGate>>,
    pub orders: Arc<Mutex<OrderManager>>,
    pub history: Arc<Mutex<TradeHistory>>,
    pub broker: Arc<dyn Broker>,
    pub market_data: Arc<dyn MarketData>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl TradingContext {
    pub fn new(
        risk: RiskGate,
        broker: Arc<dyn Broker>,
        market_data: Arc<dyn MarketData>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(PositionLedger::new())),
            risk: Arc::new(Mutex::new(risk)),
            orders: Arc::new(Mutex::new(OrderManager::new())),
            history: Arc::new(Mutex::new(TradeHistory::new())),
            broker,
            market_data,
            notifier,
            clock,
        }
    }

    /// Router over this context's order store and broker
    pub fn router(&self) -> OrderRouter {
        OrderRouter::new(self.orders.clone(), self.broker.clone(), self.clock.clone())
    }

    pub async fn notify(&self, alert: Alert) {
        self.notifier.notify(alert).await;
    }
}
