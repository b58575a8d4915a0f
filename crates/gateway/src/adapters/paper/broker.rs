//! Paper broker
//!
//! In-process `Broker` that fills against marked prices. Market orders fill
//! immediately at the mark; limit and stop orders rest as Submitted until a
//! `mark_price` call crosses them.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info, warn};
use meridian_core::{AccountState, OrderStatus, OrderType, Price, Quantity, Side, Symbol, TimeInForce};
use meridian_ports::{Broker, BrokerError, BrokerPosition, BrokerResult, OrderAck, OrderTicket};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

/// Order as the paper venue tracks it
#[derive(Debug, Clone)]
struct PaperOrder {
    ticket: OrderTicket,
    status: OrderStatus,
    filled_qty: Quantity,
    avg_price: Option<Price>,
}

impl PaperOrder {
    fn ack(&self, broker_order_id: &str) -> OrderAck {
        OrderAck {
            broker_order_id: broker_order_id.to_string(),
            status: self.status,
            filled_qty: self.filled_qty,
            avg_price: self.avg_price,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    qty: Quantity,
    avg_entry_price: Price,
}

/// Cash, holdings and orders move together under one lock
#[derive(Debug, Default)]
struct Book {
    cash: Decimal,
    holdings: HashMap<Symbol, Holding>,
    orders: HashMap<String, PaperOrder>,
    account_failure: Option<BrokerError>,
}

impl Book {
    /// Book a complete fill, checking cash and holdings first
    fn settle(&mut self, ticket: &OrderTicket, price: Price) -> BrokerResult<()> {
        let notional = ticket.quantity * price;
        match ticket.side {
            Side::Buy => {
                if notional > self.cash {
                    return Err(BrokerError::Rejected(format!(
                        "insufficient cash: need {notional}, have {}",
                        self.cash
                    )));
                }
                self.cash -= notional;
                let holding = self.holdings.entry(ticket.symbol.clone()).or_insert(Holding {
                    qty: Decimal::ZERO,
                    avg_entry_price: Decimal::ZERO,
                });
                let total = holding.qty + ticket.quantity;
                holding.avg_entry_price = (holding.avg_entry_price * holding.qty + notional) / total;
                holding.qty = total;
            }
            Side::Sell => {
                let held = self.holdings.get(&ticket.symbol).map(|h| h.qty).unwrap_or(Decimal::ZERO);
                if ticket.quantity > held {
                    return Err(BrokerError::Rejected(format!(
                        "cannot sell {} {}: holding {held}",
                        ticket.quantity, ticket.symbol
                    )));
                }
                self.cash += notional;
                if ticket.quantity == held {
                    self.holdings.remove(&ticket.symbol);
                } else if let Some(holding) = self.holdings.get_mut(&ticket.symbol) {
                    holding.qty -= ticket.quantity;
                }
            }
        }
        Ok(())
    }
}

/// Price at which a resting order fills given the current mark, if any
fn crossing_price(ticket: &OrderTicket, mark: Price) -> Option<Price> {
    match ticket.order_type {
        OrderType::Market => Some(mark),
        OrderType::Limit => {
            let limit = ticket.limit_price?;
            let crossed = match ticket.side {
                Side::Buy => mark <= limit,
                Side::Sell => mark >= limit,
            };
            crossed.then_some(mark)
        }
        OrderType::Stop | OrderType::TrailingStop => {
            let stop = ticket.stop_price?;
            let triggered = match ticket.side {
                Side::Buy => mark >= stop,
                Side::Sell => mark <= stop,
            };
            triggered.then_some(mark)
        }
        OrderType::StopLimit => {
            let stop = ticket.stop_price?;
            let limit = ticket.limit_price?;
            let crossed = match ticket.side {
                Side::Buy => mark >= stop && mark <= limit,
                Side::Sell => mark <= stop && mark >= limit,
            };
            crossed.then_some(mark)
        }
    }
}

/// Simulated broker for paper trading and tests
///
/// Clones share state.
#[derive(Clone)]
pub struct PaperBroker {
    prices: Arc<DashMap<Symbol, Price>>,
    /// Injected failures: every order on the symbol fails with this error
    failures: Arc<DashMap<Symbol, BrokerError>>,
    book: Arc<Mutex<Book>>,
    sequence: Arc<AtomicU64>,
}

impl PaperBroker {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            prices: Arc::new(DashMap::new()),
            failures: Arc::new(DashMap::new()),
            book: Arc::new(Mutex::new(Book {
                cash: starting_cash,
                ..Book::default()
            })),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Builder: Seed a price without touching resting orders
    pub fn with_price(self, symbol: impl Into<Symbol>, price: Price) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }

    pub fn price(&self, symbol: &str) -> Option<Price> {
        self.prices.get(symbol).map(|p| *p.value())
    }

    /// Update the mark and fill any resting orders it crosses
    ///
    /// Returns the broker ids of orders filled by this mark.
    pub async fn mark_price(&self, symbol: &str, price: Price) -> Vec<String> {
        self.prices.insert(symbol.to_string(), price);

        let mut book = self.book.lock().await;
        let crossed: Vec<(String, OrderTicket, Price)> = book
            .orders
            .iter()
            .filter(|(_, o)| o.status == OrderStatus::Submitted && o.ticket.symbol == symbol)
            .filter_map(|(id, o)| crossing_price(&o.ticket, price).map(|fill| (id.clone(), o.ticket.clone(), fill)))
            .collect();

        let mut filled = Vec::new();
        for (id, ticket, fill_price) in crossed {
            let outcome = book.settle(&ticket, fill_price);
            let Some(order) = book.orders.get_mut(&id) else {
                continue;
            };
            match outcome {
                Ok(()) => {
                    order.status = OrderStatus::Filled;
                    order.filled_qty = ticket.quantity;
                    order.avg_price = Some(fill_price);
                    info!("[PAPER] {} resting {:?} {} {} filled @ {}", id, ticket.side, ticket.quantity, symbol, fill_price);
                    filled.push(id);
                }
                Err(e) => {
                    warn!("[PAPER] {} could not settle: {}", id, e);
                    order.status = OrderStatus::Rejected;
                }
            }
        }
        filled
    }

    /// Make every order on `symbol` fail with `error`
    pub fn fail_symbol(&self, symbol: impl Into<Symbol>, error: BrokerError) {
        self.failures.insert(symbol.into(), error);
    }

    pub fn clear_failure(&self, symbol: &str) {
        self.failures.remove(symbol);
    }

    /// Make `get_account` fail until cleared with `None`
    pub async fn fail_account(&self, error: Option<BrokerError>) {
        self.book.lock().await.account_failure = error;
    }

    pub async fn cash(&self) -> Decimal {
        self.book.lock().await.cash
    }

    /// Shares held in `symbol`
    pub async fn holding(&self, symbol: &str) -> Quantity {
        self.book
            .lock()
            .await
            .holdings
            .get(symbol)
            .map(|h| h.qty)
            .unwrap_or(Decimal::ZERO)
    }

    fn next_id(&self) -> String {
        format!("paper-{}", self.sequence.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn place_order(&self, ticket: &OrderTicket) -> BrokerResult<OrderAck> {
        if let Some(error) = self.failures.get(&ticket.symbol) {
            warn!("[PAPER] Injected failure for {}: {}", ticket.symbol, error.value());
            return Err(error.value().clone());
        }
        if ticket.quantity <= Decimal::ZERO {
            return Err(BrokerError::Rejected(format!("invalid quantity {}", ticket.quantity)));
        }
        let mark = self
            .price(&ticket.symbol)
            .ok_or_else(|| BrokerError::Rejected(format!("no price for {}", ticket.symbol)))?;

        let id = self.next_id();
        let mut book = self.book.lock().await;
        let mut order = PaperOrder {
            ticket: ticket.clone(),
            status: OrderStatus::Submitted,
            filled_qty: Decimal::ZERO,
            avg_price: None,
        };

        match crossing_price(ticket, mark) {
            Some(fill_price) => {
                book.settle(ticket, fill_price)?;
                order.status = OrderStatus::Filled;
                order.filled_qty = ticket.quantity;
                order.avg_price = Some(fill_price);
                info!(
                    "[PAPER] {} {:?} {} {} filled @ {}",
                    id, ticket.side, ticket.quantity, ticket.symbol, fill_price
                );
            }
            None if matches!(ticket.time_in_force, TimeInForce::Ioc | TimeInForce::Fok) => {
                order.status = OrderStatus::Canceled;
                debug!("[PAPER] {} not marketable, canceled ({:?})", id, ticket.time_in_force);
            }
            None => {
                debug!("[PAPER] {} resting {:?} {:?} {}", id, ticket.order_type, ticket.side, ticket.symbol);
            }
        }

        let ack = order.ack(&id);
        book.orders.insert(id, order);
        Ok(ack)
    }

    async fn cancel_order(&self, broker_order_id: &str) -> BrokerResult<()> {
        let mut book = self.book.lock().await;
        let order = book
            .orders
            .get_mut(broker_order_id)
            .ok_or_else(|| BrokerError::NotFound(broker_order_id.to_string()))?;
        if order.status.is_terminal() {
            return Err(BrokerError::Rejected(format!(
                "order {broker_order_id} already {:?}",
                order.status
            )));
        }
        order.status = OrderStatus::Canceled;
        Ok(())
    }

    async fn get_order(&self, broker_order_id: &str) -> BrokerResult<OrderAck> {
        let book = self.book.lock().await;
        book.orders
            .get(broker_order_id)
            .map(|o| o.ack(broker_order_id))
            .ok_or_else(|| BrokerError::NotFound(broker_order_id.to_string()))
    }

    async fn get_account(&self) -> BrokerResult<AccountState> {
        let book = self.book.lock().await;
        if let Some(error) = &book.account_failure {
            return Err(error.clone());
        }
        let holdings_value: Decimal = book
            .holdings
            .iter()
            .map(|(symbol, h)| h.qty * self.price(symbol).unwrap_or(h.avg_entry_price))
            .sum();
        Ok(AccountState {
            cash: book.cash,
            portfolio_value: book.cash + holdings_value,
            buying_power: book.cash,
        })
    }

    async fn get_positions(&self) -> BrokerResult<Vec<BrokerPosition>> {
        let book = self.book.lock().await;
        let mut positions: Vec<BrokerPosition> = book
            .holdings
            .iter()
            .map(|(symbol, h)| BrokerPosition {
                symbol: symbol.clone(),
                qty: h.qty,
                avg_entry_price: h.avg_entry_price,
                current_price: self.price(symbol).unwrap_or(h.avg_entry_price),
            })
            .collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ticket(symbol: &str, side: Side, qty: Decimal, order_type: OrderType, limit: Option<Decimal>) -> OrderTicket {
        OrderTicket {
            client_order_id: "mrd_test".into(),
            symbol: symbol.into(),
            side,
            quantity: qty,
            order_type,
            limit_price: limit,
            stop_price: None,
            time_in_force: TimeInForce::Day,
        }
    }

    #[tokio::test]
    async fn test_market_round_trip() {
        let broker = PaperBroker::new(dec!(10000)).with_price("AAPL", dec!(50));

        let ack = broker
            .place_order(&ticket("AAPL", Side::Buy, dec!(100), OrderType::Market, None))
            .await
            .unwrap();
        assert_eq!(ack.status, OrderStatus::Filled);
        assert_eq!(ack.filled_qty, dec!(100));
        assert_eq!(ack.avg_price, Some(dec!(50)));
        assert_eq!(broker.cash().await, dec!(5000));

        broker.mark_price("AAPL", dec!(60)).await;
        let account = broker.get_account().await.unwrap();
        assert_eq!(account.portfolio_value, dec!(11000));

        broker
            .place_order(&ticket("AAPL", Side::Sell, dec!(100), OrderType::Market, None))
            .await
            .unwrap();
        assert_eq!(broker.cash().await, dec!(11000));
        assert_eq!(broker.holding("AAPL").await, Decimal::ZERO);
        assert!(broker.get_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejections() {
        let broker = PaperBroker::new(dec!(1000)).with_price("AAPL", dec!(50));

        let err = broker
            .place_order(&ticket("AAPL", Side::Buy, dec!(100), OrderType::Market, None))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(ref m) if m.contains("insufficient cash")));

        let err = broker
            .place_order(&ticket("AAPL", Side::Sell, dec!(1), OrderType::Market, None))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(_)));

        let err = broker
            .place_order(&ticket("MSFT", Side::Buy, dec!(1), OrderType::Market, None))
            .await
            .unwrap_err();
        assert_eq!(err, BrokerError::Rejected("no price for MSFT".into()));
    }

    #[tokio::test]
    async fn test_resting_limit_fills_when_crossed() {
        let broker = PaperBroker::new(dec!(10000)).with_price("AAPL", dec!(50));

        let ack = broker
            .place_order(&ticket("AAPL", Side::Buy, dec!(10), OrderType::Limit, Some(dec!(48))))
            .await
            .unwrap();
        assert_eq!(ack.status, OrderStatus::Submitted);

        assert!(broker.mark_price("AAPL", dec!(49)).await.is_empty());
        let filled = broker.mark_price("AAPL", dec!(47.5)).await;
        assert_eq!(filled, vec![ack.broker_order_id.clone()]);

        let ack = broker.get_order(&ack.broker_order_id).await.unwrap();
        assert_eq!(ack.status, OrderStatus::Filled);
        assert_eq!(ack.avg_price, Some(dec!(47.5)));
        assert_eq!(broker.holding("AAPL").await, dec!(10));
    }

    #[tokio::test]
    async fn test_cancel_resting_and_terminal() {
        let broker = PaperBroker::new(dec!(10000)).with_price("AAPL", dec!(50));
        let resting = broker
            .place_order(&ticket("AAPL", Side::Buy, dec!(10), OrderType::Limit, Some(dec!(40))))
            .await
            .unwrap();
        broker.cancel_order(&resting.broker_order_id).await.unwrap();
        let ack = broker.get_order(&resting.broker_order_id).await.unwrap();
        assert_eq!(ack.status, OrderStatus::Canceled);

        assert!(broker.cancel_order(&resting.broker_order_id).await.is_err());
        assert!(matches!(
            broker.cancel_order("paper-999").await,
            Err(BrokerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let broker = PaperBroker::new(dec!(10000)).with_price("AAPL", dec!(50));
        broker.fail_symbol("AAPL", BrokerError::Network("timeout".into()));
        let err = broker
            .place_order(&ticket("AAPL", Side::Buy, dec!(1), OrderType::Market, None))
            .await
            .unwrap_err();
        assert_eq!(err, BrokerError::Network("timeout".into()));

        broker.clear_failure("AAPL");
        assert!(broker
            .place_order(&ticket("AAPL", Side::Buy, dec!(1), OrderType::Market, None))
            .await
            .is_ok());

        broker.fail_account(Some(BrokerError::Auth("expired".into()))).await;
        assert!(broker.get_account().await.is_err());
        broker.fail_account(None).await;
        assert!(broker.get_account().await.is_ok());
    }
}
