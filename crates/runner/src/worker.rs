//! Strategy worker
//!
//! One worker per running strategy. Each iteration reconciles orders still
//! working at the broker, refreshes the daily risk state, then walks the
//! strategy's symbols: stop/target checks first, then the signal.
//!
//! The ledger moves on fills only. An unfilled entry holds a reservation in
//! the risk gate; an unfilled exit leaves its position open until the fill
//! is reported.

use std::collections::{BTreeSet, HashMap};

use log::{debug, error, info, warn};
use meridian_core::{
    CloseReason, Order, OrderId, OrderRequest, OrderStatus, Position, Price, Quantity, Side, Signal, Symbol,
    Timestamp,
};
use meridian_order_manager::{OrderRouter, PositionSizer};
use meridian_ports::{Alert, AlertKind, AlertLevel};
use meridian_risk_manager::{Candidate, ReturnHistory};
use meridian_strategy::{FeatureSnapshot, Strategy};
use rust_decimal::Decimal;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::{SchedulerConfig, StrategyConfig};
use crate::context::TradingContext;
use crate::error::{Result, SchedulerError};

/// Counts from one pass over the symbols
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationSummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub entries: usize,
    pub exits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    Completed(IterationSummary),
    /// Daily risk halt in force; nothing was evaluated
    Halted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolOutcome {
    Skipped,
    Held,
    Entered,
    Exited,
}

/// Order accepted by the broker but not yet finished
#[derive(Debug, Clone)]
struct PendingOrder {
    symbol: Symbol,
    kind: PendingKind,
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    Entry {
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    },
    /// `booked` shares are already closed in the ledger
    Exit {
        reason: CloseReason,
        reference_price: Price,
        booked: Quantity,
    },
}

pub struct StrategyWorker {
    config: StrategyConfig,
    strategy: Box<dyn Strategy>,
    ctx: TradingContext,
    router: OrderRouter,
    timings: SchedulerConfig,
    pending: HashMap<OrderId, PendingOrder>,
    last_prune: Option<Timestamp>,
}

impl StrategyWorker {
    pub fn new(config: StrategyConfig, ctx: TradingContext, timings: SchedulerConfig) -> Result<Self> {
        let strategy = config.params.build()?;
        let router = ctx.router();
        Ok(Self {
            config,
            strategy,
            ctx,
            router,
            timings,
            pending: HashMap::new(),
            last_prune: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Entry orders still waiting on a fill
    pub fn pending_entries(&self) -> usize {
        self.pending
            .values()
            .filter(|p| matches!(p.kind, PendingKind::Entry { .. }))
            .count()
    }

    /// Exit orders still waiting on a fill
    pub fn pending_exits(&self) -> usize {
        self.pending
            .values()
            .filter(|p| matches!(p.kind, PendingKind::Exit { .. }))
            .count()
    }

    fn has_pending(&self, symbol: &str) -> bool {
        self.pending.values().any(|p| p.symbol == symbol)
    }

    /// Loop until cancelled or too many consecutive failures
    ///
    /// Orders still working at the broker are cancelled on the way out.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!("[{}] Worker started on {:?}", self.config.id, self.config.symbols);
        let mut consecutive_errors = 0u32;

        let outcome = loop {
            let pause = match self.run_iteration(&cancel).await {
                Ok(IterationOutcome::Cancelled) => break Ok(()),
                Ok(IterationOutcome::Halted) => {
                    consecutive_errors = 0;
                    self.timings.halt_retry()
                }
                Ok(IterationOutcome::Completed(summary)) => {
                    consecutive_errors = 0;
                    debug!("[{}] Iteration complete: {:?}", self.config.id, summary);
                    self.timings.poll_interval()
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!(
                        "[{}] Iteration failed ({}/{}): {}",
                        self.config.id, consecutive_errors, self.timings.max_consecutive_errors, e
                    );
                    self.alert(
                        AlertKind::SystemError,
                        AlertLevel::Warning,
                        "Strategy iteration failed",
                        e.to_string(),
                        json!({ "strategy_id": self.config.id, "consecutive_errors": consecutive_errors }),
                    )
                    .await;
                    if consecutive_errors >= self.timings.max_consecutive_errors {
                        break Err(SchedulerError::TooManyErrors {
                            id: self.config.id.clone(),
                            errors: consecutive_errors,
                            last: e.to_string(),
                        });
                    }
                    self.timings.error_backoff()
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep(pause) => {}
            }
        };

        self.cancel_pending().await;
        info!("[{}] Worker stopped", self.config.id);
        outcome
    }

    /// One pass: reconcile, refresh risk, evaluate every symbol
    pub async fn run_iteration(&mut self, cancel: &CancellationToken) -> Result<IterationOutcome> {
        if cancel.is_cancelled() {
            return Ok(IterationOutcome::Cancelled);
        }

        self.reconcile_pending().await;

        let account = self.ctx.broker.get_account().await?;
        let now = self.ctx.clock.now();
        self.prune_orders(now).await;

        let (halt_event, halted) = {
            let mut risk = self.ctx.risk.lock().await;
            let event = risk.update_portfolio_value(account.portfolio_value, now);
            (event, risk.is_halted())
        };
        if let Some(event) = halt_event {
            self.alert(
                AlertKind::DailyLossLimit,
                AlertLevel::Critical,
                "Daily loss limit reached",
                event.reason.clone(),
                json!({
                    "daily_pnl": event.daily_pnl.to_string(),
                    "loss_pct": event.loss_pct.to_string(),
                }),
            )
            .await;
        }
        if halted {
            info!("[{}] Trading halted; skipping symbols", self.config.id);
            return Ok(IterationOutcome::Halted);
        }

        let mut summary = IterationSummary::default();
        let symbols = self.config.symbols.clone();
        for symbol in &symbols {
            if cancel.is_cancelled() {
                return Ok(IterationOutcome::Cancelled);
            }
            match self.evaluate_symbol(symbol).await {
                Ok(SymbolOutcome::Skipped) => summary.skipped += 1,
                Ok(SymbolOutcome::Held) => summary.evaluated += 1,
                Ok(SymbolOutcome::Entered) => {
                    summary.evaluated += 1;
                    summary.entries += 1;
                }
                Ok(SymbolOutcome::Exited) => {
                    summary.evaluated += 1;
                    summary.exits += 1;
                }
                Err(e) => {
                    warn!("[{}] {} failed: {}", self.config.id, symbol, e);
                    summary.skipped += 1;
                }
            }
        }
        Ok(IterationOutcome::Completed(summary))
    }

    /// Drop finished orders past retention, once per calendar day
    async fn prune_orders(&mut self, now: Timestamp) {
        if self
            .last_prune
            .is_some_and(|last| last.date_naive() == now.date_naive())
        {
            return;
        }
        self.last_prune = Some(now);
        self.ctx
            .orders
            .lock()
            .await
            .clear_old_orders(self.timings.order_retention_days, now);
    }

    async fn evaluate_symbol(&mut self, symbol: &Symbol) -> Result<SymbolOutcome> {
        let id = self.config.id.clone();
        if self.has_pending(symbol) {
            debug!("[{}] {} has an order working at the broker", id, symbol);
            return Ok(SymbolOutcome::Held);
        }

        let bars = match self.ctx.market_data.fetch_bars(symbol, self.config.lookback_bars).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!("[{}] Skipping {}: {}", id, symbol, e);
                return Ok(SymbolOutcome::Skipped);
            }
        };
        let Some(last) = bars.last().cloned() else {
            warn!("[{}] Skipping {}: no bars", id, symbol);
            return Ok(SymbolOutcome::Skipped);
        };

        // None: flat. Some(None): held, nothing triggered.
        let held = {
            let ledger = self.ctx.ledger.lock().await;
            ledger
                .contains(&id, symbol)
                .then(|| ledger.check_bar(&id, symbol, last.low, last.high))
        };
        if let Some(Some(trigger)) = held {
            info!("[{}] {} {:?} on bar low {} high {}", id, symbol, trigger, last.low, last.high);
            return self.exit(symbol, trigger.exit_price(), trigger.close_reason()).await;
        }
        let has_position = held.is_some();

        let snapshot = FeatureSnapshot::new(symbol.clone(), bars);
        let signal = match self.config.generator.generate_with(&id, self.strategy.as_ref(), &snapshot) {
            Ok(Some(signal)) => signal,
            Ok(None) => return Ok(SymbolOutcome::Held),
            Err(e) => {
                warn!("[{}] Signal error on {}: {}", id, symbol, e);
                return Ok(SymbolOutcome::Skipped);
            }
        };

        if has_position && signal.is_sell() {
            return self.exit(symbol, signal.price, CloseReason::Signal).await;
        }
        if !has_position && signal.is_buy() {
            return self.enter(signal, &snapshot).await;
        }
        Ok(SymbolOutcome::Held)
    }

    async fn enter(&mut self, signal: Signal, snapshot: &FeatureSnapshot) -> Result<SymbolOutcome> {
        let id = self.config.id.clone();
        let symbol = signal.symbol.clone();
        let account = match self.ctx.broker.get_account().await {
            Ok(account) => account,
            Err(e) => {
                warn!("[{}] No account for {} entry: {}", id, symbol, e);
                return Ok(SymbolOutcome::Skipped);
            }
        };

        let mut signal = signal;
        if signal.stop_loss.is_none()
            && let Some(atr) = signal.atr
        {
            let stop = signal.price - self.config.stop_multiplier * atr;
            signal = signal.with_stop_loss(stop);
        }
        let stop_loss = signal.stop_loss;

        // Lock order is risk, then ledger
        let (book, lookback) = {
            let risk = self.ctx.risk.lock().await;
            let positions = self.ctx.ledger.lock().await.positions();
            (risk.book(&positions), risk.limits().lookback_days)
        };
        let returns = self.return_history(snapshot, &book, lookback + 1).await;

        // Sized and admitted in one critical section against ledger plus reservations
        let now = self.ctx.clock.now();
        let admission = {
            let mut risk = self.ctx.risk.lock().await;
            let positions = self.ctx.ledger.lock().await.positions();
            let heat_manager = risk.heat_manager().clone();
            let heat = heat_manager.portfolio_heat(&risk.book(&positions), account.portfolio_value);
            let size = PositionSizer::new(heat_manager).size(&signal, &account, &self.config.sizing, heat);
            if size.shares <= Decimal::ZERO {
                info!("[{}] {} sized to zero: {}", id, symbol, size.reasoning);
                return Ok(SymbolOutcome::Held);
            }
            let candidate = Candidate::buy(id.clone(), symbol.clone(), size.shares, signal.price, stop_loss);
            risk.admit_and_reserve(&candidate, &positions, &account, &returns, now)
        };
        let Some(quantity) = admission.quantity() else {
            info!("[{}] {} entry rejected by risk: {}", id, symbol, admission.reason());
            return Ok(SymbolOutcome::Held);
        };

        let request = OrderRequest::market(symbol.clone(), Side::Buy, quantity).with_strategy(id.clone());
        let order = match self.router.submit(request).await {
            Ok(order) => order,
            Err(e) => {
                self.release_reservation(&symbol).await;
                return Err(e.into());
            }
        };
        match order.status {
            OrderStatus::Rejected => {
                self.release_reservation(&symbol).await;
                self.broker_rejected(&order).await;
                Ok(SymbolOutcome::Skipped)
            }
            status if status.is_terminal() => {
                let opened = self.open_from_order(&order, stop_loss, signal.take_profit).await;
                self.release_reservation(&symbol).await;
                Ok(if opened? {
                    SymbolOutcome::Entered
                } else {
                    SymbolOutcome::Held
                })
            }
            _ => {
                debug!("[{}] {} entry {} pending at broker", id, symbol, order.client_order_id);
                self.pending.insert(
                    order.id,
                    PendingOrder {
                        symbol,
                        kind: PendingKind::Entry {
                            stop_loss,
                            take_profit: signal.take_profit,
                        },
                    },
                );
                Ok(SymbolOutcome::Held)
            }
        }
    }

    /// Bars for the candidate and every held or reserved symbol, fetched outside locks
    async fn return_history(
        &self,
        snapshot: &FeatureSnapshot,
        positions: &[Position],
        lookback: usize,
    ) -> ReturnHistory {
        let mut returns = ReturnHistory::new();
        returns.insert_bars(snapshot.symbol(), snapshot.bars());

        let held: BTreeSet<&str> = positions
            .iter()
            .map(|p| p.symbol.as_str())
            .filter(|s| *s != snapshot.symbol())
            .collect();
        for symbol in held {
            match self.ctx.market_data.fetch_bars(symbol, lookback).await {
                Ok(bars) => returns.insert_bars(symbol, &bars),
                Err(e) => debug!("[{}] No history for {}: {}", self.config.id, symbol, e),
            }
        }
        returns
    }

    async fn exit(&mut self, symbol: &Symbol, reference_price: Price, reason: CloseReason) -> Result<SymbolOutcome> {
        let id = self.config.id.clone();
        let Some(position) = self.ctx.ledger.lock().await.get(&id, symbol).cloned() else {
            return Ok(SymbolOutcome::Held);
        };

        let request = OrderRequest::market(symbol.clone(), Side::Sell, position.shares).with_strategy(id.clone());
        let order = self.router.submit(request).await?;
        if order.status == OrderStatus::Rejected {
            self.broker_rejected(&order).await;
            return Ok(SymbolOutcome::Skipped);
        }

        let booked = self
            .book_exit_fill(&order, reason, reference_price, Decimal::ZERO)
            .await?;
        if order.status.is_active() {
            debug!(
                "[{}] {} exit {} working at broker, {} of {} filled",
                id, symbol, order.client_order_id, booked, order.quantity
            );
            self.pending.insert(
                order.id,
                PendingOrder {
                    symbol: symbol.clone(),
                    kind: PendingKind::Exit {
                        reason,
                        reference_price,
                        booked,
                    },
                },
            );
        } else if booked < order.quantity {
            warn!(
                "[{}] {} exit ended {:?} with {} of {} sold",
                id, symbol, order.status, booked, order.quantity
            );
        }

        Ok(if booked > Decimal::ZERO {
            SymbolOutcome::Exited
        } else {
            SymbolOutcome::Held
        })
    }

    /// Close the newly filled part of an exit order
    ///
    /// `booked` is what earlier reports already closed. Returns the order's
    /// cumulative filled quantity, the new `booked`.
    async fn book_exit_fill(
        &self,
        order: &Order,
        reason: CloseReason,
        reference_price: Price,
        booked: Quantity,
    ) -> Result<Quantity> {
        let fresh = order.filled_quantity - booked;
        if fresh <= Decimal::ZERO {
            return Ok(booked);
        }
        let id = &self.config.id;
        let symbol = &order.symbol;

        // Protective exits book at their level; signal exits at the fill
        let exit_price = match reason {
            CloseReason::StopLoss | CloseReason::TakeProfit => reference_price,
            _ => order.filled_avg_price.unwrap_or(reference_price),
        };
        let now = self.ctx.clock.now();
        let record = {
            let mut ledger = self.ctx.ledger.lock().await;
            let open = ledger.get(id, symbol).map(|p| p.shares).unwrap_or(Decimal::ZERO);
            let shares = fresh.min(open);
            if shares <= Decimal::ZERO {
                warn!("[{}] Sold {} {} with nothing left open", id, fresh, symbol);
                return Ok(order.filled_quantity);
            }
            ledger.close(id, symbol, exit_price, Some(shares), reason, now)?
        };
        self.ctx.history.lock().await.record(record.clone());

        let (kind, title) = match reason {
            CloseReason::StopLoss => (AlertKind::StopLossTriggered, "Stop loss triggered"),
            CloseReason::TakeProfit => (AlertKind::TakeProfitTriggered, "Take profit triggered"),
            _ => (AlertKind::TradeExecuted, "Position closed"),
        };
        self.alert(
            kind,
            AlertLevel::Info,
            title,
            format!("SELL {} {} @ {} (pnl {})", record.shares, symbol, exit_price, record.pnl),
            json!({
                "strategy_id": id,
                "symbol": symbol,
                "shares": record.shares.to_string(),
                "exit_price": exit_price.to_string(),
                "pnl": record.pnl.to_string(),
            }),
        )
        .await;
        Ok(order.filled_quantity)
    }

    /// Open the filled part of an entry; false when nothing filled
    async fn open_from_order(
        &self,
        order: &Order,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    ) -> Result<bool> {
        if order.filled_quantity <= Decimal::ZERO {
            return Ok(false);
        }
        let Some(price) = order.filled_avg_price else {
            return Ok(false);
        };
        let id = &self.config.id;
        let now = self.ctx.clock.now();
        self.ctx.ledger.lock().await.open(
            id,
            &order.symbol,
            order.filled_quantity,
            price,
            stop_loss,
            take_profit,
            now,
        )?;

        self.alert(
            AlertKind::TradeExecuted,
            AlertLevel::Info,
            "Trade executed",
            format!("BUY {} {} @ {}", order.filled_quantity, order.symbol, price),
            json!({
                "strategy_id": id,
                "symbol": order.symbol,
                "shares": order.filled_quantity.to_string(),
                "price": price.to_string(),
                "stop_loss": stop_loss.map(|p| p.to_string()),
                "take_profit": take_profit.map(|p| p.to_string()),
            }),
        )
        .await;
        Ok(true)
    }

    /// Poll orders still working at the broker and book what they report
    async fn reconcile_pending(&mut self) {
        let ids: Vec<OrderId> = self.pending.keys().copied().collect();
        for order_id in ids {
            match self.router.sync(order_id).await {
                Ok(order) => self.settle(&order).await,
                Err(e) => warn!("[{}] Could not sync order {}: {}", self.config.id, order_id, e),
            }
        }
    }

    /// Apply a broker report to its pending order; finished orders are dropped
    async fn settle(&mut self, order: &Order) {
        let Some(pending) = self.pending.get(&order.id).cloned() else {
            return;
        };
        let id = self.config.id.clone();
        let finished = order.status.is_terminal();

        match pending.kind {
            PendingKind::Entry { stop_loss, take_profit } => {
                if !finished {
                    return;
                }
                match self.open_from_order(order, stop_loss, take_profit).await {
                    Ok(true) => {}
                    Ok(false) => info!("[{}] Entry on {} ended {:?} unfilled", id, pending.symbol, order.status),
                    Err(e) => error!("[{}] Filled entry on {} not booked: {}", id, pending.symbol, e),
                }
                self.release_reservation(&pending.symbol).await;
            }
            PendingKind::Exit {
                reason,
                reference_price,
                booked,
            } => {
                let booked = match self.book_exit_fill(order, reason, reference_price, booked).await {
                    Ok(total) => total,
                    Err(e) => {
                        error!("[{}] Exit fill on {} not booked: {}", id, pending.symbol, e);
                        booked
                    }
                };
                if !finished {
                    if let Some(entry) = self.pending.get_mut(&order.id) {
                        entry.kind = PendingKind::Exit {
                            reason,
                            reference_price,
                            booked,
                        };
                    }
                    return;
                }
                if booked < order.quantity {
                    warn!(
                        "[{}] Exit on {} ended {:?} with {} of {} sold",
                        id, pending.symbol, order.status, booked, order.quantity
                    );
                }
            }
        }
        self.pending.remove(&order.id);
    }

    /// Cancel orders still working and drop this strategy's reservations
    async fn cancel_pending(&mut self) {
        let ids: Vec<OrderId> = self.pending.keys().copied().collect();
        for order_id in ids {
            let report = match self.router.cancel(order_id).await {
                Ok(order) => Ok(order),
                Err(e) => {
                    warn!("[{}] Could not cancel order {}: {}", self.config.id, order_id, e);
                    self.router.sync(order_id).await
                }
            };
            if let Ok(order) = report {
                self.settle(&order).await;
            }
        }
        if !self.pending.is_empty() {
            error!(
                "[{}] {} orders still working at the broker after stop",
                self.config.id,
                self.pending.len()
            );
            self.pending.clear();
        }
        self.ctx.risk.lock().await.release_strategy(&self.config.id);
    }

    async fn release_reservation(&self, symbol: &str) {
        self.ctx.risk.lock().await.release(&self.config.id, symbol);
    }

    async fn broker_rejected(&self, order: &Order) {
        let message = order.error_message.clone().unwrap_or_default();
        warn!(
            "[{}] {:?} {} rejected: {}",
            self.config.id, order.side, order.symbol, message
        );
        self.alert(
            AlertKind::SystemError,
            AlertLevel::Warning,
            "Order rejected",
            message,
            json!({
                "strategy_id": self.config.id,
                "symbol": order.symbol,
                "client_order_id": order.client_order_id,
            }),
        )
        .await;
    }

    async fn alert(
        &self,
        kind: AlertKind,
        level: AlertLevel,
        title: &str,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) {
        let alert = Alert::new(kind, level, title, message, self.ctx.clock.now()).with_payload(payload);
        self.ctx.notify(alert).await;
    }
}
