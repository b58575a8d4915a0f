//! Strategy scheduler
//!
//! Runs each configured strategy as its own tokio task. A supervisor task
//! per strategy watches the worker and marks only that strategy `Error`
//! when it panics or gives up. Stops are cooperative through a
//! `CancellationToken` and bounded by a join timeout.

use std::sync::Arc;

use dashmap::DashMap;
use log::{error, info, warn};
use meridian_core::{CloseReason, OrderRequest, OrderStatus, Position, Side, Timestamp, TradeRecord};
use meridian_order_manager::OrderRouter;
use meridian_ports::{Alert, AlertKind, AlertLevel, BrokerError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::{SchedulerConfig, StrategyConfig};
use crate::context::TradingContext;
use crate::error::{Result, SchedulerError};
use crate::worker::StrategyWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Running,
    Stopped,
    Error,
}

#[derive(Debug, Clone)]
pub struct StrategyState {
    pub start_time: Timestamp,
    pub config: StrategyConfig,
    pub status: StrategyStatus,
    pub last_error: Option<String>,
}

struct WorkerHandle {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
    worker: AbortHandle,
}

/// A position the emergency pass could not close
#[derive(Debug, Clone, PartialEq)]
pub struct CloseFailure {
    pub strategy_id: String,
    pub symbol: String,
    pub error: String,
}

/// Outcome of `emergency_stop`
#[derive(Debug, Clone, Default)]
pub struct EmergencyReport {
    /// Workers that stopped within the join timeout
    pub stopped: Vec<String>,
    /// Workers that had to be aborted
    pub unresponsive: Vec<String>,
    pub closed: Vec<TradeRecord>,
    pub failures: Vec<CloseFailure>,
}

impl EmergencyReport {
    pub fn is_clean(&self) -> bool {
        self.unresponsive.is_empty() && self.failures.is_empty()
    }
}

pub struct StrategyScheduler {
    ctx: TradingContext,
    timings: SchedulerConfig,
    registry: Arc<DashMap<String, StrategyState>>,
    handles: DashMap<String, WorkerHandle>,
}

impl StrategyScheduler {
    pub fn new(ctx: TradingContext, timings: SchedulerConfig) -> Self {
        Self {
            ctx,
            timings,
            registry: Arc::new(DashMap::new()),
            handles: DashMap::new(),
        }
    }

    pub fn context(&self) -> &TradingContext {
        &self.ctx
    }

    /// Spawn a worker for `config`
    pub async fn start(&self, config: StrategyConfig) -> Result<()> {
        let id = config.id.clone();
        let running = self
            .registry
            .get(&id)
            .is_some_and(|state| state.status == StrategyStatus::Running);
        if running {
            return Err(SchedulerError::AlreadyRunning(id));
        }

        let worker = StrategyWorker::new(config.clone(), self.ctx.clone(), self.timings.clone())?;
        let symbols = config.symbols.clone();
        self.registry.insert(
            id.clone(),
            StrategyState {
                start_time: self.ctx.clock.now(),
                config,
                status: StrategyStatus::Running,
                last_error: None,
            },
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker.run(cancel.clone()));
        let worker_abort = task.abort_handle();
        let supervisor = tokio::spawn(supervise(
            id.clone(),
            task,
            self.registry.clone(),
            self.ctx.clone(),
        ));
        self.handles.insert(
            id.clone(),
            WorkerHandle {
                cancel,
                supervisor,
                worker: worker_abort,
            },
        );

        info!("[SCHEDULER] Started {} on {:?}", id, symbols);
        self.alert(
            AlertKind::StrategyStarted,
            AlertLevel::Info,
            "Strategy started",
            format!("{id} started"),
            json!({ "strategy_id": id, "symbols": symbols }),
        )
        .await;
        Ok(())
    }

    /// Cancel a worker and wait for it, up to the join timeout
    pub async fn stop(&self, id: &str) -> Result<()> {
        let Some((_, handle)) = self.handles.remove(id) else {
            return Err(SchedulerError::NotRunning(id.to_string()));
        };
        handle.cancel.cancel();
        let joined = self.join(id, handle).await;
        self.mark_stopped(id);

        info!("[SCHEDULER] Stopped {}", id);
        self.alert(
            AlertKind::StrategyStopped,
            AlertLevel::Info,
            "Strategy stopped",
            format!("{id} stopped"),
            json!({ "strategy_id": id }),
        )
        .await;
        joined
    }

    async fn join(&self, id: &str, handle: WorkerHandle) -> Result<()> {
        let timeout = self.timings.join_timeout();
        let mut supervisor = handle.supervisor;
        match tokio::time::timeout(timeout, &mut supervisor).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!("[SCHEDULER] {} did not stop within {:?}; aborting", id, timeout);
                handle.worker.abort();
                supervisor.abort();
                Err(SchedulerError::Unresponsive {
                    id: id.to_string(),
                    timeout,
                })
            }
        }
    }

    /// A failure the supervisor already recorded stays `Error`
    fn mark_stopped(&self, id: &str) {
        if let Some(mut state) = self.registry.get_mut(id)
            && state.status != StrategyStatus::Error
        {
            state.status = StrategyStatus::Stopped;
        }
    }

    /// Stop every worker, then close every ledger position at market
    ///
    /// A failure on one position, including a partial or missing fill, is
    /// recorded and the pass continues.
    pub async fn emergency_stop(&self) -> EmergencyReport {
        error!("[SCHEDULER] EMERGENCY STOP");
        let mut report = EmergencyReport::default();

        let ids: Vec<String> = self.handles.iter().map(|e| e.key().clone()).collect();
        let handles: Vec<(String, WorkerHandle)> = ids.iter().filter_map(|id| self.handles.remove(id)).collect();
        for (_, handle) in &handles {
            handle.cancel.cancel();
        }
        for (id, handle) in handles {
            match self.join(&id, handle).await {
                Ok(()) => report.stopped.push(id.clone()),
                Err(_) => report.unresponsive.push(id.clone()),
            }
            self.mark_stopped(&id);
        }

        let positions = self.ctx.ledger.lock().await.positions();
        let router = self.ctx.router();
        for position in positions {
            match self.force_close(&router, &position).await {
                Ok(record) => {
                    if record.shares < position.shares {
                        report.failures.push(CloseFailure {
                            strategy_id: position.strategy_id.clone(),
                            symbol: position.symbol.clone(),
                            error: format!("only {} of {} shares sold", record.shares, position.shares),
                        });
                    }
                    report.closed.push(record);
                }
                Err(e) => {
                    error!(
                        "[SCHEDULER] Could not close {} {}: {}",
                        position.strategy_id, position.symbol, e
                    );
                    report.failures.push(CloseFailure {
                        strategy_id: position.strategy_id.clone(),
                        symbol: position.symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.ctx.risk.lock().await.daily_mut().halt("emergency stop");

        self.alert(
            AlertKind::EmergencyStop,
            AlertLevel::Critical,
            "Emergency stop",
            format!(
                "{} strategies stopped, {} positions closed, {} failures",
                report.stopped.len() + report.unresponsive.len(),
                report.closed.len(),
                report.failures.len()
            ),
            json!({
                "stopped": report.stopped,
                "unresponsive": report.unresponsive,
                "closed": report.closed.iter().map(|t| &t.symbol).collect::<Vec<_>>(),
                "failures": report.failures.iter().map(|f| &f.symbol).collect::<Vec<_>>(),
            }),
        )
        .await;
        report
    }

    /// Sell a position at market and book only what filled
    ///
    /// An order still working after one poll is cancelled; unsold shares
    /// stay in the ledger.
    async fn force_close(&self, router: &OrderRouter, position: &Position) -> Result<TradeRecord> {
        let request = OrderRequest::market(position.symbol.clone(), Side::Sell, position.shares)
            .with_strategy(position.strategy_id.clone());
        let mut order = router.submit(request).await?;
        if order.status == OrderStatus::Rejected {
            let message = order.error_message.unwrap_or_else(|| "rejected".to_string());
            return Err(SchedulerError::Broker(BrokerError::Rejected(message)));
        }

        if order.status.is_active() {
            match router.sync(order.id).await {
                Ok(synced) => order = synced,
                Err(e) => warn!("[SCHEDULER] Could not sync exit for {}: {}", position.symbol, e),
            }
        }
        if order.status.is_active() {
            match router.cancel(order.id).await {
                Ok(canceled) => order = canceled,
                Err(e) => warn!("[SCHEDULER] Could not cancel exit for {}: {}", position.symbol, e),
            }
        }
        if order.filled_quantity <= Decimal::ZERO {
            return Err(SchedulerError::ExitNotFilled {
                symbol: position.symbol.clone(),
                status: order.status,
                filled: order.filled_quantity,
                requested: position.shares,
            });
        }
        let shares = order.filled_quantity.min(position.shares);

        let price = match order.filled_avg_price {
            Some(price) => price,
            None => match self.ctx.market_data.fetch_quote(&position.symbol).await {
                Ok(quote) => quote.price,
                Err(_) => position.entry_price,
            },
        };
        let now = self.ctx.clock.now();
        let record = self.ctx.ledger.lock().await.close(
            &position.strategy_id,
            &position.symbol,
            price,
            Some(shares),
            CloseReason::Forced,
            now,
        )?;
        self.ctx.history.lock().await.record(record.clone());
        Ok(record)
    }

    pub fn status(&self, id: &str) -> Option<StrategyState> {
        self.registry.get(id).map(|state| state.clone())
    }

    /// Every known strategy, ordered by id
    pub fn statuses(&self) -> Vec<StrategyState> {
        let mut states: Vec<StrategyState> = self.registry.iter().map(|e| e.value().clone()).collect();
        states.sort_by(|a, b| a.config.id.cmp(&b.config.id));
        states
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.registry
            .get(id)
            .is_some_and(|state| state.status == StrategyStatus::Running)
    }

    async fn alert(
        &self,
        kind: AlertKind,
        level: AlertLevel,
        title: &str,
        message: String,
        payload: serde_json::Value,
    ) {
        let alert = Alert::new(kind, level, title, message, self.ctx.clock.now()).with_payload(payload);
        self.ctx.notify(alert).await;
    }
}

/// Wait on a worker and record how it ended
async fn supervise(
    id: String,
    task: JoinHandle<Result<()>>,
    registry: Arc<DashMap<String, StrategyState>>,
    ctx: TradingContext,
) {
    let failure = match task.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(e) if e.is_panic() => Some("worker panicked".to_string()),
        // Aborted by stop
        Err(_) => None,
    };
    let Some(message) = failure else {
        return;
    };

    error!("[SCHEDULER] {} failed: {}", id, message);
    if let Some(mut state) = registry.get_mut(&id) {
        state.status = StrategyStatus::Error;
        state.last_error = Some(message.clone());
    }
    let alert = Alert::new(
        AlertKind::SystemError,
        AlertLevel::Critical,
        "Strategy failed",
        format!("{id}: {message}"),
        ctx.clock.now(),
    )
    .with_payload(json!({ "strategy_id": id }));
    ctx.notify(alert).await;
}
