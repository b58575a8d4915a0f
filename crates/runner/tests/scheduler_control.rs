//! Scheduler Control Integration Test
//!
//! Exercises the task-level controls around strategy workers:
//! - start / stop status transitions and their alerts
//! - duplicate starts, unknown stops, invalid parameters
//! - repeated iteration failures mark only that strategy `Error`, and a
//!   later stop keeps it
//! - emergency stop closes what it can and reports the rest

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use meridian_clock::ManualClock;
use meridian_core::{CloseReason, OrderRequest, Side};
use meridian_gateway::{PaperBroker, ReplayMarketData};
use meridian_ports::{AlertKind, AlertLevel, BrokerError};
use meridian_risk_manager::{RiskGate, RiskLimits};
use meridian_runner::{
    NotificationCenter, SchedulerConfig, SchedulerError, StrategyConfig, StrategyScheduler, StrategyStatus,
    TradingContext,
};
use meridian_strategy::{CrossoverConfig, StrategyParams};
use rust_decimal_macros::dec;

fn context(broker: &PaperBroker, notes: &Arc<NotificationCenter>) -> TradingContext {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap()));
    TradingContext::new(
        RiskGate::new(RiskLimits::default()).unwrap(),
        Arc::new(broker.clone()),
        Arc::new(ReplayMarketData::new()),
        notes.clone(),
        clock,
    )
}

fn idle_strategy(id: &str) -> StrategyConfig {
    // No bars for SPY: every iteration skips the symbol
    StrategyConfig::new(id, vec!["SPY".to_string()], StrategyParams::default())
}

#[tokio::test]
async fn test_start_stop_transitions() {
    let _ = env_logger::try_init();
    let broker = PaperBroker::new(dec!(100000));
    let notes = Arc::new(NotificationCenter::new(50));
    let scheduler = StrategyScheduler::new(context(&broker, &notes), SchedulerConfig::default());

    scheduler.start(idle_strategy("trend")).await.unwrap();
    assert!(scheduler.is_running("trend"));

    let err = scheduler.start(idle_strategy("trend")).await.unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyRunning(id) if id == "trend"));

    scheduler.stop("trend").await.unwrap();
    let state = scheduler.status("trend").unwrap();
    assert_eq!(state.status, StrategyStatus::Stopped);
    assert!(state.last_error.is_none());

    let err = scheduler.stop("trend").await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotRunning(_)));

    // A stopped strategy can be started again
    scheduler.start(idle_strategy("trend")).await.unwrap();
    assert!(scheduler.is_running("trend"));
    scheduler.stop("trend").await.unwrap();

    assert_eq!(notes.count(AlertKind::StrategyStarted).await, 2);
    assert_eq!(notes.count(AlertKind::StrategyStopped).await, 2);
}

#[tokio::test]
async fn test_invalid_parameters_are_not_registered() {
    let broker = PaperBroker::new(dec!(100000));
    let notes = Arc::new(NotificationCenter::new(50));
    let scheduler = StrategyScheduler::new(context(&broker, &notes), SchedulerConfig::default());

    let config = StrategyConfig::new(
        "backwards",
        vec!["SPY".to_string()],
        StrategyParams::MaCrossover(CrossoverConfig {
            fast_period: 30,
            slow_period: 10,
        }),
    );
    let err = scheduler.start(config).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Strategy(_)));
    assert!(scheduler.status("backwards").is_none());
    assert_eq!(notes.count(AlertKind::StrategyStarted).await, 0);
}

#[tokio::test]
async fn test_statuses_sorted_by_id() {
    let broker = PaperBroker::new(dec!(100000));
    let notes = Arc::new(NotificationCenter::new(50));
    let scheduler = StrategyScheduler::new(context(&broker, &notes), SchedulerConfig::default());

    scheduler.start(idle_strategy("zeta")).await.unwrap();
    scheduler.start(idle_strategy("alpha")).await.unwrap();
    let ids: Vec<String> = scheduler.statuses().into_iter().map(|s| s.config.id).collect();
    assert_eq!(ids, vec!["alpha".to_string(), "zeta".to_string()]);

    let report = scheduler.emergency_stop().await;
    assert_eq!(report.stopped.len(), 2);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_repeated_failures_mark_strategy_error() {
    let broker = PaperBroker::new(dec!(100000));
    broker
        .fail_account(Some(BrokerError::Network("connection reset".into())))
        .await;
    let notes = Arc::new(NotificationCenter::new(50));
    let timings = SchedulerConfig {
        error_backoff_secs: 0,
        max_consecutive_errors: 2,
        ..SchedulerConfig::default()
    };
    let scheduler = StrategyScheduler::new(context(&broker, &notes), timings);

    scheduler.start(idle_strategy("fragile")).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while scheduler.status("fragile").map(|s| s.status) != Some(StrategyStatus::Error) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "strategy never reached Error");

    let state = scheduler.status("fragile").unwrap();
    assert!(state.last_error.unwrap().contains("2 consecutive errors"));

    let critical: Vec<_> = notes
        .by_kind(AlertKind::SystemError)
        .await
        .into_iter()
        .filter(|a| a.level == AlertLevel::Critical)
        .collect();
    assert!(critical.iter().any(|a| a.message.starts_with("fragile:")));

    // The handle is still registered; stopping a failed worker joins cleanly
    // and keeps the failure visible
    scheduler.stop("fragile").await.unwrap();
    let state = scheduler.status("fragile").unwrap();
    assert_eq!(state.status, StrategyStatus::Error);
    assert!(state.last_error.unwrap().contains("2 consecutive errors"));
    assert!(!scheduler.is_running("fragile"));

    // A restart clears it
    broker.fail_account(None).await;
    scheduler.start(idle_strategy("fragile")).await.unwrap();
    let state = scheduler.status("fragile").unwrap();
    assert_eq!(state.status, StrategyStatus::Running);
    assert!(state.last_error.is_none());
    scheduler.stop("fragile").await.unwrap();
    assert_eq!(scheduler.status("fragile").unwrap().status, StrategyStatus::Stopped);
}

#[tokio::test]
async fn test_emergency_stop_reports_partial_failure() {
    let _ = env_logger::try_init();
    let broker = PaperBroker::new(dec!(100000))
        .with_price("AAPL", dec!(100))
        .with_price("MSFT", dec!(400));
    let notes = Arc::new(NotificationCenter::new(50));
    let ctx = context(&broker, &notes);
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap();

    let router = ctx.router();
    for (symbol, shares, price) in [("AAPL", dec!(100), dec!(100)), ("MSFT", dec!(20), dec!(400))] {
        router
            .submit(OrderRequest::market(symbol, Side::Buy, shares).with_strategy("trend"))
            .await
            .unwrap();
        ctx.ledger
            .lock()
            .await
            .open("trend", symbol, shares, price, None, None, now)
            .unwrap();
    }
    broker.fail_symbol("MSFT", BrokerError::Network("down".into()));

    let scheduler = StrategyScheduler::new(ctx.clone(), SchedulerConfig::default());
    scheduler.start(idle_strategy("trend")).await.unwrap();

    let report = scheduler.emergency_stop().await;
    assert_eq!(report.stopped, vec!["trend".to_string()]);
    assert!(report.unresponsive.is_empty());
    assert!(!report.is_clean());

    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].symbol, "AAPL");
    assert_eq!(report.closed[0].close_reason, CloseReason::Forced);
    assert_eq!(report.closed[0].exit_price, dec!(100));

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].symbol, "MSFT");
    assert!(report.failures[0].error.contains("Network error: down"));

    assert!(ctx.ledger.lock().await.contains("trend", "MSFT"));
    assert!(!ctx.ledger.lock().await.contains("trend", "AAPL"));
    assert_eq!(ctx.history.lock().await.len(), 1);
    assert!(ctx.risk.lock().await.is_halted());
    assert_eq!(scheduler.status("trend").unwrap().status, StrategyStatus::Stopped);

    let alerts = notes.by_kind(AlertKind::EmergencyStop).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, AlertLevel::Critical);
}
