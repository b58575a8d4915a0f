use async_trait::async_trait;
use meridian_core::Timestamp;
use serde::{Deserialize, Serialize};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TradeExecuted,
    StopLossTriggered,
    TakeProfitTriggered,
    DailyLossLimit,
    EmergencyStop,
    StrategyStarted,
    StrategyStopped,
    SystemError,
    TradingModeChanged,
}

/// How urgent it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// An outbound notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    /// Structured details (symbol, prices, reasons)
    pub payload: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        level: AlertLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            kind,
            level,
            title: title.into(),
            message: message.into(),
            payload: serde_json::Value::Null,
            timestamp,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Port for outbound alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: Alert);
}
