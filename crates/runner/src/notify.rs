//! Notification center
//!
//! The runtime's `Notifier`: logs every alert at a level matching its
//! urgency, keeps a bounded history, and fans alerts out over a broadcast
//! channel. Delivery to mail or chat is a subscriber's job.

use std::collections::VecDeque;

use async_trait::async_trait;
use log::{error, info, warn};
use meridian_ports::{Alert, AlertKind, AlertLevel, Notifier};
use tokio::sync::{Mutex, broadcast};

const CHANNEL_CAPACITY: usize = 256;

pub struct NotificationCenter {
    history: Mutex<VecDeque<Alert>>,
    capacity: usize,
    sender: broadcast::Sender<Alert>,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            sender,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.sender.subscribe()
    }

    /// Retained alerts, oldest first
    pub async fn history(&self) -> Vec<Alert> {
        self.history.lock().await.iter().cloned().collect()
    }

    pub async fn by_kind(&self, kind: AlertKind) -> Vec<Alert> {
        self.history
            .lock()
            .await
            .iter()
            .filter(|a| a.kind == kind)
            .cloned()
            .collect()
    }

    pub async fn count(&self, kind: AlertKind) -> usize {
        self.history.lock().await.iter().filter(|a| a.kind == kind).count()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl Notifier for NotificationCenter {
    async fn notify(&self, alert: Alert) {
        match alert.level {
            AlertLevel::Info => info!("[ALERT] {}: {}", alert.title, alert.message),
            AlertLevel::Warning => warn!("[ALERT] {}: {}", alert.title, alert.message),
            AlertLevel::Critical => error!("[ALERT] {}: {}", alert.title, alert.message),
        }

        {
            let mut history = self.history.lock().await;
            if self.capacity > 0 {
                if history.len() == self.capacity {
                    history.pop_front();
                }
                history.push_back(alert.clone());
            }
        }

        // No subscribers is fine
        let _ = self.sender.send(alert);
    }
}
