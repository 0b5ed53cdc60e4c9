//! Notification sinks.

use super::NotificationSink;
use async_trait::async_trait;
use rhizone_ledger::MemberId;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send_public(&self, text: &str) {
        info!(target: "rhizone::public", "{}", text);
    }

    async fn send_private(&self, text: &str) {
        warn!(target: "rhizone::private", "{}", text);
    }

    async fn send_to(&self, member: MemberId, _text: &str) {
        // The text may carry a live token; keep it out of the log
        info!(target: "rhizone::direct", "Direct notice for member {}", member);
    }
}

/// Keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    public: Mutex<Vec<String>>,
    private: Mutex<Vec<String>>,
    direct: Mutex<Vec<(MemberId, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Public announcements so far.
    pub async fn public(&self) -> Vec<String> {
        self.public.lock().await.clone()
    }

    /// Private alerts so far.
    pub async fn private(&self) -> Vec<String> {
        self.private.lock().await.clone()
    }

    /// Direct messages so far, with their recipient.
    pub async fn direct(&self) -> Vec<(MemberId, String)> {
        self.direct.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_public(&self, text: &str) {
        self.public.lock().await.push(text.to_string());
    }

    async fn send_private(&self, text: &str) {
        self.private.lock().await.push(text.to_string());
    }

    async fn send_to(&self, member: MemberId, text: &str) {
        self.direct.lock().await.push((member, text.to_string()));
    }
}
