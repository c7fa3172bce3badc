// src/notify/mod.rs
//! Fire-and-forget run notifications. A failing channel is logged and ignored;
//! it never fails the run.

pub mod discord;
pub mod email;
pub mod slack;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Success {
        source_id: String,
        label: String,
        item_count: usize,
        elapsed_secs: f64,
    },
    Failure {
        source_id: String,
        label: String,
        cause: String,
    },
}

impl NotificationEvent {
    pub fn source_id(&self) -> &str {
        match self {
            NotificationEvent::Success { source_id, .. }
            | NotificationEvent::Failure { source_id, .. } => source_id,
        }
    }

    /// One-line summary shared by every channel.
    pub fn headline(&self) -> String {
        match self {
            NotificationEvent::Success {
                source_id,
                label,
                item_count,
                elapsed_secs,
            } => format!(
                "Crawl OK: {label} ({source_id}) - {item_count} beans in {elapsed_secs:.2}s"
            ),
            NotificationEvent::Failure {
                source_id,
                label,
                cause,
            } => format!("Crawl FAILED: {label} ({source_id}) - {cause}"),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one event out to every configured channel.
#[derive(Clone, Default)]
pub struct NotifierMux {
    channels: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Slack, Discord and SMTP channels whose environment is present.
    pub fn from_env() -> Self {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();
        if let Some(s) = slack::SlackNotifier::from_env() {
            channels.push(Arc::new(s));
        }
        if let Some(d) = discord::DiscordNotifier::from_env() {
            channels.push(Arc::new(d));
        }
        match email::EmailSender::from_env() {
            Ok(Some(e)) => channels.push(Arc::new(e)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "email notifier misconfigured; skipping"),
        }
        Self { channels }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn notify(&self, ev: &NotificationEvent) {
        tracing::info!(target: "notify", source = ev.source_id(), "{}", ev.headline());
        for ch in &self.channels {
            if let Err(e) = ch.send(ev).await {
                tracing::warn!(error = %e, channel = ch.name(), "notification failed");
            }
        }
    }

    pub async fn notify_success(
        &self,
        source_id: &str,
        label: &str,
        item_count: usize,
        elapsed_secs: f64,
    ) {
        self.notify(&NotificationEvent::Success {
            source_id: source_id.to_string(),
            label: label.to_string(),
            item_count,
            elapsed_secs,
        })
        .await
    }

    pub async fn notify_failure(&self, source_id: &str, label: &str, cause: &str) {
        self.notify(&NotificationEvent::Failure {
            source_id: source_id.to_string(),
            label: label.to_string(),
            cause: cause.to_string(),
        })
        .await
    }
}
