use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{NotificationEvent, Notifier};

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    /// `None` when `DISCORD_WEBHOOK_URL` is unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("DISCORD_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .map(Self::new)
    }

    fn payload(ev: &NotificationEvent) -> DiscordWebhookPayload {
        let (title, description, color) = match ev {
            NotificationEvent::Success {
                source_id,
                label,
                item_count,
                elapsed_secs,
            } => (
                format!("Crawl completed: {label}"),
                format!(
                    "**Source:** {source_id}\n**Beans:** {item_count}\n\
                     **Elapsed:** {elapsed_secs:.2}s"
                ),
                0x2e_cc_71,
            ),
            NotificationEvent::Failure {
                source_id,
                label,
                cause,
            } => (
                format!("Crawl failed: {label}"),
                format!("**Source:** {source_id}\n**Cause:** {cause}"),
                0xe7_4c_3c,
            ),
        };
        DiscordWebhookPayload {
            content: None,
            embeds: vec![DiscordEmbed {
                title,
                description,
                color,
            }],
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let payload = Self::payload(ev);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}
