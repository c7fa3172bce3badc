use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{NotificationEvent, Notifier};

pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailSender {
    /// `Ok(None)` when `SMTP_HOST` is unset; an error when it is set but the rest is incomplete.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            return Ok(None);
        };
        let var = |k: &str| std::env::var(k).with_context(|| format!("{k} missing"));
        let user = var("SMTP_USER")?;
        let pass = var("SMTP_PASS")?;
        let from_addr = var("NOTIFY_EMAIL_FROM")?;
        let to_addr = var("NOTIFY_EMAIL_TO")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();

        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;
        let to = to_addr.parse().context("invalid NOTIFY_EMAIL_TO")?;

        Ok(Some(Self { mailer, from, to }))
    }
}

fn body_for(ev: &NotificationEvent) -> String {
    match ev {
        NotificationEvent::Success {
            source_id,
            label,
            item_count,
            elapsed_secs,
        } => format!(
            "Source: {label} ({source_id})\nBeans: {item_count}\nElapsed: {elapsed_secs:.2}s\n"
        ),
        NotificationEvent::Failure {
            source_id,
            label,
            cause,
        } => format!("Source: {label} ({source_id})\nCause: {cause}\n"),
    }
}

#[async_trait::async_trait]
impl Notifier for EmailSender {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let msg = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(ev.headline())
            .header(header::ContentType::TEXT_PLAIN)
            .body(body_for(ev))
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
