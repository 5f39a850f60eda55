//! Discord webhook notifications.

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

/// Discord's message character limit
pub const MAX_MESSAGE_LENGTH: usize = 2000;

const HEADER: &str = "### Task Completed\n";
const TRUNCATION_NOTICE: &str = "\n\n... (truncated)";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Discord webhook URL not set")]
    MissingWebhook,
    #[error("Discord webhook error: {status} {body}")]
    Delivery { status: u16, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Body of a webhook POST
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub content: String,
}

impl WebhookMessage {
    pub fn new(summary: &str) -> Self {
        Self {
            content: format_message(summary),
        }
    }
}

/// Wrap a summary in the notification header, truncating to the length limit.
///
/// Lengths are counted in characters; a truncated message keeps the notice intact.
pub fn format_message(summary: &str) -> String {
    let message = format!("{HEADER}{summary}");
    if message.chars().count() <= MAX_MESSAGE_LENGTH {
        return message;
    }

    let keep = MAX_MESSAGE_LENGTH - TRUNCATION_NOTICE.chars().count();
    let mut truncated: String = message.chars().take(keep).collect();
    truncated.push_str(TRUNCATION_NOTICE);
    truncated
}

/// Posts notifications to a webhook. There is no retry.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
}

impl Notifier {
    pub fn new() -> Result<Self, NotifyError> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    /// Deliver a summary to the webhook
    pub async fn notify(&self, summary: &str, webhook_url: &str) -> Result<(), NotifyError> {
        if webhook_url.is_empty() {
            return Err(NotifyError::MissingWebhook);
        }

        let message = WebhookMessage::new(summary);
        // Webhook URLs embed their token, so it is stripped from transport errors
        let response = self
            .client
            .post(webhook_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "webhook rejected notification");
            return Err(NotifyError::Delivery {
                status: status.as_u16(),
                body,
            });
        }

        info!(chars = message.content.chars().count(), "notification delivered");
        Ok(())
    }
}
