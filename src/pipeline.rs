//! Summarize-and-notify pipeline run once per trigger.

use crate::agent::{AgentError, SummaryRouter};
use crate::config::Settings;
use crate::notify::{Notifier, NotifyError};
use crate::snapshot::Snapshot;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Discord webhook URL is required")]
    MissingWebhook,
    #[error(transparent)]
    Summary(#[from] AgentError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// What started a pipeline run
#[derive(Debug, Clone)]
pub enum Trigger {
    /// A task finished and the page was extracted
    TaskCompleted(Snapshot),
    /// Run against a fixed synthetic snapshot
    TestNotification,
}

impl Trigger {
    fn into_snapshot(self) -> Snapshot {
        match self {
            Trigger::TaskCompleted(snapshot) => snapshot,
            Trigger::TestNotification => Snapshot::test_fixture(),
        }
    }
}

/// Outcome reported back to whoever started the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename = "notificationSent")]
pub struct NotificationStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationStatus {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    router: SummaryRouter,
    notifier: Notifier,
}

impl Pipeline {
    pub fn new(router: SummaryRouter, notifier: Notifier) -> Self {
        Self { router, notifier }
    }

    /// Pipeline talking to the public provider endpoints
    pub fn with_defaults() -> Result<Self, PipelineError> {
        Ok(Self::new(SummaryRouter::new()?, Notifier::new()?))
    }

    /// Run the pipeline and report the outcome. Failures are logged, never raised.
    pub async fn handle(&self, trigger: Trigger, settings: &Settings) -> NotificationStatus {
        match self.run(trigger, settings).await {
            Ok(()) => NotificationStatus::sent(),
            Err(e) => {
                error!(error = %e, "error handling task completion");
                NotificationStatus::failed(e.to_string())
            }
        }
    }

    /// Summarize the snapshot when the selected provider has a key, otherwise
    /// forward the last assistant message, then deliver it.
    pub async fn run(&self, trigger: Trigger, settings: &Settings) -> Result<(), PipelineError> {
        if settings.discord_webhook_url.is_empty() {
            return Err(PipelineError::MissingWebhook);
        }

        let snapshot = trigger.into_snapshot();
        let text = if settings.selected_api_key().is_some() {
            self.router.summarize(&snapshot, settings).await?
        } else {
            info!("no key for selected provider, forwarding last message verbatim");
            snapshot.last_bolt_message
        };

        self.notifier
            .notify(&text, &settings.discord_webhook_url)
            .await?;
        Ok(())
    }
}
