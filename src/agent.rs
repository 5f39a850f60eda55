//! LLM agent module for task summarization.
//!
//! Builds one provider-agnostic prompt from a [`Snapshot`] and routes it to the
//! provider selected in the settings. There is no fallback between providers.

use crate::config::Settings;
use crate::providers::{AnthropicAdapter, GeminiAdapter, OpenAiAdapter, SummaryProvider};
use crate::snapshot::Snapshot;
use std::fmt::Write;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Name of the product and of its assistant as they appear in the prompt
const PRODUCT_NAME: &str = "Bolt";

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("{0}")]
    Configuration(String),
    #[error("{provider} API error: {status} {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Summarization providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        }
    }

    /// Display name used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic",
            Provider::Gemini => "Gemini",
            Provider::OpenAi => "OpenAI",
        }
    }

    /// The key configured for this provider in the settings
    fn api_key<'a>(&self, settings: &'a Settings) -> &'a str {
        match self {
            Provider::Anthropic => &settings.anthropic_api_key,
            Provider::Gemini => &settings.gemini_api_key,
            Provider::OpenAi => &settings.openai_api_key,
        }
    }
}

impl FromStr for Provider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(AgentError::Configuration(format!(
                "Unknown API provider: {other}"
            ))),
        }
    }
}

/// Build the prompt shared by all providers
pub fn build_prompt(snapshot: &Snapshot) -> String {
    let mut prompt = format!(
        "Based on the following information from a {PRODUCT_NAME} session, provide a concise summary of the task's outcome, highlight any errors or issues, and state what user input is currently awaited.\n\n"
    );

    // Writing to a String cannot fail
    let _ = write!(
        prompt,
        "User's last message:\n{}\n\n{PRODUCT_NAME}'s last response:\n{}\n\n",
        snapshot.last_user_message, snapshot.last_bolt_message
    );

    if !snapshot.artifacts.is_empty() {
        prompt.push_str("Artifacts and their actions:\n");
        for artifact in &snapshot.artifacts {
            let _ = writeln!(prompt, "- {}", artifact.title);
            for action in &artifact.actions {
                let _ = writeln!(
                    prompt,
                    "  - {} {}: {}",
                    action.kind, action.target, action.status
                );
            }
        }
        prompt.push('\n');
    }

    if !snapshot.pinned_messages.is_empty() {
        prompt.push_str("Pinned messages:\n");
        for message in &snapshot.pinned_messages {
            let _ = writeln!(
                prompt,
                "- [{}] {}: {}",
                message.kind, message.heading, message.content
            );
        }
    }

    prompt
}

/// Routes summaries to the provider selected in the settings
#[derive(Clone)]
pub struct SummaryRouter {
    anthropic: Arc<dyn SummaryProvider>,
    gemini: Arc<dyn SummaryProvider>,
    openai: Arc<dyn SummaryProvider>,
}

impl SummaryRouter {
    /// Router backed by the public provider endpoints
    pub fn new() -> Result<Self, AgentError> {
        Ok(Self {
            anthropic: Arc::new(AnthropicAdapter::new()?),
            gemini: Arc::new(GeminiAdapter::new()?),
            openai: Arc::new(OpenAiAdapter::new()?),
        })
    }

    /// Replace the adapter used for one provider
    pub fn with_adapter(mut self, provider: Provider, adapter: Arc<dyn SummaryProvider>) -> Self {
        match provider {
            Provider::Anthropic => self.anthropic = adapter,
            Provider::Gemini => self.gemini = adapter,
            Provider::OpenAi => self.openai = adapter,
        }
        self
    }

    fn adapter(&self, provider: Provider) -> &dyn SummaryProvider {
        match provider {
            Provider::Anthropic => self.anthropic.as_ref(),
            Provider::Gemini => self.gemini.as_ref(),
            Provider::OpenAi => self.openai.as_ref(),
        }
    }

    /// Run the summarization for a snapshot with the selected provider
    pub async fn summarize(&self, snapshot: &Snapshot, settings: &Settings) -> Result<String, AgentError> {
        if !settings.has_any_api_key() {
            return Err(AgentError::Configuration(
                "No API key configured for any provider".to_string(),
            ));
        }

        let provider: Provider = settings.api_provider.parse()?;
        let api_key = provider.api_key(settings);
        if api_key.is_empty() {
            return Err(AgentError::Configuration(format!(
                "{} API key not set",
                provider.label()
            )));
        }

        info!(provider = provider.as_str(), "generating summary");
        let prompt = build_prompt(snapshot);
        self.adapter(provider).generate(&prompt, api_key).await
    }
}
