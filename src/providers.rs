//! Transport adapters for the summarization providers.
//!
//! Each adapter wraps the shared prompt in its provider's request shape,
//! posts it and pulls the first generated text out of the response.

use crate::agent::AgentError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-2.0-flash-lite";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-4.1-nano";
const OPENAI_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes task outcomes from development sessions.";

const MAX_TOKENS: u32 = 1000;

/// A provider that turns a prompt into generated text
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String, AgentError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Send a request and decode a successful JSON response
async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, AgentError> {
    // URLs are dropped from transport errors; Gemini carries the key in the query string
    let response = request
        .send()
        .await
        .map_err(|e| AgentError::Network(e.without_url()))?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(provider, status = status.as_u16(), "provider rejected request");
        return Err(AgentError::Provider {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| AgentError::Network(e.without_url()))?;
    serde_json::from_str(&body).map_err(|e| {
        error!(provider, error = %e, "unexpected response shape");
        AgentError::Provider {
            provider,
            status: status.as_u16(),
            body,
        }
    })
}

fn missing_text(provider: &'static str) -> AgentError {
    AgentError::Provider {
        provider,
        status: 200,
        body: "response contained no generated text".to_string(),
    }
}

// --- Anthropic ---

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'static str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

/// Anthropic Messages API
pub struct AnthropicAdapter {
    client: Client,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new() -> Result<Self, AgentError> {
        Self::with_base_url(ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AgentError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SummaryProvider for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String, AgentError> {
        let request = AnthropicRequest {
            model: ANTHROPIC_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: MAX_TOKENS,
        };

        debug!(model = ANTHROPIC_MODEL, "anthropic messages request");
        let builder = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request);

        let response: AnthropicResponse = send_json(self.name(), builder).await?;
        response
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| missing_text(self.name()))
    }
}

// --- Gemini ---

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: String,
}

/// Google Gemini generateContent API
pub struct GeminiAdapter {
    client: Client,
    base_url: String,
}

impl GeminiAdapter {
    pub fn new() -> Result<Self, AgentError> {
        Self::with_base_url(GEMINI_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AgentError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SummaryProvider for GeminiAdapter {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String, AgentError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, GEMINI_MODEL, api_key
        );

        debug!(model = GEMINI_MODEL, "gemini generateContent request");
        let builder = self.client.post(url).json(&request);

        let response: GeminiResponse = send_json(self.name(), builder).await?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| missing_text(self.name()))
    }
}

// --- OpenAI ---

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'static str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

/// OpenAI Chat Completions API
pub struct OpenAiAdapter {
    client: Client,
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new() -> Result<Self, AgentError> {
        Self::with_base_url(OPENAI_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, AgentError> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SummaryProvider for OpenAiAdapter {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn generate(&self, prompt: &str, api_key: &str) -> Result<String, AgentError> {
        let request = OpenAiRequest {
            model: OPENAI_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: OPENAI_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
        };

        debug!(model = OPENAI_MODEL, "openai chat completion request");
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request);

        let response: OpenAiResponse = send_json(self.name(), builder).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| missing_text(self.name()))
    }
}
