//! Page extraction module.
//!
//! Uses reqwest or the filesystem for fetching and scraper for HTML parsing.
//! All selectors live in a [`SelectorTable`] so markup changes on the page only
//! require a config change.

use crate::snapshot::{Action, ActionKind, ActionStatus, Artifact, PinnedKind, PinnedMessage, Snapshot};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// User-Agent string identifying this scraper
const USER_AGENT: &str = concat!("boltwatch/", env!("CARGO_PKG_VERSION"));

/// Default timeout for HTTP requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const UNNAMED_ARTIFACT: &str = "Unnamed Artifact";

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("failed to fetch URL: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("failed to read page file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("no content found at {0}")]
    NoContent(String),
}

/// Every selector and marker the extractor depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    pub chat_container: String,
    pub message: String,
    /// User messages carry a trailing-position marker class
    pub user_message: String,
    pub message_heading: String,
    /// Heading text identifying assistant messages
    pub assistant_name: String,
    pub message_content: String,
    pub artifact: String,
    pub artifact_title: String,
    pub artifact_actions: String,
    pub action_row: String,
    pub action_target: String,
    pub success_icon: String,
    pub warning_icon: String,
    pub error_icon: String,
    pub pinned_message: String,
    pub pinned_heading: String,
    pub pinned_content: String,
    /// Present on the page while a task is running
    pub stop_indicator: String,
    pub mode_toggle: String,
    /// Class carried by the mode toggle while discuss mode is active
    pub discuss_mode_class: String,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            chat_container: r#"section[aria-label="Chat"]"#.to_string(),
            message: "div[data-message-id]".to_string(),
            user_message: "div[data-message-id].self-end".to_string(),
            message_heading: "h3".to_string(),
            assistant_name: "Bolt".to_string(),
            message_content: r#"div[class*="_MarkdownContent_"]"#.to_string(),
            artifact: r#"div.collapsible.artifact, div[class*="collapsible"][class*="artifact"]"#
                .to_string(),
            artifact_title: r#"div.p-5.pl-0.grow.font-medium, div[class*="p-5"][class*="pl-0"][class*="grow"][class*="font-medium"]"#
                .to_string(),
            artifact_actions: r#"div.actions, div[class*="actions"]"#.to_string(),
            action_row: "li".to_string(),
            action_target: "code".to_string(),
            success_icon: r#"[class*="i-ph:check"]"#.to_string(),
            warning_icon: r#"[class*="i-ph:warning"]"#.to_string(),
            error_icon: r#"[class*="i-ph:x"]"#.to_string(),
            pinned_message: r#"div.pinned-message, div[class*="pinned-message"]"#.to_string(),
            pinned_heading: "h4".to_string(),
            pinned_content: "p".to_string(),
            stop_indicator: r#"button div[class*="i-ph:stop-circle-bold"]"#.to_string(),
            mode_toggle: r#"button[aria-label="Toggle mode"]"#.to_string(),
            discuss_mode_class: "text-bolt-elements-item-contentAccent!".to_string(),
        }
    }
}

fn compile(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|e| ScraperError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Extracts a [`Snapshot`] from a parsed page.
///
/// Extraction never fails: each step falls back to an empty or default value
/// when the element it looks for is missing.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    chat_container: Selector,
    message: Selector,
    user_message: Selector,
    message_heading: Selector,
    message_content: Selector,
    artifact: Selector,
    artifact_title: Selector,
    artifact_actions: Selector,
    action_row: Selector,
    action_target: Selector,
    success_icon: Selector,
    warning_icon: Selector,
    error_icon: Selector,
    pinned_message: Selector,
    pinned_heading: Selector,
    pinned_content: Selector,
    stop_indicator: Selector,
    mode_toggle: Selector,
    assistant_name: String,
    discuss_mode_class: String,
}

impl PageExtractor {
    /// Compile every selector in the table
    pub fn new(table: &SelectorTable) -> Result<Self, ScraperError> {
        Ok(Self {
            chat_container: compile(&table.chat_container)?,
            message: compile(&table.message)?,
            user_message: compile(&table.user_message)?,
            message_heading: compile(&table.message_heading)?,
            message_content: compile(&table.message_content)?,
            artifact: compile(&table.artifact)?,
            artifact_title: compile(&table.artifact_title)?,
            artifact_actions: compile(&table.artifact_actions)?,
            action_row: compile(&table.action_row)?,
            action_target: compile(&table.action_target)?,
            success_icon: compile(&table.success_icon)?,
            warning_icon: compile(&table.warning_icon)?,
            error_icon: compile(&table.error_icon)?,
            pinned_message: compile(&table.pinned_message)?,
            pinned_heading: compile(&table.pinned_heading)?,
            pinned_content: compile(&table.pinned_content)?,
            stop_indicator: compile(&table.stop_indicator)?,
            mode_toggle: compile(&table.mode_toggle)?,
            assistant_name: table.assistant_name.clone(),
            discuss_mode_class: table.discuss_mode_class.clone(),
        })
    }

    /// Parse raw HTML and extract a snapshot from it
    pub fn extract_html(&self, html: &str) -> Snapshot {
        self.extract(&Html::parse_document(html))
    }

    /// Extract the conversation state from the page
    pub fn extract(&self, document: &Html) -> Snapshot {
        let Some(chat) = document.select(&self.chat_container).next() else {
            warn!("chat section not found");
            return Snapshot::default();
        };

        let last_user_message = chat
            .select(&self.user_message)
            .last()
            .map(|message| self.message_text(message))
            .unwrap_or_default();

        let (last_bolt_message, artifacts) = match self.last_assistant_message(chat) {
            Some(message) => (self.message_text(message), self.extract_artifacts(message)),
            None => {
                debug!(assistant = %self.assistant_name, "no assistant message found");
                (String::new(), Vec::new())
            }
        };

        Snapshot {
            last_user_message,
            last_bolt_message,
            artifacts,
            pinned_messages: self.extract_pinned_messages(document),
        }
    }

    /// Check whether the "stop" indicator of a running task is on the page
    pub fn stop_indicator_present(&self, document: &Html) -> bool {
        document.select(&self.stop_indicator).next().is_some()
    }

    /// Report whether discuss mode is active, or `None` if the toggle is absent
    pub fn discuss_mode_active(&self, document: &Html) -> Option<bool> {
        let toggle = document.select(&self.mode_toggle).next()?;
        let active = toggle
            .value()
            .classes()
            .any(|class| class == self.discuss_mode_class);
        Some(active)
    }

    fn last_assistant_message<'a>(&self, chat: ElementRef<'a>) -> Option<ElementRef<'a>> {
        chat.select(&self.message)
            .filter(|message| {
                message
                    .select(&self.message_heading)
                    .next()
                    .is_some_and(|heading| text_of(heading).trim() == self.assistant_name)
            })
            .last()
    }

    /// Text of the content region nested in a message
    fn message_text(&self, message: ElementRef<'_>) -> String {
        message
            .select(&self.message_content)
            .next()
            .map(text_of)
            .unwrap_or_default()
    }

    fn extract_artifacts(&self, message: ElementRef<'_>) -> Vec<Artifact> {
        message
            .select(&self.artifact)
            .map(|artifact| self.extract_artifact(artifact))
            .collect()
    }

    fn extract_artifact(&self, artifact: ElementRef<'_>) -> Artifact {
        let title = artifact
            .select(&self.artifact_title)
            .next()
            .map(|title| text_of(title).trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNNAMED_ARTIFACT.to_string());

        let actions = match artifact.select(&self.artifact_actions).next() {
            Some(container) => container
                .select(&self.action_row)
                .map(|row| self.extract_action(row))
                .collect(),
            None => {
                debug!(%title, "artifact has no actions container");
                Vec::new()
            }
        };

        Artifact { title, actions }
    }

    fn extract_action(&self, row: ElementRef<'_>) -> Action {
        let kind = ActionKind::classify(&text_of(row));

        let target = row
            .select(&self.action_target)
            .next()
            .map(text_of)
            .unwrap_or_default();

        let status = if has_match(row, &self.success_icon) {
            ActionStatus::Success
        } else if has_match(row, &self.error_icon) {
            ActionStatus::Error
        } else {
            ActionStatus::Pending
        };

        Action { kind, target, status }
    }

    fn extract_pinned_messages(&self, document: &Html) -> Vec<PinnedMessage> {
        document
            .select(&self.pinned_message)
            .map(|element| {
                let heading = element
                    .select(&self.pinned_heading)
                    .next()
                    .map(text_of)
                    .unwrap_or_default();
                let content = element
                    .select(&self.pinned_content)
                    .next()
                    .map(text_of)
                    .unwrap_or_default();

                let kind = if has_match(element, &self.success_icon) {
                    PinnedKind::Success
                } else if has_match(element, &self.warning_icon) {
                    PinnedKind::Warning
                } else if has_match(element, &self.error_icon) {
                    PinnedKind::Error
                } else {
                    PinnedKind::Info
                };

                PinnedMessage { heading, content, kind }
            })
            .collect()
    }
}

/// Concatenated text of all descendant text nodes
fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn has_match(element: ElementRef<'_>, selector: &Selector) -> bool {
    element.select(selector).next().is_some()
}

/// Where the page HTML comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Fetch the current page HTML
    async fn fetch(&self) -> Result<String, ScraperError>;

    /// Ask the page to switch into discuss mode
    async fn request_discuss_mode(&self) -> Result<(), ScraperError> {
        warn!(source = %self.describe(), "discuss mode is off and this source cannot toggle it");
        Ok(())
    }
}

/// A page fetched over HTTP(S)
pub struct HttpPage {
    url: String,
    client: Client,
}

impl HttpPage {
    pub fn new(url: impl Into<String>) -> Result<Self, ScraperError> {
        Ok(Self {
            url: url.into(),
            client: create_client()?,
        })
    }
}

/// Create a configured HTTP client for scraping
fn create_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

#[async_trait]
impl PageSource for HttpPage {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String, ScraperError> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let html = response.text().await?;
        if html.trim().is_empty() {
            return Err(ScraperError::NoContent(self.url.clone()));
        }
        Ok(html)
    }
}

/// A page dumped to a local file, re-read on every fetch
pub struct FilePage {
    path: PathBuf,
}

impl FilePage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for FilePage {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String, ScraperError> {
        let html = tokio::fs::read_to_string(&self.path).await?;
        if html.trim().is_empty() {
            return Err(ScraperError::NoContent(self.describe()));
        }
        Ok(html)
    }
}

/// Pick a page source for a URL or file path
pub fn page_source_for(target: &str) -> Result<Box<dyn PageSource>, ScraperError> {
    if target.starts_with("http://") || target.starts_with("https://") {
        Ok(Box::new(HttpPage::new(target)?))
    } else {
        Ok(Box::new(FilePage::new(target)))
    }
}
