//! # Boltwatch
//!
//! Watches a Bolt chat page for finished tasks and posts a notification to a Discord webhook.
//!
//! ## Features
//!
//! - **Structured Extraction**: turns the chat page into a typed `Snapshot` of messages, artifacts and pinned notes
//! - **Provider Agnostic**: summarizes with Anthropic, Gemini or OpenAI behind one prompt
//! - **Best Effort**: every failure is logged and reported, never fatal to the watcher

pub mod agent;
pub mod config;
pub mod detector;
pub mod notify;
pub mod pipeline;
pub mod providers;
pub mod scraper;
pub mod snapshot;

pub use config::{Config, ConfigStore, Settings};
pub use detector::{CompletionDetector, Watcher};
pub use pipeline::{NotificationStatus, Pipeline, Trigger};
pub use snapshot::Snapshot;
