//! Snapshot types - the structured state extracted from a chat page.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation state captured once per completion event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Text of the most recent user message
    pub last_user_message: String,
    /// Text of the most recent assistant message
    pub last_bolt_message: String,
    /// Artifacts reported in the most recent assistant message
    pub artifacts: Vec<Artifact>,
    /// Pinned status messages found anywhere on the page
    pub pinned_messages: Vec<PinnedMessage>,
}

impl Snapshot {
    /// The synthetic snapshot used by test notifications
    pub fn test_fixture() -> Self {
        Self {
            last_user_message: "Test user message".to_string(),
            last_bolt_message: "Test Bolt response".to_string(),
            artifacts: Vec::new(),
            pinned_messages: Vec::new(),
        }
    }

    /// Check if nothing at all was extracted
    pub fn is_empty(&self) -> bool {
        self.last_user_message.is_empty()
            && self.last_bolt_message.is_empty()
            && self.artifacts.is_empty()
            && self.pinned_messages.is_empty()
    }
}

/// A grouped set of file/command operations reported by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub title: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Filename or command the action applies to
    pub target: String,
    pub status: ActionStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Create,
    Update,
    #[serde(rename = "Run command")]
    RunCommand,
    #[serde(rename = "Start application")]
    StartApplication,
    #[default]
    Unknown,
}

impl ActionKind {
    /// Classify an action row by its text. Keywords are checked in order and
    /// the first match wins.
    pub fn classify(text: &str) -> Self {
        const KEYWORDS: [(&str, ActionKind); 4] = [
            ("Create", ActionKind::Create),
            ("Update", ActionKind::Update),
            ("Run command", ActionKind::RunCommand),
            ("Start", ActionKind::StartApplication),
        ];

        KEYWORDS
            .iter()
            .find(|(keyword, _)| text.contains(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "Create",
            ActionKind::Update => "Update",
            ActionKind::RunCommand => "Run command",
            ActionKind::StartApplication => "Start application",
            ActionKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Error,
    #[default]
    Pending,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionStatus::Success => "success",
            ActionStatus::Error => "error",
            ActionStatus::Pending => "pending",
        })
    }
}

/// A status banner pinned to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedMessage {
    pub heading: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: PinnedKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinnedKind {
    Success,
    Warning,
    Error,
    #[default]
    Info,
}

impl fmt::Display for PinnedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PinnedKind::Success => "success",
            PinnedKind::Warning => "warning",
            PinnedKind::Error => "error",
            PinnedKind::Info => "info",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_first_keyword_wins() {
        assert_eq!(
            ActionKind::classify("Create then Run command npm install"),
            ActionKind::Create
        );
        assert_eq!(
            ActionKind::classify("Run command and Update"),
            ActionKind::Update
        );
        assert_eq!(
            ActionKind::classify("Start application"),
            ActionKind::StartApplication
        );
        assert_eq!(ActionKind::classify("Delete file"), ActionKind::Unknown);
    }

    #[test]
    fn classify_is_case_sensitive() {
        assert_eq!(ActionKind::classify("create file"), ActionKind::Unknown);
    }

    #[test]
    fn serializes_with_original_field_names() {
        let snapshot = Snapshot {
            artifacts: vec![Artifact {
                title: "Setup".to_string(),
                actions: vec![Action {
                    kind: ActionKind::RunCommand,
                    target: "npm install".to_string(),
                    status: ActionStatus::Pending,
                }],
            }],
            ..Snapshot::test_fixture()
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["lastBoltMessage"], "Test Bolt response");
        assert_eq!(json["artifacts"][0]["actions"][0]["type"], "Run command");
        assert_eq!(json["artifacts"][0]["actions"][0]["status"], "pending");
    }

    #[test]
    fn default_snapshot_is_empty() {
        assert!(Snapshot::default().is_empty());
        assert!(!Snapshot::test_fixture().is_empty());
    }
}
