//! Chat data model.
//!
//! A chat is the aggregate root: an ordered list of message ids plus a map of
//! messages keyed by id. Order always comes from the id list, never from map
//! iteration. Messages own their response and reasoning entries the same way
//! (ordered id list + map), and reasoning `files` steps own file artifacts the
//! same way again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Status enums
// ============================================================================

/// Status of a streamed entity (reasoning step, file artifact).
///
/// Transitions are monotonic: `Loading` may move to `Completed` or `Failed`;
/// terminal statuses never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Loading,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Loading => write!(f, "loading"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Kind of asset a file artifact or file response refers to.
///
/// Unknown kinds decode as `Other` so a newer backend cannot break event
/// decoding on older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Metric,
    Dashboard,
    Report,
    Todo,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Metric => write!(f, "metric"),
            FileKind::Dashboard => write!(f, "dashboard"),
            FileKind::Report => write!(f, "report"),
            FileKind::Todo => write!(f, "todo"),
            FileKind::Other => write!(f, "other"),
        }
    }
}

/// User feedback on a finished message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFeedback {
    Negative,
}

// ============================================================================
// Chat aggregate (server shape)
// ============================================================================

/// A chat as persisted and served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub is_favorited: bool,

    /// Order of messages. Every id here has an entry in `messages`.
    pub message_ids: Vec<String>,

    /// Messages keyed by id. Keys are unique; order comes from `message_ids`.
    pub messages: HashMap<String, Message>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub created_by_id: String,
    pub created_by_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_avatar: Option<String>,
}

/// One turn of the conversation: the user's request plus the analyst's
/// streamed response and reasoning entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,

    /// The user turn. Immutable once created; absent for system-initiated
    /// messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_message: Option<RequestMessage>,

    pub response_message_ids: Vec<String>,
    pub response_messages: HashMap<String, ResponseMessage>,

    pub reasoning_message_ids: Vec<String>,
    pub reasoning_messages: HashMap<String, ReasoningStep>,

    /// One-line summary of the reasoning shown once the stream finishes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_reasoning_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<MessageFeedback>,

    pub created_at: DateTime<Utc>,
}

impl Message {
    /// An empty message shell for the given id, used when a delta arrives
    /// before the message itself was seen.
    pub fn shell(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            request_message: None,
            response_message_ids: Vec::new(),
            response_messages: HashMap::new(),
            reasoning_message_ids: Vec::new(),
            reasoning_messages: HashMap::new(),
            final_reasoning_message: None,
            feedback: None,
            created_at,
        }
    }
}

/// The user's side of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub request: String,
    pub sender_id: String,
    pub sender_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
}

// ============================================================================
// Response messages
// ============================================================================

/// A displayed unit of the analyst's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseMessage {
    /// Streaming markdown text.
    Text {
        id: String,

        /// Full text accumulated so far.
        #[serde(default)]
        message: String,

        /// Latest delta; appended by the reducer, never stored long-term.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_chunk: Option<String>,

        #[serde(default)]
        is_final_message: bool,
    },

    /// Reference to a produced asset (metric, dashboard, report).
    File {
        id: String,
        file_type: FileKind,
        file_name: String,
        version_number: u32,

        /// Progress lines shown while the asset was generated.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Vec<FileResponseMetadata>>,
    },
}

impl ResponseMessage {
    pub fn id(&self) -> &str {
        match self {
            ResponseMessage::Text { id, .. } | ResponseMessage::File { id, .. } => id,
        }
    }

    /// Whether this entry is still being streamed.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ResponseMessage::Text {
                is_final_message: false,
                ..
            }
        )
    }
}

/// One progress line attached to a file response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResponseMetadata {
    pub status: String,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

// ============================================================================
// Reasoning steps
// ============================================================================

/// A displayed unit of the analyst's visible thinking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningStep {
    /// Groups of tappable references ("pills") to assets the analyst used.
    Pills {
        id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secondary_title: Option<String>,
        status: StepStatus,

        /// Replaced wholesale on each delta.
        #[serde(default)]
        pill_containers: Vec<PillContainer>,
    },

    /// Streaming prose.
    Text {
        id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secondary_title: Option<String>,
        status: StepStatus,

        #[serde(default)]
        message: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_chunk: Option<String>,
    },

    /// Files being generated, streamed artifact by artifact.
    Files {
        id: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secondary_title: Option<String>,
        status: StepStatus,

        /// Order of artifacts. Every id here has an entry in `files`.
        file_ids: Vec<String>,
        files: HashMap<String, FileArtifact>,
    },
}

impl ReasoningStep {
    pub fn id(&self) -> &str {
        match self {
            ReasoningStep::Pills { id, .. }
            | ReasoningStep::Text { id, .. }
            | ReasoningStep::Files { id, .. } => id,
        }
    }

    pub fn status(&self) -> StepStatus {
        match self {
            ReasoningStep::Pills { status, .. }
            | ReasoningStep::Text { status, .. }
            | ReasoningStep::Files { status, .. } => *status,
        }
    }

    pub fn set_status(&mut self, new_status: StepStatus) {
        match self {
            ReasoningStep::Pills { status, .. }
            | ReasoningStep::Text { status, .. }
            | ReasoningStep::Files { status, .. } => *status = new_status,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ReasoningStep::Pills { title, .. }
            | ReasoningStep::Text { title, .. }
            | ReasoningStep::Files { title, .. } => title,
        }
    }
}

/// A titled group of pills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillContainer {
    pub title: String,
    pub pills: Vec<Pill>,
}

/// A single tappable reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pill {
    pub id: String,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FileKind>,
}

// ============================================================================
// File artifacts
// ============================================================================

/// A `[start, end)` byte span edited by a non-append delta.
pub type ModifiedRange = (usize, usize);

/// A file being generated inside a `files` reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileArtifact {
    pub id: String,
    pub file_type: FileKind,
    pub file_name: String,
    pub version_number: u32,
    pub status: StepStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileContent>,
}

/// Streamed content of a file artifact.
///
/// `text` is the full content so far and never shrinks while the artifact is
/// `loading`. `text_chunk` carries the latest append-only delta; `modified`
/// lists the spans a non-append edit touched, for incremental-diff rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_chunk: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<Vec<ModifiedRange>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_message_serialization() {
        let response = ResponseMessage::Text {
            id: "resp-1".to_string(),
            message: "Revenue grew 12%".to_string(),
            message_chunk: None,
            is_final_message: true,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"type\":\"text\""));
        assert!(json.contains("\"is_final_message\":true"));

        let parsed: ResponseMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), "resp-1");
        assert!(!parsed.is_in_flight());
    }

    #[test]
    fn test_reasoning_step_status_accessors() {
        let mut step = ReasoningStep::Text {
            id: "r-1".to_string(),
            title: "Thinking it through".to_string(),
            secondary_title: None,
            status: StepStatus::Loading,
            message: String::new(),
            message_chunk: None,
        };

        assert_eq!(step.status(), StepStatus::Loading);
        assert!(!step.status().is_terminal());

        step.set_status(StepStatus::Completed);
        assert!(step.status().is_terminal());
    }

    #[test]
    fn test_unknown_file_kind_decodes_as_other() {
        let artifact: FileArtifact = serde_json::from_str(
            r#"{
                "id": "f-1",
                "file_type": "hologram",
                "file_name": "q3.holo",
                "version_number": 1,
                "status": "loading"
            }"#,
        )
        .unwrap();

        assert_eq!(artifact.file_type, FileKind::Other);
        assert!(artifact.file.is_none());
    }

    #[test]
    fn test_files_step_wire_shape() {
        let mut files = HashMap::new();
        files.insert(
            "f-1".to_string(),
            FileArtifact {
                id: "f-1".to_string(),
                file_type: FileKind::Metric,
                file_name: "monthly_revenue.yml".to_string(),
                version_number: 1,
                status: StepStatus::Loading,
                file: Some(FileContent {
                    text: "name: monthly_revenue".to_string(),
                    text_chunk: None,
                    modified: Some(vec![(0, 21)]),
                }),
            },
        );

        let step = ReasoningStep::Files {
            id: "r-files".to_string(),
            title: "Creating metrics".to_string(),
            secondary_title: Some("1 file".to_string()),
            status: StepStatus::Loading,
            file_ids: vec!["f-1".to_string()],
            files,
        };

        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"type\":\"files\""));
        assert!(json.contains("\"modified\":[[0,21]]"));

        let parsed: ReasoningStep = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), "r-files");
        assert_eq!(parsed.status(), StepStatus::Loading);
    }
}
