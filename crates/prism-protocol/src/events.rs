//! Streaming chat events.
//!
//! The backend pushes these over a chat's stream route while a message is
//! being generated. The union is closed and matched exhaustively at the
//! reducer boundary; an unknown tag fails decoding and is ignored with a
//! warning there, so newer server event kinds never crash older clients.

use serde::{Deserialize, Serialize};

use crate::chat::{FileArtifact, ReasoningStep, ResponseMessage};

/// Progress of a delta-carrying stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamProgress {
    InProgress,
    Completed,
}

/// How a message's stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    Success,
    Error,
}

/// One event on a chat's stream route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Incremental chat title generation.
    TitleDelta {
        chat_id: String,
        message_id: String,

        /// Full title, authoritative once `progress` is `Completed`.
        #[serde(default)]
        title: String,

        /// Latest delta, appended while `progress` is `InProgress`.
        #[serde(default)]
        title_chunk: String,

        progress: StreamProgress,
    },

    /// Upsert of a response entry on a message.
    ResponseDelta {
        chat_id: String,
        message_id: String,
        response_message: ResponseMessage,
    },

    /// Upsert of a reasoning step on a message.
    ReasoningDelta {
        chat_id: String,
        message_id: String,
        reasoning: ReasoningStep,
    },

    /// Upsert of a file artifact inside a `files` reasoning step.
    FileDelta {
        chat_id: String,
        message_id: String,

        /// Id of the owning `files` step.
        reasoning_id: String,

        file: FileArtifact,
    },

    /// The stream for a message ended, successfully or not. Closes out any
    /// children still marked loading.
    StreamTerminated {
        chat_id: String,
        message_id: String,
        outcome: StreamOutcome,
    },
}

impl ChatEvent {
    /// The chat this event targets.
    pub fn chat_id(&self) -> &str {
        match self {
            ChatEvent::TitleDelta { chat_id, .. }
            | ChatEvent::ResponseDelta { chat_id, .. }
            | ChatEvent::ReasoningDelta { chat_id, .. }
            | ChatEvent::FileDelta { chat_id, .. }
            | ChatEvent::StreamTerminated { chat_id, .. } => chat_id,
        }
    }

    /// The message this event targets.
    pub fn message_id(&self) -> &str {
        match self {
            ChatEvent::TitleDelta { message_id, .. }
            | ChatEvent::ResponseDelta { message_id, .. }
            | ChatEvent::ReasoningDelta { message_id, .. }
            | ChatEvent::FileDelta { message_id, .. }
            | ChatEvent::StreamTerminated { message_id, .. } => message_id,
        }
    }
}
