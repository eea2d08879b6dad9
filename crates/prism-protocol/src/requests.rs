//! Client-to-server request payloads and route builders.

use serde::{Deserialize, Serialize};

use crate::chat::FileKind;

/// Start or continue a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostChat {
    pub prompt: String,

    /// Absent when starting a new chat; the response carries the new id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    /// Seed the chat from an existing asset (e.g. "explain this metric").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<FileKind>,
}

/// Abort the in-flight stream for a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopChat {
    pub chat_id: String,
    pub message_id: String,
}

/// Ask the backend to (re)generate a chat's title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateTitle {
    pub chat_id: String,
}

/// Route builders.
///
/// Routes are dotted: a fixed family name, then the chat id for per-chat
/// streams. Request routes pair with a `.reply` response route for one-shot
/// correlation.
pub mod routes {
    use crate::envelope::Route;

    /// Post a new prompt (request).
    pub fn chat_post() -> Route {
        Route::new("chat.post")
    }

    /// Response route for [`chat_post`].
    pub fn chat_post_reply() -> Route {
        Route::new("chat.post.reply")
    }

    /// Abort an in-flight message (request).
    pub fn chat_stop() -> Route {
        Route::new("chat.stop")
    }

    /// Trigger title generation (request).
    pub fn chat_generate_title() -> Route {
        Route::new("chat.title.generate")
    }

    /// Streaming events for one chat's live message.
    pub fn chat_stream(chat_id: &str) -> Route {
        Route::new(format!("chat.stream.{chat_id}"))
    }

    /// Title-generation stream for one chat.
    pub fn chat_title(chat_id: &str) -> Route {
        Route::new(format!("chat.title.{chat_id}"))
    }

    /// Push route announcing chats created elsewhere (another tab, a
    /// schedule) for this user.
    pub fn chats_new() -> Route {
        Route::new("chats.new")
    }
}
