//! Client-side chat model.
//!
//! Same aggregate as the server shape, with two derived, client-only flags:
//! `is_new_chat` on the chat (was it created in this session?) and
//! `is_completed_stream` per message (has its stream finished?). Snapshots
//! are handed out as immutable values and replaced wholesale by the reducer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use prism_protocol::{
    Message, MessageFeedback, ReasoningStep, RequestMessage, ResponseMessage, StepStatus,
};
use serde::{Deserialize, Serialize};

/// Chat-level fields, without the message map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMeta {
    pub id: String,
    pub title: String,
    pub is_favorited: bool,

    /// True when this chat was created in this session; decides which
    /// trailing message is presumed still streaming at upgrade time.
    pub is_new_chat: bool,

    pub message_ids: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub created_by_id: String,
    pub created_by_name: String,
    pub created_by_avatar: Option<String>,
}

/// One message with its streaming status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageState {
    pub id: String,
    pub request_message: Option<RequestMessage>,

    pub response_message_ids: Vec<String>,
    pub response_messages: HashMap<String, ResponseMessage>,

    pub reasoning_message_ids: Vec<String>,
    pub reasoning_messages: HashMap<String, ReasoningStep>,

    pub final_reasoning_message: Option<String>,
    pub feedback: Option<MessageFeedback>,

    pub created_at: DateTime<Utc>,

    /// Flips to true exactly once, when the stream for this message
    /// terminates. Terminal: the message is immutable afterwards.
    pub is_completed_stream: bool,
}

impl MessageState {
    pub fn from_message(message: Message, is_completed_stream: bool) -> Self {
        Self {
            id: message.id,
            request_message: message.request_message,
            response_message_ids: message.response_message_ids,
            response_messages: message.response_messages,
            reasoning_message_ids: message.reasoning_message_ids,
            reasoning_messages: message.reasoning_messages,
            final_reasoning_message: message.final_reasoning_message,
            feedback: message.feedback,
            created_at: message.created_at,
            is_completed_stream,
        }
    }

    /// Empty shell for a message whose deltas outran the message itself.
    pub fn shell(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::from_message(Message::shell(id, created_at), false)
    }

    /// Ids of children still marked loading (reasoning steps, nested file
    /// artifacts, non-final text responses).
    pub fn loading_children(&self) -> Vec<&str> {
        let mut loading = Vec::new();
        for step in self.reasoning_messages.values() {
            if step.status() == StepStatus::Loading {
                loading.push(step.id());
            }
        }
        for response in self.response_messages.values() {
            if response.is_in_flight() {
                loading.push(response.id());
            }
        }
        loading
    }
}

/// The whole client chat document: meta plus messages keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatState {
    pub chat: ChatMeta,
    pub messages: HashMap<String, MessageState>,
}

impl ChatState {
    pub fn message(&self, id: &str) -> Option<&MessageState> {
        self.messages.get(id)
    }

    /// Messages in transcript order.
    pub fn messages_in_order(&self) -> impl Iterator<Item = &MessageState> {
        self.chat
            .message_ids
            .iter()
            .filter_map(|id| self.messages.get(id))
    }

    pub fn last_message(&self) -> Option<&MessageState> {
        self.chat
            .message_ids
            .last()
            .and_then(|id| self.messages.get(id))
    }

    /// Structural consistency check used by debug assertions and tests:
    /// every listed id resolves, no orphaned map entries, and each message
    /// has at most one child still loading.
    pub fn check_consistency(&self) -> Result<(), String> {
        for id in &self.chat.message_ids {
            if !self.messages.contains_key(id) {
                return Err(format!("message id {id} has no map entry"));
            }
        }
        for id in self.messages.keys() {
            if !self.chat.message_ids.contains(id) {
                return Err(format!("message {id} is not in message_ids"));
            }
        }

        for message in self.messages.values() {
            check_pairing(
                &message.response_message_ids,
                message.response_messages.keys(),
                "response",
            )?;
            check_pairing(
                &message.reasoning_message_ids,
                message.reasoning_messages.keys(),
                "reasoning",
            )?;

            for step in message.reasoning_messages.values() {
                if let ReasoningStep::Files {
                    file_ids, files, ..
                } = step
                {
                    check_pairing(file_ids, files.keys(), "file")?;
                }
            }

            let loading = message.loading_children();
            if loading.len() > 1 {
                return Err(format!(
                    "message {} has {} children loading at once: {:?}",
                    message.id,
                    loading.len(),
                    loading
                ));
            }
            if message.is_completed_stream && !loading.is_empty() {
                return Err(format!(
                    "completed message {} still has loading children: {:?}",
                    message.id, loading
                ));
            }
        }
        Ok(())
    }
}

fn check_pairing<'a>(
    ids: &[String],
    keys: impl Iterator<Item = &'a String>,
    kind: &str,
) -> Result<(), String> {
    for id in ids {
        if ids.iter().filter(|other| *other == id).count() != 1 {
            return Err(format!("duplicate {kind} id {id}"));
        }
    }
    let key_list: Vec<&String> = keys.collect();
    for id in ids {
        if !key_list.contains(&id) {
            return Err(format!("{kind} id {id} has no map entry"));
        }
    }
    for key in key_list {
        if !ids.contains(key) {
            return Err(format!("{kind} entry {key} is not in the id list"));
        }
    }
    Ok(())
}
