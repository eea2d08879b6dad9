//! Server-to-client chat upgrade.
//!
//! The seam between the request/response world (chat objects fetched over
//! REST) and the streaming world: a one-shot, idempotent, side-effect-free
//! transform that annotates each message with its streaming status.

use prism_protocol::Chat;

use crate::chat::model::{ChatMeta, ChatState, MessageState};

/// Turn a server chat into the client's streaming-aware model.
///
/// Every message is marked completed except, when `is_new_chat` is true, the
/// last one in `message_ids`: that one is presumed still streaming and will
/// be finalized by a later stream-termination event. Calling this twice on
/// the same input yields structurally equal output.
pub fn upgrade_chat(chat: Chat, is_new_chat: bool) -> ChatState {
    let live_message_id = if is_new_chat {
        chat.message_ids.last().cloned()
    } else {
        None
    };

    let messages = chat
        .messages
        .into_iter()
        .map(|(id, message)| {
            let completed = live_message_id.as_deref() != Some(id.as_str());
            (id, MessageState::from_message(message, completed))
        })
        .collect();

    ChatState {
        chat: ChatMeta {
            id: chat.id,
            title: chat.title,
            is_favorited: chat.is_favorited,
            is_new_chat,
            message_ids: chat.message_ids,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
            created_by_id: chat.created_by_id,
            created_by_name: chat.created_by_name,
            created_by_avatar: chat.created_by_avatar,
        },
        messages,
    }
}
