//! Prism Client Core
//!
//! This library is the streaming heart of the Prism analyst client: a single
//! persistent connection multiplexes many logical event streams (chat text
//! deltas, reasoning steps, file-generation progress), and this crate turns
//! them into an internally consistent, incrementally-updated chat document
//! that any UI layer can subscribe to.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        UI layer (any framework)                  │
//! │   - subscribes to ChatStore snapshots                            │
//! │   - never mutates chat state directly                            │
//! └──────────────────────────────▲───────────────────────────────────┘
//!                                │ immutable Arc<ChatState> snapshots
//! ┌──────────────────────────────┴───────────────────────────────────┐
//! │  ChatStore ── reduce(state, event) ── upgrade_chat(server chat)  │
//! └──────────────────────────────▲───────────────────────────────────┘
//!                                │ decoded ChatEvents
//! ┌──────────────────────────────┴───────────────────────────────────┐
//! │  EventDispatcher ── ListenerRegistry ── DeliveryBatcher          │
//! │  (topic-keyed fanout, one-shot request/response correlation)     │
//! └──────────────────────────────▲───────────────────────────────────┘
//!                                │ envelopes
//! ┌──────────────────────────────┴───────────────────────────────────┐
//! │  ConnectionManager ── WsTransport (reader/writer/ping tasks)     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod notify;
pub mod ws;

pub use chat::{
    ChatMeta, ChatState, ChatStore, MessageState, StoreSubscription, reduce, upgrade_chat,
};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use notify::{ErrorNotifier, LogNotifier};
pub use ws::{
    ConnectionManager, EventCallback, EventDispatcher, Listener, ListenerRegistry, PendingReply,
    Transport, TransportError, WsTransport, loopback,
};
