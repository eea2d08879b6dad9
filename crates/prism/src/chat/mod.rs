//! Streaming chat state machine.
//!
//! The server's persisted chat shape is upgraded once into the client model
//! ([`upgrade`]), then every dispatched [`prism_protocol::ChatEvent`] flows
//! through the pure reducer ([`reducer`]) to produce the next immutable
//! snapshot, which the subscription store ([`store`]) hands to whatever UI
//! layer is listening. UI code never mutates chat state directly.

pub mod model;
pub mod reducer;
pub mod store;
pub mod upgrade;

pub use model::{ChatMeta, ChatState, MessageState};
pub use reducer::reduce;
pub use store::{ChatStore, SnapshotCallback, StoreSubscription};
pub use upgrade::upgrade_chat;
