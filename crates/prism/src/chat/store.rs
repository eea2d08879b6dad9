//! Subscription store.
//!
//! Holds the current immutable chat snapshot and fans change notifications
//! out to subscribers. Any UI layer can hang off this: subscribers receive
//! the whole `Arc<ChatState>` and select the slice they care about. State is
//! only ever replaced wholesale with the reducer's output, so readers can
//! keep using an old snapshot while a new event is being applied.

use std::sync::{Arc, RwLock, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use prism_protocol::{Chat, ChatEvent, Route};
use serde_json::Value;
use tracing::warn;

use crate::chat::model::ChatState;
use crate::chat::reducer::reduce;
use crate::chat::upgrade::upgrade_chat;
use crate::ws::{EventCallback, EventDispatcher, Listener};

/// Callback invoked with each fresh snapshot.
pub type SnapshotCallback = Arc<dyn Fn(&Arc<ChatState>) + Send + Sync>;

/// The one consumer of the reducer: owns the snapshot, applies events,
/// notifies subscribers.
pub struct ChatStore {
    state: RwLock<Arc<ChatState>>,
    subscribers: DashMap<u64, SnapshotCallback>,
    next_subscriber_id: AtomicU64,
}

impl ChatStore {
    pub fn new(initial: ChatState) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(Arc::new(initial)),
            subscribers: DashMap::new(),
            next_subscriber_id: AtomicU64::new(0),
        })
    }

    /// Upgrade a freshly-fetched server chat and store it.
    pub fn from_server(chat: Chat, is_new_chat: bool) -> Arc<Self> {
        Self::new(upgrade_chat(chat, is_new_chat))
    }

    /// The current snapshot. Cheap; clones only the `Arc`.
    pub fn snapshot(&self) -> Arc<ChatState> {
        self.state.read().expect("chat store lock poisoned").clone()
    }

    /// Reduce one event into the next snapshot and notify subscribers.
    pub fn apply(&self, event: &ChatEvent) {
        let next = {
            let mut state = self.state.write().expect("chat store lock poisoned");
            let next = Arc::new(reduce((**state).clone(), event));
            *state = next.clone();
            next
        };

        for subscriber in self.subscribers.iter() {
            (subscriber.value())(&next);
        }
    }

    /// Register a snapshot subscriber. Dropping the returned handle
    /// unsubscribes.
    pub fn subscribe(self: &Arc<Self>, callback: SnapshotCallback) -> StoreSubscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, callback);
        StoreSubscription {
            id,
            store: Arc::downgrade(self),
        }
    }

    /// Attach this store to a dispatcher route carrying chat events.
    ///
    /// Payloads that do not decode as a known event are ignored with a
    /// warning — newer server event kinds must not crash older clients.
    /// Returns the registered callback; pass it to
    /// [`EventDispatcher::off`] to detach.
    pub fn bind(self: &Arc<Self>, dispatcher: &EventDispatcher, route: Route) -> EventCallback {
        let store = Arc::clone(self);
        let callback: EventCallback = Arc::new(move |payload: &Value| {
            match serde_json::from_value::<ChatEvent>(payload.clone()) {
                Ok(event) => store.apply(&event),
                Err(err) => warn!("unrecognized chat event shape, ignoring: {err}"),
            }
        });
        dispatcher.on(route, Listener::new(callback.clone()));
        callback
    }
}

impl std::fmt::Debug for ChatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStore")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Subscription handle; unsubscribes on drop.
pub struct StoreSubscription {
    id: u64,
    store: Weak<ChatStore>,
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.subscribers.remove(&self.id);
        }
    }
}
