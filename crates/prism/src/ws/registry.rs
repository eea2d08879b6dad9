//! Topic-keyed listener registry.

use std::sync::Arc;

use dashmap::DashMap;
use prism_protocol::{Route, WireError};
use serde_json::Value;

/// Callback invoked with the payload of each matching envelope.
///
/// Identity is the `Arc` itself: pass a clone of the same `Arc` to
/// [`ListenerRegistry::off`] to unsubscribe.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback invoked when a matching envelope carries an error.
pub type ErrorCallback = Arc<dyn Fn(&WireError) + Send + Sync>;

/// A callback pair bound to one route.
#[derive(Clone)]
pub struct Listener {
    pub callback: EventCallback,
    pub on_error: Option<ErrorCallback>,
}

impl Listener {
    pub fn new(callback: EventCallback) -> Self {
        Self {
            callback,
            on_error: None,
        }
    }

    pub fn with_error_handler(callback: EventCallback, on_error: ErrorCallback) -> Self {
        Self {
            callback,
            on_error: Some(on_error),
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("has_error_handler", &self.on_error.is_some())
            .finish()
    }
}

/// Route -> ordered listeners. Insertion order is preserved; listeners are
/// additive and never deduplicated. Mutated only through `on`/`off`.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    routes: DashMap<Route, Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }

    /// Append a listener to a route.
    pub fn on(&self, route: Route, listener: Listener) {
        self.routes.entry(route).or_default().push(listener);
    }

    /// Remove every registration of `callback` on `route`. No-op if absent.
    pub fn off(&self, route: &Route, callback: &EventCallback) {
        if let Some(mut listeners) = self.routes.get_mut(route) {
            listeners.retain(|listener| !Arc::ptr_eq(&listener.callback, callback));
        }

        // Clean up empty entries
        self.routes.retain(|_, listeners| !listeners.is_empty());
    }

    /// Current listeners for a route, in registration order. Always a list,
    /// never absent; the returned snapshot is immutable for the caller.
    pub fn get(&self, route: &Route) -> Vec<Listener> {
        self.routes
            .get(route)
            .map(|listeners| listeners.clone())
            .unwrap_or_default()
    }

    pub fn has_listeners(&self, route: &Route) -> bool {
        self.routes
            .get(route)
            .map(|listeners| !listeners.is_empty())
            .unwrap_or(false)
    }

    /// Number of routes with at least one listener.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}
