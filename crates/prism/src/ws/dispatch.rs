//! Event dispatcher.
//!
//! Decouples "many routes share one physical connection" from callers:
//! outbound envelopes go through [`EventDispatcher::emit`], inbound frames
//! fan out to route listeners via the delivery batcher, and one-shot
//! request/response pairs are correlated through a pending-reply table so a
//! reply that arrives synchronously with the request cannot be missed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use log::{debug, warn};
use prism_protocol::{Envelope, Route, WireError};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::notify::ErrorNotifier;
use crate::ws::batch::DeliveryBatcher;
use crate::ws::registry::{EventCallback, Listener, ListenerRegistry};
use crate::ws::transport::{Transport, TransportError};

// ============================================================================
// Pending one-shot replies
// ============================================================================

pub(crate) struct PendingEntry {
    token: Uuid,
    tx: oneshot::Sender<ClientResult<Value>>,
}

impl PendingEntry {
    pub(crate) fn resolve(self, result: ClientResult<Value>) {
        // The receiver may have been dropped; that just means the caller
        // stopped waiting.
        let _ = self.tx.send(result);
    }
}

/// Correlation table for one-shot replies: route -> waiting resolvers.
///
/// Entries are removed before resolution, so re-entrant double delivery
/// cannot double-resolve a waiter.
#[derive(Default)]
pub(crate) struct PendingReplies {
    table: DashMap<Route, Vec<PendingEntry>>,
}

impl PendingReplies {
    pub(crate) fn insert(&self, route: Route) -> (Uuid, oneshot::Receiver<ClientResult<Value>>) {
        let token = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.table
            .entry(route)
            .or_default()
            .push(PendingEntry { token, tx });
        (token, rx)
    }

    /// Remove and return every waiter for a route.
    pub(crate) fn take(&self, route: &Route) -> Vec<PendingEntry> {
        self.table
            .remove(route)
            .map(|(_, entries)| entries)
            .unwrap_or_default()
    }

    /// Resolve one specific waiter with an error (e.g. its request never
    /// made it onto the wire).
    pub(crate) fn fail(&self, route: &Route, token: Uuid, error: ClientError) {
        let entry = {
            let Some(mut entries) = self.table.get_mut(route) else {
                return;
            };
            let Some(position) = entries.iter().position(|entry| entry.token == token) else {
                return;
            };
            entries.remove(position)
        };
        self.table.retain(|_, entries| !entries.is_empty());
        entry.resolve(Err(error));
    }

    pub(crate) fn has(&self, route: &Route) -> bool {
        self.table
            .get(route)
            .map(|entries| !entries.is_empty())
            .unwrap_or(false)
    }

    /// Drop every waiter. Their futures resolve as abandoned.
    pub(crate) fn clear(&self) {
        self.table.clear();
    }
}

/// A one-shot reply in flight.
///
/// Resolves with the first matching payload, rejects with
/// [`ClientError::Remote`] on a matching error envelope, and resolves as
/// [`ClientError::Abandoned`] if the connection is torn down first. This
/// layer imposes no timeout; wrap the future externally if one is needed.
pub struct PendingReply {
    rx: oneshot::Receiver<ClientResult<Value>>,
}

impl Future for PendingReply {
    type Output = ClientResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Abandoned),
        })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// The event dispatcher built on the registry, the pending-reply table, and
/// the delivery batcher.
pub struct EventDispatcher {
    registry: Arc<ListenerRegistry>,
    pending: Arc<PendingReplies>,
    batcher: DeliveryBatcher,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn ErrorNotifier>,
}

impl EventDispatcher {
    /// Build a dispatcher and spawn its delivery task.
    pub fn start(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn ErrorNotifier>,
        delivery_batch_max: usize,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let registry = Arc::new(ListenerRegistry::new());
        let pending = Arc::new(PendingReplies::default());
        let (batcher, delivery_task) = DeliveryBatcher::start(
            registry.clone(),
            pending.clone(),
            notifier.clone(),
            delivery_batch_max,
        );

        let dispatcher = Arc::new(Self {
            registry,
            pending,
            batcher,
            transport,
            notifier,
        });
        (dispatcher, delivery_task)
    }

    /// Register a listener on a route.
    pub fn on(&self, route: Route, listener: Listener) {
        self.registry.on(route, listener);
    }

    /// Unsubscribe a callback from a route. Safe to call from inside that
    /// callback; takes effect on the next flush.
    pub fn off(&self, route: &Route, callback: &EventCallback) {
        self.registry.off(route, callback);
    }

    /// Current listeners for a route (used by the batcher and for
    /// introspection).
    pub fn listeners(&self, route: &Route) -> Vec<Listener> {
        self.registry.get(route)
    }

    /// Serialize and forward an envelope to the transport. Fire-and-forget:
    /// a send failure is surfaced to the route's error handlers (or the
    /// global notifier), never thrown to the caller.
    pub fn emit(&self, envelope: Envelope) {
        let route = envelope.route.clone();
        match serde_json::to_string(&envelope) {
            Ok(frame) => {
                if let Err(err) = self.transport.send(frame) {
                    self.surface_send_failure(&route, &err);
                }
            }
            Err(err) => {
                warn!("failed to encode envelope for {route}: {err}");
            }
        }
    }

    /// Wait for the next envelope on a route.
    ///
    /// The waiter is registered synchronously, before this returns; the
    /// returned future resolves exactly once.
    pub fn once(&self, route: Route) -> PendingReply {
        let (_token, rx) = self.pending.insert(route);
        PendingReply { rx }
    }

    /// Register a one-shot waiter for `response_route`, then emit `request`.
    ///
    /// Registration happens before the emit, closing the race where a fast
    /// reply arrives while the request is still being sent. If the request
    /// cannot be sent at all, the reply resolves immediately with that
    /// failure instead of waiting forever.
    pub fn emit_and_once(&self, request: Envelope, response_route: Route) -> PendingReply {
        let (token, rx) = self.pending.insert(response_route.clone());

        match serde_json::to_string(&request) {
            Ok(frame) => {
                if let Err(err) = self.transport.send(frame) {
                    self.pending
                        .fail(&response_route, token, ClientError::Transport(err));
                }
            }
            Err(err) => {
                self.pending
                    .fail(&response_route, token, ClientError::Serialization(err));
            }
        }

        PendingReply { rx }
    }

    /// Inbound hook: parse a frame and queue it for batched delivery.
    ///
    /// An unrouted envelope is not an error: components unsubscribe
    /// mid-stream all the time, so it is dropped quietly.
    pub fn handle_frame(&self, frame: &str) {
        let envelope: Envelope = match serde_json::from_str(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("dropping undecodable frame: {err}");
                return;
            }
        };

        if !self.registry.has_listeners(&envelope.route) && !self.pending.has(&envelope.route) {
            debug!("no listeners for route {}, dropping", envelope.route);
            return;
        }

        if !self.batcher.enqueue(envelope) {
            warn!("delivery queue closed, dropping frame");
        }
    }

    /// Tear down correlation state; every pending reply resolves as
    /// abandoned.
    pub(crate) fn shutdown(&self) {
        self.pending.clear();
    }

    fn surface_send_failure(&self, route: &Route, err: &TransportError) {
        let wire = WireError::new(format!("send failed: {err}"));
        let mut handled = false;
        for listener in self.registry.get(route) {
            if let Some(on_error) = &listener.on_error {
                handled = true;
                on_error(&wire);
            }
        }
        if !handled {
            self.notifier.open_error_notification(route, &wire);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("routes", &self.registry.route_count())
            .finish()
    }
}
