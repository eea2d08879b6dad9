//! Frame-batched delivery.
//!
//! A streaming burst can put dozens of tiny envelopes on the wire inside one
//! scheduler tick. Invoking listeners synchronously per frame would thrash
//! subscribers (and any UI hanging off them), so delivery is coalesced: the
//! delivery task drains everything queued at the moment it wakes and flushes
//! it in one pass. Only the *scheduling* is batched — every envelope is still
//! delivered individually, in arrival order, because text deltas and status
//! transitions depend on per-chunk ordering.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use log::error;
use prism_protocol::{Envelope, Route, WireError};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::notify::ErrorNotifier;
use crate::ws::dispatch::PendingReplies;
use crate::ws::registry::{ErrorCallback, EventCallback, ListenerRegistry};

/// Handle for queueing envelopes toward the delivery task.
#[derive(Clone)]
pub struct DeliveryBatcher {
    queue: mpsc::UnboundedSender<Envelope>,
}

impl DeliveryBatcher {
    /// Spawn the delivery task.
    pub(crate) fn start(
        registry: Arc<ListenerRegistry>,
        pending: Arc<PendingReplies>,
        notifier: Arc<dyn ErrorNotifier>,
        batch_max: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_delivery(rx, registry, pending, notifier, batch_max.max(1)));
        (Self { queue }, task)
    }

    /// Queue an envelope for the next flush. Returns false if the delivery
    /// task is gone.
    pub(crate) fn enqueue(&self, envelope: Envelope) -> bool {
        self.queue.send(envelope).is_ok()
    }
}

async fn run_delivery(
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    registry: Arc<ListenerRegistry>,
    pending: Arc<PendingReplies>,
    notifier: Arc<dyn ErrorNotifier>,
    batch_max: usize,
) {
    let mut flush: Vec<Envelope> = Vec::with_capacity(batch_max);
    loop {
        flush.clear();
        let drained = rx.recv_many(&mut flush, batch_max).await;
        if drained == 0 {
            break;
        }
        for envelope in flush.drain(..) {
            deliver(&registry, &pending, notifier.as_ref(), envelope);
        }
    }
}

/// Deliver one envelope: one-shot waiters first (removed before resolution,
/// so a second envelope in the same flush cannot double-resolve), then the
/// listener set as it exists *now* — listeners added or removed since the
/// envelope was queued are respected.
fn deliver(
    registry: &ListenerRegistry,
    pending: &PendingReplies,
    notifier: &dyn ErrorNotifier,
    envelope: Envelope,
) {
    let route = envelope.route;
    let waiters = pending.take(&route);
    let listeners = registry.get(&route);

    match envelope.error {
        Some(wire_error) => {
            let mut handled = !waiters.is_empty();
            for waiter in waiters {
                waiter.resolve(Err(ClientError::Remote {
                    route: route.clone(),
                    error: wire_error.clone(),
                }));
            }
            for listener in &listeners {
                if let Some(on_error) = &listener.on_error {
                    handled = true;
                    invoke_error_callback(&route, on_error, &wire_error, notifier);
                }
            }
            if !handled {
                notifier.open_error_notification(&route, &wire_error);
            }
        }
        None => {
            let payload = envelope.payload.unwrap_or(Value::Null);
            for waiter in waiters {
                waiter.resolve(Ok(payload.clone()));
            }
            for listener in &listeners {
                invoke_callback(&route, &listener.callback, &payload, notifier);
            }
        }
    }
}

/// A panicking callback must not stop delivery to its siblings; the fault is
/// caught, logged, and surfaced on the notification channel.
fn invoke_callback(
    route: &Route,
    callback: &EventCallback,
    payload: &Value,
    notifier: &dyn ErrorNotifier,
) {
    if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
        error!("listener callback panicked during delivery on {route}");
        notifier.open_error_notification(
            route,
            &WireError::new("listener callback panicked during delivery"),
        );
    }
}

fn invoke_error_callback(
    route: &Route,
    on_error: &ErrorCallback,
    wire_error: &WireError,
    notifier: &dyn ErrorNotifier,
) {
    if catch_unwind(AssertUnwindSafe(|| on_error(wire_error))).is_err() {
        error!("error handler panicked during delivery on {route}");
        notifier.open_error_notification(
            route,
            &WireError::new("error handler panicked during delivery"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::ws::registry::Listener;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn wired() -> (DeliveryBatcher, Arc<ListenerRegistry>, Arc<PendingReplies>) {
        let registry = Arc::new(ListenerRegistry::new());
        let pending = Arc::new(PendingReplies::default());
        let (batcher, _task) = DeliveryBatcher::start(
            registry.clone(),
            pending.clone(),
            Arc::new(LogNotifier),
            256,
        );
        (batcher, registry, pending)
    }

    async fn settle() {
        // Give the delivery task a chance to flush.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_burst_is_delivered_in_arrival_order() {
        let (batcher, registry, _pending) = wired();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let route = Route::new("chat.stream.c1");

        let seen_by_listener = seen.clone();
        registry.on(
            route.clone(),
            Listener::new(Arc::new(move |payload| {
                seen_by_listener
                    .lock()
                    .unwrap()
                    .push(payload["n"].as_u64().unwrap());
            })),
        );

        for n in 0..3 {
            batcher.enqueue(Envelope::event(route.clone(), json!({ "n": n })));
        }
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_block_siblings() {
        let (batcher, registry, _pending) = wired();
        let route = Route::new("chat.stream.c1");
        let delivered = Arc::new(AtomicUsize::new(0));

        registry.on(
            route.clone(),
            Listener::new(Arc::new(|_| panic!("listener bug"))),
        );
        let counter = delivered.clone();
        registry.on(
            route.clone(),
            Listener::new(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        batcher.enqueue(Envelope::event(route.clone(), json!({})));
        settle().await;

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_envelope_routes_to_error_handlers_only() {
        let (batcher, registry, _pending) = wired();
        let route = Route::new("chat.stream.c1");
        let payload_calls = Arc::new(AtomicUsize::new(0));
        let error_calls = Arc::new(AtomicUsize::new(0));

        let payload_counter = payload_calls.clone();
        let error_counter = error_calls.clone();
        registry.on(
            route.clone(),
            Listener::with_error_handler(
                Arc::new(move |_| {
                    payload_counter.fetch_add(1, Ordering::SeqCst);
                }),
                Arc::new(move |_| {
                    error_counter.fetch_add(1, Ordering::SeqCst);
                }),
            ),
        );

        batcher.enqueue(Envelope::failure(route.clone(), WireError::new("boom")));
        settle().await;

        assert_eq!(payload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(error_calls.load(Ordering::SeqCst), 1);
    }
}
