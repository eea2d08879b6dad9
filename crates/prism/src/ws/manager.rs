//! Connection lifecycle.
//!
//! One [`ConnectionManager`] per logical connection, constructed explicitly
//! and dependency-injected wherever a dispatcher is needed — there is no
//! process-wide singleton, so tests and multi-account shells can run several
//! isolated instances side by side.

use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::notify::{ErrorNotifier, LogNotifier};
use crate::ws::dispatch::EventDispatcher;
use crate::ws::transport::{Transport, WsTransport};

/// Owns the dispatcher and the tasks pumping frames through it.
pub struct ConnectionManager {
    dispatcher: Arc<EventDispatcher>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Connect over WebSocket using the default notifier.
    pub async fn init(config: ClientConfig) -> ClientResult<Self> {
        Self::init_with_notifier(config, Arc::new(LogNotifier)).await
    }

    /// Connect over WebSocket with a caller-supplied notification channel.
    pub async fn init_with_notifier(
        config: ClientConfig,
        notifier: Arc<dyn ErrorNotifier>,
    ) -> ClientResult<Self> {
        let batch_max = config.delivery_batch_max;
        let (transport, inbound) = WsTransport::connect(&config).await?;
        Ok(Self::wire(Arc::new(transport), inbound, notifier, batch_max))
    }

    /// Build a manager over any transport. Tests wire the loopback here.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        inbound: mpsc::UnboundedReceiver<String>,
        notifier: Arc<dyn ErrorNotifier>,
        delivery_batch_max: usize,
    ) -> Self {
        Self::wire(transport, inbound, notifier, delivery_batch_max)
    }

    fn wire(
        transport: Arc<dyn Transport>,
        mut inbound: mpsc::UnboundedReceiver<String>,
        notifier: Arc<dyn ErrorNotifier>,
        delivery_batch_max: usize,
    ) -> Self {
        let (dispatcher, delivery_task) =
            EventDispatcher::start(transport, notifier, delivery_batch_max);

        let pump_dispatcher = dispatcher.clone();
        let pump = tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                pump_dispatcher.handle_frame(&frame);
            }
            debug!("inbound frame stream ended");
        });

        Self {
            dispatcher,
            tasks: Mutex::new(vec![delivery_task, pump]),
        }
    }

    pub fn dispatcher(&self) -> Arc<EventDispatcher> {
        self.dispatcher.clone()
    }

    /// Stop pumping frames and abandon every pending one-shot reply.
    /// Listeners stay registered but will never fire again through this
    /// connection.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
        let mut tasks = self.tasks.lock().expect("connection task list poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager").finish()
    }
}
