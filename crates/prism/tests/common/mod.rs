//! Test utilities and common setup.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use prism::{ConnectionManager, ErrorNotifier, loopback};
use prism_protocol::{Envelope, Route, WireError};
use tokio::sync::mpsc;

/// Notifier that records every notification for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn recorded(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }
}

impl ErrorNotifier for RecordingNotifier {
    fn open_error_notification(&self, route: &Route, error: &WireError) {
        self.notifications
            .lock()
            .unwrap()
            .push((route.to_string(), error.message.clone()));
    }
}

/// A fully wired client over the loopback transport: the test plays the
/// server by reading `server_rx` and injecting frames through `server_tx`.
pub struct TestClient {
    pub manager: ConnectionManager,
    pub server_rx: mpsc::UnboundedReceiver<String>,
    pub server_tx: mpsc::UnboundedSender<String>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestClient {
    /// Inject an inbound envelope, as if the backend pushed it.
    pub fn push(&self, envelope: &Envelope) {
        self.server_tx
            .send(serde_json::to_string(envelope).unwrap())
            .unwrap();
    }

    /// Inject a raw inbound frame.
    pub fn push_raw(&self, frame: &str) {
        self.server_tx.send(frame.to_string()).unwrap();
    }
}

/// Initialize log + tracing output for tests; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn test_client() -> TestClient {
    init_logging();
    let (transport, server_rx) = loopback();
    let (server_tx, inbound_rx) = mpsc::unbounded_channel();
    let notifier = Arc::new(RecordingNotifier::default());
    let manager =
        ConnectionManager::with_transport(Arc::new(transport), inbound_rx, notifier.clone(), 256);

    TestClient {
        manager,
        server_rx,
        server_tx,
        notifier,
    }
}

/// Give the delivery task a chance to flush everything queued so far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}
