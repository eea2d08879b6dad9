//! Global error-notification channel.
//!
//! Faults that cannot be routed to an interested listener end up here: error
//! envelopes nobody registered an error handler for, and listener callbacks
//! that panicked during delivery. The UI shell injects its own implementation
//! (e.g. a toast); the default just logs.

use log::warn;
use prism_protocol::{Route, WireError};

/// Sink for errors with no better home.
pub trait ErrorNotifier: Send + Sync {
    fn open_error_notification(&self, route: &Route, error: &WireError);
}

/// Default notifier: logs and moves on.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl ErrorNotifier for LogNotifier {
    fn open_error_notification(&self, route: &Route, error: &WireError) {
        warn!("unhandled error on route {}: {}", route, error);
    }
}
