//! Connection, dispatch, and delivery layer.
//!
//! One physical WebSocket carries many logical streams. The pieces here keep
//! those concerns apart:
//!
//! - [`transport`] owns the socket: writer task with keepalive pings, reader
//!   task pumping text frames inbound, plus an in-memory loopback for tests.
//! - [`registry`] maps routes to listeners; pure bookkeeping.
//! - [`dispatch`] is the event dispatcher: `emit`, `on`/`off`, and one-shot
//!   request/response correlation (`once`, `emit_and_once`).
//! - [`batch`] coalesces delivery scheduling so a burst of inbound frames is
//!   flushed once per scheduler tick, in arrival order.
//! - [`manager`] wires it all together with an explicit init/shutdown
//!   lifecycle.

mod batch;
mod dispatch;
mod manager;
mod registry;
mod transport;

pub use batch::DeliveryBatcher;
pub use dispatch::{EventDispatcher, PendingReply};
pub use manager::ConnectionManager;
pub use registry::{ErrorCallback, EventCallback, Listener, ListenerRegistry};
pub use transport::{LoopbackTransport, Transport, TransportError, WsTransport, loopback};
