//! Wire envelope and route types.
//!
//! Every frame exchanged over the multiplexed connection is an [`Envelope`]:
//! a route naming the logical stream it belongs to, plus either a payload or
//! an error. Routes are opaque strings; many routes share one physical
//! connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of a logical event stream.
///
/// A route is stable for the lifetime of one logical operation (e.g. the
/// title-generation stream for a given chat). Multiple listeners may
/// subscribe to the same route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(String);

impl Route {
    pub fn new(route: impl Into<String>) -> Self {
        Self(route.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Route {
    fn from(route: &str) -> Self {
        Self(route.to_string())
    }
}

impl From<String> for Route {
    fn from(route: String) -> Self {
        Self(route)
    }
}

/// Error carried inside an envelope in place of a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    /// Machine-readable error code, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Human-readable description.
    pub message: String,
}

impl WireError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// The unit exchanged over the transport.
///
/// Invariant: an envelope carries at most one of `payload` or `error`. The
/// constructors enforce this; deserialized envelopes violating it are
/// treated as errors by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub route: Route,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl Envelope {
    /// An envelope carrying a payload.
    pub fn event(route: impl Into<Route>, payload: Value) -> Self {
        Self {
            route: route.into(),
            payload: Some(payload),
            error: None,
        }
    }

    /// An envelope carrying only a route, no body. Used for bare signals
    /// such as stop requests.
    pub fn signal(route: impl Into<Route>) -> Self {
        Self {
            route: route.into(),
            payload: None,
            error: None,
        }
    }

    /// An envelope carrying an error.
    pub fn failure(route: impl Into<Route>, error: WireError) -> Self {
        Self {
            route: route.into(),
            payload: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
