//! Client error types.

use prism_protocol::{Route, WireError};
use thiserror::Error;

use crate::ws::TransportError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of the client core.
///
/// Nothing in the dispatch path throws to its caller; these only reach code
/// awaiting a one-shot reply or driving the connection lifecycle.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport rejected or could not deliver a frame.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame or payload failed to encode/decode.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend answered a one-shot request with an error envelope.
    #[error("remote error on {route}: {error}")]
    Remote { route: Route, error: WireError },

    /// The connection was torn down before a matching reply arrived.
    #[error("connection closed before a reply arrived")]
    Abandoned,
}
