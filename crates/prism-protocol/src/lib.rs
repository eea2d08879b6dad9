//! Canonical protocol types for Prism analyst-chat streaming.
//!
//! These types define the contract between the Prism client core and the
//! analyst backend: the wire envelope multiplexing logical streams over one
//! connection, the chat/reasoning/file data model, and the streaming event
//! union the client reduces into an incrementally-updated chat document.

pub mod chat;
pub mod envelope;
pub mod events;
pub mod requests;

pub use chat::{
    Chat, FileArtifact, FileContent, FileKind, FileResponseMetadata, Message, MessageFeedback,
    ModifiedRange, Pill, PillContainer, ReasoningStep, RequestMessage, ResponseMessage, StepStatus,
};
pub use envelope::{Envelope, Route, WireError};
pub use events::{ChatEvent, StreamOutcome, StreamProgress};
pub use requests::{GenerateTitle, PostChat, StopChat, routes};
