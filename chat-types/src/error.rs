//! Error types for chatsync wire handling.

use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Frame is not a JSON event envelope
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Event name not valid for this direction
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Payload does not match the event's schema
    #[error("invalid {event} payload: {source}")]
    InvalidPayload {
        /// Event name from the envelope.
        event: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Payload parsed but a required field is empty or inconsistent
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
