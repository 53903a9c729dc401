//! Error types for the TimeTagger API client.
//!
//! # Design
//! Callers mostly care about two failures: the service answered with a
//! non-2xx status (`Transport`), or it answered 2xx with a body that does not
//! fit the expected envelope (`Decode`). Both keep the raw body verbatim for
//! diagnostics. Partial rejection inside a batch write is not an error; it is
//! reported through `WriteResult`.

use thiserror::Error;

/// Errors returned by the client, its parsers and its transports.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned a non-2xx status.
    #[error("unexpected status {status}: {body}")]
    Transport { status: u16, body: String },

    /// A 2xx body could not be decoded into the expected envelope.
    #[error("failed to decode response ({message}): {body}")]
    Decode { message: String, body: String },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The request never produced a response (DNS, TCP, TLS, timeout).
    #[error("request failed: {0}")]
    Connection(String),

    /// Client configuration is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status carried by a `Transport` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}
