//! Error types for the session client.

use rrc_core::EnvelopeError;

/// Failures reported by a [`Transport`](crate::transport::Transport) or one
/// of its sessions.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("path request failed: {0}")]
    PathRequest(String),
    #[error("session open failed: {0}")]
    OpenFailed(String),
    #[error("identify failed: {0}")]
    IdentifyFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("teardown failed: {0}")]
    TeardownFailed(String),
    #[error("transfer data unavailable: {0}")]
    TransferData(String),
    #[error("session closed")]
    Closed,
}

/// Errors surfaced to callers of [`Client`](crate::Client).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("timed out: {0}")]
    Timeout(&'static str),
    #[error("not connected")]
    NotConnected,
    #[error("message too large: {size} bytes does not fit in one frame")]
    MessageTooLarge { size: usize },
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("configuration error: {0}")]
    Config(String),
}
