//! Transport-level error types and the failures routed through a
//! [`FailurePolicy`](crate::policy::FailurePolicy).

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, bad body).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connect/send/receive error. The node's "error" signal.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The connection closed while the request was in flight. The
    /// supervisor reconnects; the request itself is not retried.
    #[error("Connection ended")]
    Ended,

    /// The supervisor has stopped and accepts no more requests.
    #[error("Supervisor terminated")]
    Terminated,

    /// `eth_unsubscribe` failed or returned `false`.
    #[error("Unsubscribe from {subscription} failed: {reason}")]
    Unsubscribe {
        subscription: String,
        reason: String,
    },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// `true` for the close signal that triggers an immediate reconnect.
    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// A failure a [`FailurePolicy`](crate::policy::FailurePolicy) must rule on.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A block or log handler failed, or a log could not be decoded.
    #[error("handler failure on {subscription}: {reason}")]
    Handler {
        subscription: String,
        reason: String,
    },
}

impl Failure {
    pub fn handler(subscription: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Handler {
            subscription: subscription.into(),
            reason: reason.to_string(),
        }
    }
}
