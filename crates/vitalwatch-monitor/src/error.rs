use thiserror::Error;
use vitalwatch_core::error::{AmountError, DecodeError};
use vitalwatch_rpc::TransportError;

/// Errors from contract queries, ratio checks and notification delivery.
/// All of them end the monitor loop.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Transport: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("Amount: {0}")]
    Amount(#[from] AmountError),

    /// A call returned something other than the declared type.
    #[error("{method} returned unexpected output: {reason}")]
    UnexpectedOutput { method: String, reason: String },

    #[error("Notification failed: {0}")]
    Notify(String),
}

impl MonitorError {
    pub(crate) fn output(method: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}
