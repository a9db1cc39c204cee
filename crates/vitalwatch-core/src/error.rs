//! Error types shared across the VitalWatch pipeline.

use alloy_primitives::B256;
use thiserror::Error;

/// A malformed units or coins string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Invalid amount '{amount}' for {decimals} decimals")]
    InvalidAmount { amount: String, decimals: u32 },
}

impl AmountError {
    pub(crate) fn invalid(amount: &str, decimals: u32) -> Self {
        Self::InvalidAmount {
            amount: amount.to_string(),
            decimals,
        }
    }
}

/// Errors raised while building a signature table. Always a configuration
/// mistake, so callers treat them as fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Signatures '{first}' and '{second}' both hash to {hash}")]
    DuplicateSignature {
        first: String,
        second: String,
        hash: B256,
    },

    #[error("Invalid event signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },
}

/// Errors that can occur while decoding a single log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// topics[0] is not in the signature table. Expected whenever a filter
    /// matches events the caller did not ask for; the log is dropped.
    #[error("Unknown event signature {hash}")]
    UnknownEvent { hash: B256 },

    #[error("Log has no topics")]
    MissingSignature,

    #[error("Event {event} expects {expected} topic(s), log has {got}")]
    TopicCountMismatch {
        event: String,
        expected: usize,
        got: usize,
    },

    #[error("ABI decode failed: {reason}")]
    AbiDecodeFailed { reason: String },

    #[error("Invalid raw log: {reason}")]
    InvalidRawLog { reason: String },
}

impl DecodeError {
    pub fn is_unknown_event(&self) -> bool {
        matches!(self, Self::UnknownEvent { .. })
    }
}

/// Errors raised by caller-supplied block and log handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn other(reason: impl Into<String>) -> Self {
        Self::Other(reason.into())
    }
}
