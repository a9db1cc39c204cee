use thiserror::Error;
use vitalwatch_core::error::SignatureError;
use vitalwatch_rpc::TransportError;

#[derive(Debug, Error)]
pub enum StreamError {
    /// The signature list could not be turned into a table.
    #[error("Signature table: {0}")]
    Signature(#[from] SignatureError),

    #[error("Transport: {0}")]
    Transport(#[from] TransportError),
}
