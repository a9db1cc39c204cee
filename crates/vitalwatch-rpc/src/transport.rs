//! The `RpcTransport` trait: the request/response abstraction shared by the
//! HTTP client and the WebSocket supervisor's handle.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;

/// Sends one JSON-RPC call and returns its `result`.
///
/// The trait is object-safe and can be stored as `Arc<dyn RpcTransport>`.
/// Node-side errors surface as [`TransportError::Rpc`].
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError>;

    /// The transport's identifier (URL or name).
    fn url(&self) -> &str;
}

/// Call a method and deserialize the result.
pub async fn call<T, R>(transport: &R, method: &str, params: Vec<Value>) -> Result<T, TransportError>
where
    T: DeserializeOwned,
    R: RpcTransport + ?Sized,
{
    let result = transport.request(method, params).await?;
    serde_json::from_value(result).map_err(TransportError::Deserialization)
}
