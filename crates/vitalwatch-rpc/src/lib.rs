//! # vitalwatch-rpc
//!
//! JSON-RPC plumbing for VitalWatch.
//!
//! - [`HttpRpcClient`]: one-shot `eth_call` queries over HTTP
//! - [`Supervisor`] / [`ConnectionHandle`]: a single long-lived WebSocket
//!   connection that reconnects on close, re-issues every subscription, and
//!   routes errors through a [`FailurePolicy`]
//!
//! Both sides implement [`RpcTransport`], so query code does not care which
//! one it is given.

pub mod error;
pub mod http;
pub mod link;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod policy;
pub mod request;
pub mod subscriptions;
pub mod supervisor;
pub mod transport;
pub mod ws;

pub use error::{Failure, TransportError};
pub use http::HttpRpcClient;
pub use link::{Connector, Link, LinkEvent};
pub use policy::{Disposition, FailFast, FailurePolicy, LogAndContinue};
pub use subscriptions::SubscriptionKey;
pub use supervisor::{ConnectionHandle, ConnectionState, Supervisor};
pub use transport::RpcTransport;
pub use ws::WsConnector;
