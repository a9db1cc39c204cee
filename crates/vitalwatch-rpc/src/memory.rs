//! An in-process [`Connector`] that plays the node's side of each connection.
//!
//! Used to drive the supervisor deterministically: every `connect()` hands a
//! [`MemorySession`] to the paired [`MemoryNode`], which can answer requests,
//! push notifications, and end or break the connection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::link::{Connector, Link, LinkEvent};
use crate::request::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, SubscriptionNotification,
};

/// Create a connector and the node that receives its connections.
pub fn memory(url: impl Into<String>) -> (MemoryConnector, MemoryNode) {
    let (tx, rx) = mpsc::unbounded_channel();
    let attempts = Arc::new(AtomicUsize::new(0));
    let refusal = Arc::new(Mutex::new(None));
    (
        MemoryConnector {
            url: url.into(),
            sessions: tx,
            attempts: attempts.clone(),
            refusal: refusal.clone(),
        },
        MemoryNode {
            sessions: rx,
            attempts,
            refusal,
        },
    )
}

pub struct MemoryConnector {
    url: String,
    sessions: mpsc::UnboundedSender<MemorySession>,
    attempts: Arc<AtomicUsize>,
    refusal: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Link, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self.refusal.lock().map(|mut r| r.take()).unwrap_or(None);
        if let Some(reason) = refused {
            return Err(TransportError::WebSocket(reason));
        }

        let (link, requests, events) = Link::pair();
        self.sessions
            .send(MemorySession { requests, events })
            .map_err(|_| TransportError::WebSocket("memory node dropped".into()))?;
        Ok(link)
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// The node side of every connection the connector opens.
pub struct MemoryNode {
    sessions: mpsc::UnboundedReceiver<MemorySession>,
    attempts: Arc<AtomicUsize>,
    refusal: Arc<Mutex<Option<String>>>,
}

impl MemoryNode {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MemorySession> {
        self.sessions.recv().await
    }

    /// The next connection, if one is already open.
    pub fn try_accept(&mut self) -> Option<MemorySession> {
        self.sessions.try_recv().ok()
    }

    /// Number of `connect()` calls so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make the next `connect()` fail with `reason`.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        if let Ok(mut r) = self.refusal.lock() {
            *r = Some(reason.into());
        }
    }
}

/// One connection, seen from the node.
pub struct MemorySession {
    requests: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl MemorySession {
    /// The next request the client sent. `None` once the client dropped the
    /// connection.
    pub async fn next_request(&mut self) -> Option<JsonRpcRequest> {
        loop {
            let text = self.requests.recv().await?;
            match serde_json::from_str(&text) {
                Ok(req) => return Some(req),
                Err(e) => tracing::warn!(error = %e, "memory node got a malformed request"),
            }
        }
    }

    pub fn reply(&self, id: &RpcId, result: Value) {
        self.send(&JsonRpcResponse::success(id.clone(), result));
    }

    pub fn reply_error(&self, id: &RpcId, code: i64, message: &str) {
        self.send(&JsonRpcResponse::failure(
            id.clone(),
            JsonRpcError {
                code,
                message: message.into(),
                data: None,
            },
        ));
    }

    pub fn notify(&self, subscription: &str, result: Value) {
        self.send(&SubscriptionNotification::new(subscription, result));
    }

    /// Send a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Text(text.into()));
    }

    /// Close the connection cleanly.
    pub fn end(&self) {
        let _ = self.events.send(LinkEvent::Ended);
    }

    /// Break the connection with an error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Error(reason.into()));
    }

    fn send<T: serde::Serialize>(&self, msg: &T) {
        if let Ok(text) = serde_json::to_string(msg) {
            self.send_text(text);
        }
    }
}
