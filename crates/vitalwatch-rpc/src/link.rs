//! A connected duplex text channel and the factory that opens one.
//!
//! The supervisor never touches a socket directly: it asks a [`Connector`]
//! for a fresh [`Link`] on every (re)connect and reacts to the
//! [`LinkEvent`]s the link produces.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// What a link reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One inbound text frame.
    Text(String),
    /// The peer closed the connection. Triggers a reconnect.
    Ended,
    /// The connection failed. Routed through the failure policy.
    Error(String),
}

/// One live connection. Dropping `outbound` closes it.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    /// Build a link and the peer-side ends of both channels.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<LinkEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            out_rx,
            in_tx,
        )
    }

    /// Queue a frame. Returns `false` once the peer side is gone.
    pub fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }
}

/// Opens a new [`Link`]. Each call produces an independent connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Link, TransportError>;

    fn url(&self) -> &str;
}
