//! WebSocket [`Connector`] backed by `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{error::ProtocolError, Error as WsError, Message};

use crate::error::TransportError;
use crate::link::{Connector, Link, LinkEvent};

/// Opens WebSocket connections to a fixed URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Link, TransportError> {
        tracing::info!(url = %self.url, "connecting via WebSocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (link, out_rx, in_tx) = Link::pair();
        let url = self.url.clone();
        tokio::spawn(async move {
            pump(ws_stream, out_rx, in_tx).await;
            tracing::debug!(url = %url, "WebSocket pump stopped");
        });
        Ok(link)
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Moves frames between the socket and the link channels until either side
/// goes away. Always reports how the socket ended, unless the owner already
/// dropped the link.
async fn pump<S>(
    ws_stream: S,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    in_tx: mpsc::UnboundedSender<LinkEvent>,
) where
    S: futures::Stream<Item = Result<Message, WsError>>
        + futures::Sink<Message, Error = WsError>
        + Unpin,
{
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            out = out_rx.recv() => match out {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        let _ = in_tx.send(classify(e));
                        return;
                    }
                }
                // Owner dropped the link.
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if in_tx.send(LinkEvent::Text(text.to_string())).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "WebSocket closed by peer");
                    let _ = in_tx.send(LinkEvent::Ended);
                    return;
                }
                // Pings are answered by tungstenite on the next write.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = in_tx.send(classify(e));
                    return;
                }
                None => {
                    let _ = in_tx.send(LinkEvent::Ended);
                    return;
                }
            },
        }
    }
}

/// A clean or abrupt close is "ended"; anything else is an error.
fn classify(e: WsError) -> LinkEvent {
    match e {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => LinkEvent::Ended,
        other => LinkEvent::Error(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_are_ended() {
        assert_eq!(classify(WsError::ConnectionClosed), LinkEvent::Ended);
        assert_eq!(
            classify(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)),
            LinkEvent::Ended
        );
    }

    #[test]
    fn other_errors_are_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        assert!(matches!(classify(WsError::Io(io)), LinkEvent::Error(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_a_websocket_error() {
        // Port 9 (discard) is closed on test hosts.
        let connector = WsConnector::new("ws://127.0.0.1:9");
        assert!(matches!(
            connector.connect().await,
            Err(TransportError::WebSocket(_))
        ));
    }
}
