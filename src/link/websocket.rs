//! # WebSocket Transport
//!
//! Opens the control channel as a WebSocket to a fixed path on the device
//! host (default `ws://127.0.0.1:8080/ws/`).
//!
//! Each open spawns two tasks:
//!
//! - **writer**: forwards outbound text as text frames and pings as
//!   ping frames; when every outbound sender is gone it sends a close frame
//!   and exits
//! - **reader**: forwards inbound text as [`LinkEvent::Message`], ping, pong
//!   and binary frames as [`LinkEvent::Heartbeat`], a close frame or end of
//!   stream as [`LinkEvent::Closed`], and protocol errors as
//!   [`LinkEvent::Error`]
//!
//! Pings from the server are answered by tokio-tungstenite. Deciding when a
//! silent peer is dead is left to the connection manager.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::transport::{Link, LinkEvent, OutboundFrame, Transport};
use crate::error::{LinkError, Result};

/// Builds the control channel URL from a host and a path.
///
/// # Examples
///
/// ```
/// use teleop_link::link::websocket::control_url;
///
/// assert_eq!(control_url("192.168.1.20:8080", "/ws/"), "ws://192.168.1.20:8080/ws/");
/// assert_eq!(control_url("robot.local", "ws/"), "ws://robot.local/ws/");
/// ```
#[must_use]
pub fn control_url(host: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("ws://{}{}", host, path)
    } else {
        format!("ws://{}/{}", host, path)
    }
}

/// WebSocket control channel
///
/// Open attempts are not time-bounded here; the connection manager applies
/// its own connect timeout to every transport.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Creates a transport for a full `ws://` URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn open_failure(&self, reason: impl ToString) -> LinkError {
        LinkError::TransportOpenFailure {
            target: self.url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<Link> {
        debug!("Connecting to {}", self.url);

        let (ws_stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| self.open_failure(e))?;

        info!("WebSocket connected to {}", self.url);

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (event_tx, events) = mpsc::unbounded_channel();

        // Writer: ends when the Link (and every LinkSender) is dropped
        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let message = match frame {
                    OutboundFrame::Text(text) => WsMessage::Text(text),
                    OutboundFrame::Ping => WsMessage::Ping(Vec::new()),
                };
                if let Err(e) = ws_tx.send(message).await {
                    warn!("WebSocket send failed: {}", e);
                    let _ = writer_events.send(LinkEvent::Error(e.to_string()));
                    return;
                }
            }
            debug!("Outbound channel closed, closing WebSocket");
            let _ = ws_tx.send(WsMessage::Close(None)).await;
            let _ = ws_tx.close().await;
        });

        // Reader: ends on close, error, or when nobody listens any more
        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let event = match frame {
                    Ok(WsMessage::Text(text)) => LinkEvent::Message(text),
                    Ok(WsMessage::Close(_)) => LinkEvent::Closed,
                    Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => LinkEvent::Heartbeat,
                    Ok(WsMessage::Binary(bytes)) => {
                        debug!("Ignoring {} byte binary frame", bytes.len());
                        LinkEvent::Heartbeat
                    }
                    Ok(_) => continue,
                    Err(e) => LinkEvent::Error(e.to_string()),
                };
                let terminal = matches!(event, LinkEvent::Closed | LinkEvent::Error(_));
                if event_tx.send(event).is_err() || terminal {
                    return;
                }
            }
            let _ = event_tx.send(LinkEvent::Closed);
        });

        Ok(Link { outbound, events })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
