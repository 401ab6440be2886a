//! Signaling socket: WebSocket accept loop and JSON text-frame I/O.
//!
//! Each peer speaks JSON text frames only (see `rendezvous_core::codec`).
//! Binary frames carry nothing for the relay and are skipped; control pings
//! are answered here so the router never sees them.

use futures_util::{SinkExt, StreamExt};
use rendezvous_core::{RendezvousError, RendezvousResult};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    pub ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    pub remote_addr: SocketAddr,
}

/// Bind the signaling port and start accepting peers.
///
/// Returns the bound address (useful with port 0) and a receiver yielding one
/// handshaked connection per peer.
pub async fn start_listener(
    bind_addr: SocketAddr,
) -> RendezvousResult<(SocketAddr, mpsc::Receiver<WebSocketConnection>)> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| RendezvousError::Transport(format!("WS bind failed: {e}")))?;
    let local_addr = tcp_listener.local_addr()?;

    info!(addr = %local_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match tokio_tungstenite::accept_async(stream).await {
                            Ok(ws_stream) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    });

    Ok((local_addr, rx))
}

/// Write one encoded event to a peer as a text frame.
pub async fn ws_send_text(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
    text: String,
) -> RendezvousResult<()> {
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| RendezvousError::Transport(format!("WS send failed: {e}")))
}

/// Largest signaling frame accepted from a peer (1 MiB). SDP blobs are a few KiB.
const MAX_WS_FRAME_SIZE: usize = 1_048_576;

/// Read the next JSON text frame from a peer.
///
/// Returns `None` once the peer closes. An oversized frame is an error, which
/// ends the session and triggers the usual disconnect cleanup.
pub async fn ws_recv_text(
    ws: &mut tokio_tungstenite::WebSocketStream<TcpStream>,
) -> RendezvousResult<Option<String>> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                if text.len() > MAX_WS_FRAME_SIZE {
                    return Err(RendezvousError::InvalidMessage(format!(
                        "WS frame too large: {} bytes (max {})",
                        text.len(),
                        MAX_WS_FRAME_SIZE
                    )));
                }
                return Ok(Some(text.to_string()));
            }
            Some(Ok(Message::Close(_))) => return Ok(None),
            Some(Ok(Message::Ping(payload))) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(RendezvousError::Transport(format!("WS recv failed: {e}")));
            }
            None => return Ok(None),
        }
    }
}
