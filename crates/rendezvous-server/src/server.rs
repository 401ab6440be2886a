//! Core server: accepts WebSocket connections and feeds their events to the router.
//!
//! Owns the message router (and through it the presence registry shared with
//! the status surface) and the live session table. One task runs per connection.

use crate::config::ServerConfig;
use crate::relay::{InboundEvent, MessageRouter, PresenceRegistry};
use crate::status;
use crate::transport::websocket::{self, WebSocketConnection};
use crate::transport::SessionTable;
use rendezvous_core::{
    decode_client_event, encode_server_event, RendezvousError, RendezvousResult, ServerEvent,
    SessionGateway, SessionId,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// The rendezvous server instance.
pub struct RendezvousServer {
    config: ServerConfig,
    router: MessageRouter,
    sessions: SessionTable,
}

impl RendezvousServer {
    /// Create a new server instance with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        let router = MessageRouter::new(Arc::new(PresenceRegistry::new()));
        let sessions = SessionTable::new(config.outbound_queue);
        Self {
            config,
            router,
            sessions,
        }
    }

    /// Bind the signaling and status listeners and serve until the listener closes.
    pub async fn run(self) -> RendezvousResult<()> {
        let ws_addr = socket_addr(&self.config.host, self.config.port)?;
        let status_addr = socket_addr(&self.config.host, self.config.status_port)?;

        let (local_addr, ws_rx) = websocket::start_listener(ws_addr).await?;

        let registry = self.router.registry().clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(status_addr, registry).await {
                error!(error = %e, "status endpoint stopped");
            }
        });

        info!(
            ws_addr = %local_addr,
            status_addr = %status_addr,
            "rendezvous-server ready"
        );

        Arc::new(self).accept_loop(ws_rx).await;
        Ok(())
    }

    /// Spawn a handler task for every accepted connection.
    async fn accept_loop(self: Arc<Self>, mut ws_rx: mpsc::Receiver<WebSocketConnection>) {
        while let Some(conn) = ws_rx.recv().await {
            let srv = self.clone();
            tokio::spawn(async move {
                if let Err(e) = srv.handle_websocket(conn).await {
                    warn!(error = %e, "WebSocket connection error");
                }
            });
        }
        info!("listener closed, shutting down");
    }

    /// Drive one connection from accept to close.
    async fn handle_websocket(&self, mut conn: WebSocketConnection) -> RendezvousResult<()> {
        let (session, outbound_rx) = self.sessions.open();
        info!(
            session = %session,
            remote = %conn.remote_addr,
            live = self.sessions.count(),
            "client connected"
        );

        self.router
            .dispatch(&self.sessions, session, InboundEvent::Connect)
            .await;

        let result = self.session_loop(&mut conn, session, outbound_rx).await;

        // Leave the live set first so the offline broadcast skips this session.
        self.sessions.close(session);
        self.router
            .dispatch(&self.sessions, session, InboundEvent::Disconnect)
            .await;
        let _ = conn.ws_stream.close(None).await;

        result
    }

    /// Message loop: outbound queue to socket, socket to router.
    async fn session_loop(
        &self,
        conn: &mut WebSocketConnection,
        session: SessionId,
        mut outbound_rx: mpsc::Receiver<ServerEvent>,
    ) -> RendezvousResult<()> {
        loop {
            tokio::select! {
                Some(event) = outbound_rx.recv() => {
                    let text = encode_server_event(&event)?;
                    websocket::ws_send_text(&mut conn.ws_stream, text).await?;
                }

                ws_result = websocket::ws_recv_text(&mut conn.ws_stream) => {
                    match ws_result {
                        Ok(Some(text)) => self.handle_frame(session, &text).await,
                        Ok(None) => {
                            debug!(session = %session, "WebSocket session ended (peer closed)");
                            break;
                        }
                        Err(e) => {
                            debug!(session = %session, error = %e, "WebSocket session ended");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_frame(&self, session: SessionId, text: &str) {
        match decode_client_event(text) {
            Ok(event) => {
                self.router
                    .dispatch(&self.sessions, session, InboundEvent::Client(event))
                    .await;
            }
            Err(e) => {
                debug!(session = %session, error = %e, "malformed frame");
                // Queued like any other reply so it stays in order.
                let reply = ServerEvent::error(format!("malformed message: {e}"));
                if let Err(e) = self.sessions.send(session, reply) {
                    debug!(session = %session, error = %e, "reply not delivered");
                }
            }
        }
    }
}

fn socket_addr(host: &str, port: u16) -> RendezvousResult<SocketAddr> {
    let ip: std::net::IpAddr = host
        .parse()
        .map_err(|e| RendezvousError::Config(format!("invalid host {host}: {e}")))?;
    Ok(SocketAddr::new(ip, port))
}
