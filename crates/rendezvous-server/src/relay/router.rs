//! Message router: validates inbound events and forwards them to live sessions.
//!
//! The router owns no connection state. It reads and writes the
//! [`PresenceRegistry`] and pushes every outbound frame through a
//! [`SessionGateway`], including replies to the originating session.

use super::registry::PresenceRegistry;
use rendezvous_core::messages::{
    is_blank, ConnectedPayload, PongPayload, PresencePayload, SignalKind, SignalRequest,
    UserRegisteredPayload,
};
use rendezvous_core::{ClientEvent, ServerEvent, SessionGateway, SessionId};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One event raised by the transport for a single session.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The session was just accepted.
    Connect,
    /// The peer sent a decoded frame.
    Client(ClientEvent),
    /// The session closed and has already left the live set.
    Disconnect,
}

/// Why a single inbound message was not acted on.
///
/// `Display` is the text sent back to the peer in the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("userId is required")]
    MissingUserId,

    #[error("Invalid {} data", .0.label())]
    InvalidSignal(SignalKind),

    #[error("User {0} is not online")]
    RecipientOffline(String),
}

/// Routes signaling events between registered peers.
pub struct MessageRouter {
    registry: Arc<PresenceRegistry>,
}

impl MessageRouter {
    /// Create a router backed by a presence registry.
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// Access the underlying registry (e.g. for status reporting).
    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    /// Handle one event from `session`.
    ///
    /// Never fails: rejected messages turn into an `error` reply or are
    /// dropped, and nothing here waits on another peer.
    pub async fn dispatch<G>(&self, gateway: &G, session: SessionId, event: InboundEvent)
    where
        G: SessionGateway + ?Sized,
    {
        match event {
            InboundEvent::Connect => {
                debug!(session = %session, "client connected");
                reply(
                    gateway,
                    session,
                    ServerEvent::Connected(ConnectedPayload {
                        sid: session.to_string(),
                    }),
                );
            }
            InboundEvent::Client(ClientEvent::Register { user_id }) => {
                if let Err(e) = self.handle_register(gateway, session, user_id).await {
                    debug!(session = %session, error = %e, "register rejected");
                    reply(gateway, session, ServerEvent::error(e.to_string()));
                }
            }
            InboundEvent::Client(ClientEvent::Signal(request)) => {
                let kind = request.kind;
                match self.handle_signal(gateway, request).await {
                    Ok(()) => {}
                    // Candidates routinely race a disconnect; drop quietly.
                    Err(RouteError::RecipientOffline(_)) if kind == SignalKind::IceCandidate => {}
                    Err(e) => reply(gateway, session, ServerEvent::error(e.to_string())),
                }
            }
            InboundEvent::Client(ClientEvent::Ping) => {
                reply(
                    gateway,
                    session,
                    ServerEvent::Pong(PongPayload {
                        timestamp: session.to_string(),
                    }),
                );
            }
            InboundEvent::Disconnect => self.handle_disconnect(gateway, session).await,
        }
    }

    async fn handle_register<G>(
        &self,
        gateway: &G,
        session: SessionId,
        user_id: Option<String>,
    ) -> Result<(), RouteError>
    where
        G: SessionGateway + ?Sized,
    {
        let user_id = user_id
            .filter(|id| !id.is_empty())
            .ok_or(RouteError::MissingUserId)?;

        self.registry.register(user_id.clone(), session).await;

        reply(
            gateway,
            session,
            ServerEvent::UserRegistered(UserRegisteredPayload {
                user_id: user_id.clone(),
                message: "Successfully registered".into(),
            }),
        );
        let notified = broadcast(
            gateway,
            &ServerEvent::UserOnline(PresencePayload {
                user_id: user_id.clone(),
            }),
            Some(session),
        );
        info!(user = %user_id, session = %session, notified, "user registered");
        Ok(())
    }

    async fn handle_signal<G>(&self, gateway: &G, request: SignalRequest) -> Result<(), RouteError>
    where
        G: SessionGateway + ?Sized,
    {
        let kind = request.kind;
        let (to, from, payload) = match (request.to, request.from, request.payload) {
            (Some(to), Some(from), Some(payload))
                if !to.is_empty() && !from.is_empty() && !is_blank(&payload) =>
            {
                (to, from, payload)
            }
            _ => return Err(RouteError::InvalidSignal(kind)),
        };

        let Some(target) = self.registry.lookup(&to).await else {
            warn!(kind = kind.label(), to = %to, from = %from, "recipient not online");
            return Err(RouteError::RecipientOffline(to));
        };

        info!(kind = kind.label(), from = %from, to = %to, "forwarding");
        forward(gateway, target, kind, from, payload);
        Ok(())
    }

    async fn handle_disconnect<G>(&self, gateway: &G, session: SessionId)
    where
        G: SessionGateway + ?Sized,
    {
        match self.registry.remove_by_session(session).await {
            Some(user_id) => {
                let notified = broadcast(
                    gateway,
                    &ServerEvent::UserDisconnected(PresencePayload {
                        user_id: user_id.clone(),
                    }),
                    None,
                );
                info!(user = %user_id, session = %session, notified, "user disconnected");
            }
            None => debug!(session = %session, "client disconnected"),
        }
    }
}

fn forward<G>(gateway: &G, target: SessionId, kind: SignalKind, from: String, payload: Value)
where
    G: SessionGateway + ?Sized,
{
    if let Err(e) = gateway.send(target, ServerEvent::forwarded(kind, from, payload)) {
        debug!(target = %target, kind = kind.label(), error = %e, "forward not delivered");
    }
}

fn reply<G>(gateway: &G, session: SessionId, event: ServerEvent)
where
    G: SessionGateway + ?Sized,
{
    let name = event.event_name();
    if let Err(e) = gateway.send(session, event) {
        debug!(session = %session, event = name, error = %e, "reply not delivered");
    }
}

/// Send `event` to a snapshot of live sessions, skipping `exclude`.
///
/// Per-recipient failures are ignored. Returns the number of frames queued.
fn broadcast<G>(gateway: &G, event: &ServerEvent, exclude: Option<SessionId>) -> usize
where
    G: SessionGateway + ?Sized,
{
    let mut delivered = 0;
    for session in gateway.live_sessions() {
        if Some(session) == exclude {
            continue;
        }
        match gateway.send(session, event.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => debug!(session = %session, event = event.event_name(), error = %e, "broadcast frame dropped"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rendezvous_core::messages::{ErrorPayload, ForwardedOffer};
    use rendezvous_core::{RendezvousError, RendezvousResult};
    use serde_json::json;
    use std::collections::BTreeSet;

    /// In-memory gateway that records every queued frame.
    #[derive(Default)]
    struct RecordingGateway {
        live: Mutex<BTreeSet<SessionId>>,
        sent: Mutex<Vec<(SessionId, ServerEvent)>>,
    }

    impl RecordingGateway {
        fn with_sessions(ids: &[u64]) -> Self {
            let gw = Self::default();
            gw.live.lock().extend(ids.iter().map(|&i| SessionId(i)));
            gw
        }

        fn close(&self, id: u64) {
            self.live.lock().remove(&SessionId(id));
        }

        fn sent_to(&self, id: u64) -> Vec<ServerEvent> {
            self.sent
                .lock()
                .iter()
                .filter(|(s, _)| *s == SessionId(id))
                .map(|(_, e)| e.clone())
                .collect()
        }

        fn total_sent(&self) -> usize {
            self.sent.lock().len()
        }

        fn clear(&self) {
            self.sent.lock().clear();
        }
    }

    impl SessionGateway for RecordingGateway {
        fn send(&self, session: SessionId, event: ServerEvent) -> RendezvousResult<()> {
            if !self.live.lock().contains(&session) {
                return Err(RendezvousError::SessionNotFound(session.to_string()));
            }
            self.sent.lock().push((session, event));
            Ok(())
        }

        fn live_sessions(&self) -> Vec<SessionId> {
            self.live.lock().iter().copied().collect()
        }
    }

    fn router() -> MessageRouter {
        MessageRouter::new(Arc::new(PresenceRegistry::new()))
    }

    fn register(user: &str) -> InboundEvent {
        InboundEvent::Client(ClientEvent::Register {
            user_id: Some(user.into()),
        })
    }

    fn signal(kind: SignalKind, to: Option<&str>, from: Option<&str>, payload: Option<Value>) -> InboundEvent {
        InboundEvent::Client(ClientEvent::Signal(SignalRequest {
            kind,
            to: to.map(Into::into),
            from: from.map(Into::into),
            payload,
        }))
    }

    fn error(message: &str) -> ServerEvent {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// alice on session 1, bob on session 2, with sent frames cleared.
    async fn alice_and_bob() -> (MessageRouter, RecordingGateway) {
        let router = router();
        let gw = RecordingGateway::with_sessions(&[1, 2]);
        router.dispatch(&gw, SessionId(1), register("alice")).await;
        router.dispatch(&gw, SessionId(2), register("bob")).await;
        gw.clear();
        (router, gw)
    }

    #[tokio::test]
    async fn connect_acknowledges_with_sid() {
        let router = router();
        let gw = RecordingGateway::with_sessions(&[7]);
        router.dispatch(&gw, SessionId(7), InboundEvent::Connect).await;
        assert_eq!(
            gw.sent_to(7),
            vec![ServerEvent::Connected(ConnectedPayload { sid: "7".into() })]
        );
        assert_eq!(router.registry().count().await, 0);
    }

    #[tokio::test]
    async fn register_acks_and_notifies_others() {
        let router = router();
        let gw = RecordingGateway::with_sessions(&[1, 2, 3]);
        router.dispatch(&gw, SessionId(1), register("alice")).await;

        assert_eq!(
            gw.sent_to(1),
            vec![ServerEvent::UserRegistered(UserRegisteredPayload {
                user_id: "alice".into(),
                message: "Successfully registered".into(),
            })]
        );
        let online = ServerEvent::UserOnline(PresencePayload {
            user_id: "alice".into(),
        });
        assert_eq!(gw.sent_to(2), vec![online.clone()]);
        assert_eq!(gw.sent_to(3), vec![online]);
        assert_eq!(router.registry().lookup("alice").await, Some(SessionId(1)));
    }

    #[tokio::test]
    async fn register_without_user_id_is_rejected() {
        let router = router();
        let gw = RecordingGateway::with_sessions(&[1, 2]);
        for user_id in [None, Some(String::new())] {
            router
                .dispatch(&gw, SessionId(1), InboundEvent::Client(ClientEvent::Register { user_id }))
                .await;
        }
        assert_eq!(gw.sent_to(1), vec![error("userId is required"), error("userId is required")]);
        assert!(gw.sent_to(2).is_empty());
        assert_eq!(router.registry().count().await, 0);
    }

    #[tokio::test]
    async fn register_survives_failed_broadcast() {
        let router = router();
        let gw = RecordingGateway::with_sessions(&[1]);
        // Session 2 is listed as live but rejects every frame.
        struct Flaky<'a>(&'a RecordingGateway);
        impl SessionGateway for Flaky<'_> {
            fn send(&self, session: SessionId, event: ServerEvent) -> RendezvousResult<()> {
                self.0.send(session, event)
            }
            fn live_sessions(&self) -> Vec<SessionId> {
                vec![SessionId(1), SessionId(2)]
            }
        }
        router.dispatch(&Flaky(&gw), SessionId(1), register("alice")).await;
        assert_eq!(router.registry().lookup("alice").await, Some(SessionId(1)));
        assert_eq!(gw.sent_to(1).len(), 1);
    }

    #[tokio::test]
    async fn offer_is_forwarded_verbatim() {
        let (router, gw) = alice_and_bob().await;
        let offer = json!({"type": "offer", "sdp": "v=0..."});
        router
            .dispatch(
                &gw,
                SessionId(1),
                signal(SignalKind::Offer, Some("bob"), Some("alice"), Some(offer.clone())),
            )
            .await;

        assert_eq!(
            gw.sent_to(2),
            vec![ServerEvent::Offer(ForwardedOffer {
                from: "alice".into(),
                offer,
            })]
        );
        assert!(gw.sent_to(1).is_empty());
    }

    #[tokio::test]
    async fn answer_is_forwarded() {
        let (router, gw) = alice_and_bob().await;
        let answer = json!({"type": "answer", "sdp": "v=0..."});
        router
            .dispatch(
                &gw,
                SessionId(2),
                signal(SignalKind::Answer, Some("alice"), Some("bob"), Some(answer.clone())),
            )
            .await;
        assert_eq!(
            gw.sent_to(1),
            vec![ServerEvent::forwarded(SignalKind::Answer, "bob".into(), answer)]
        );
        assert_eq!(gw.total_sent(), 1);
    }

    #[tokio::test]
    async fn offer_with_missing_field_errors_once() {
        let (router, gw) = alice_and_bob().await;
        router
            .dispatch(
                &gw,
                SessionId(1),
                signal(SignalKind::Offer, None, Some("alice"), Some(json!({"sdp": "x"}))),
            )
            .await;
        assert_eq!(gw.sent_to(1), vec![error("Invalid offer data")]);
        assert_eq!(gw.total_sent(), 1);
    }

    #[tokio::test]
    async fn answer_with_blank_payload_errors() {
        let (router, gw) = alice_and_bob().await;
        router
            .dispatch(&gw, SessionId(2), signal(SignalKind::Answer, Some("alice"), Some("bob"), Some(json!({}))))
            .await;
        assert_eq!(gw.sent_to(2), vec![error("Invalid answer data")]);
        assert_eq!(gw.total_sent(), 1);
    }

    #[tokio::test]
    async fn offer_to_offline_peer_errors_once() {
        let (router, gw) = alice_and_bob().await;
        router
            .dispatch(
                &gw,
                SessionId(1),
                signal(SignalKind::Offer, Some("carol"), Some("alice"), Some(json!("sdp"))),
            )
            .await;
        assert_eq!(gw.sent_to(1), vec![error("User carol is not online")]);
        assert_eq!(gw.total_sent(), 1);
    }

    #[tokio::test]
    async fn candidate_to_offline_peer_is_silently_dropped() {
        let (router, gw) = alice_and_bob().await;
        router
            .dispatch(
                &gw,
                SessionId(1),
                signal(SignalKind::IceCandidate, Some("carol"), Some("alice"), Some(json!("candidate:1"))),
            )
            .await;
        assert_eq!(gw.total_sent(), 0);
    }

    #[tokio::test]
    async fn candidate_with_missing_field_errors() {
        let (router, gw) = alice_and_bob().await;
        router
            .dispatch(&gw, SessionId(1), signal(SignalKind::IceCandidate, Some("bob"), Some("alice"), None))
            .await;
        assert_eq!(gw.sent_to(1), vec![error("Invalid ICE candidate data")]);
        assert!(gw.sent_to(2).is_empty());
    }

    #[tokio::test]
    async fn candidate_is_forwarded() {
        let (router, gw) = alice_and_bob().await;
        let candidate = json!({"candidate": "candidate:1 1 udp 2122260223", "sdpMid": "0"});
        router
            .dispatch(
                &gw,
                SessionId(1),
                signal(SignalKind::IceCandidate, Some("bob"), Some("alice"), Some(candidate.clone())),
            )
            .await;
        assert_eq!(
            gw.sent_to(2),
            vec![ServerEvent::forwarded(SignalKind::IceCandidate, "alice".into(), candidate)]
        );
    }

    #[tokio::test]
    async fn forwards_from_one_sender_keep_order() {
        let (router, gw) = alice_and_bob().await;
        for i in 0..10 {
            router
                .dispatch(
                    &gw,
                    SessionId(1),
                    signal(SignalKind::IceCandidate, Some("bob"), Some("alice"), Some(json!(i + 1))),
                )
                .await;
        }
        let received: Vec<ServerEvent> = gw.sent_to(2);
        let expected: Vec<ServerEvent> = (0..10)
            .map(|i| ServerEvent::forwarded(SignalKind::IceCandidate, "alice".into(), json!(i + 1)))
            .collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn reregistration_routes_to_new_session() {
        let (router, gw) = alice_and_bob().await;
        gw.live.lock().insert(SessionId(3));
        router.dispatch(&gw, SessionId(3), register("bob")).await;
        gw.clear();

        router
            .dispatch(&gw, SessionId(1), signal(SignalKind::Offer, Some("bob"), Some("alice"), Some(json!("sdp"))))
            .await;
        assert_eq!(gw.sent_to(3).len(), 1);
        assert!(gw.sent_to(2).is_empty());
    }

    #[tokio::test]
    async fn disconnect_notifies_remaining_sessions() {
        let (router, gw) = alice_and_bob().await;
        gw.close(2);
        router.dispatch(&gw, SessionId(2), InboundEvent::Disconnect).await;

        assert_eq!(router.registry().lookup("bob").await, None);
        assert_eq!(router.registry().lookup("alice").await, Some(SessionId(1)));
        assert_eq!(
            gw.sent_to(1),
            vec![ServerEvent::UserDisconnected(PresencePayload {
                user_id: "bob".into()
            })]
        );
        assert_eq!(gw.total_sent(), 1);
    }

    #[tokio::test]
    async fn unregistered_disconnect_is_silent() {
        let (router, gw) = alice_and_bob().await;
        gw.live.lock().insert(SessionId(9));
        gw.close(9);
        router.dispatch(&gw, SessionId(9), InboundEvent::Disconnect).await;
        assert_eq!(gw.total_sent(), 0);
        assert_eq!(router.registry().count().await, 2);
    }

    #[tokio::test]
    async fn ping_replies_pong_to_sender() {
        let (router, gw) = alice_and_bob().await;
        router
            .dispatch(&gw, SessionId(2), InboundEvent::Client(ClientEvent::Ping))
            .await;
        assert_eq!(
            gw.sent_to(2),
            vec![ServerEvent::Pong(PongPayload {
                timestamp: "2".into()
            })]
        );
        assert_eq!(gw.total_sent(), 1);
    }
}
