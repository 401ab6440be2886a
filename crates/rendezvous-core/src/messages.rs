//! Event types exchanged between peers and the relay.
//!
//! Inbound frames are decoded into [`ClientEvent`]; outbound frames are built
//! from [`ServerEvent`]. Negotiation payloads stay opaque `serde_json::Value`s.

use serde::Serialize;
use serde_json::Value;

/// Wire names of the inbound events.
pub const EVENT_REGISTER: &str = "register";
pub const EVENT_OFFER: &str = "offer";
pub const EVENT_ANSWER: &str = "answer";
pub const EVENT_ICE_CANDIDATE: &str = "ice-candidate";
pub const EVENT_PING: &str = "ping";

/// The three kinds of negotiation message the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// Event name on the wire, used both inbound and outbound.
    pub fn event_name(self) -> &'static str {
        match self {
            SignalKind::Offer => EVENT_OFFER,
            SignalKind::Answer => EVENT_ANSWER,
            SignalKind::IceCandidate => EVENT_ICE_CANDIDATE,
        }
    }

    /// Name of the field carrying the opaque payload.
    pub fn payload_field(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "candidate",
        }
    }

    /// Human-readable label for log lines and error replies.
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ICE candidate",
        }
    }
}

/// An offer, answer, or candidate addressed to another peer.
///
/// Fields are optional here; the router rejects requests with blank fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRequest {
    pub kind: SignalKind,
    pub to: Option<String>,
    pub from: Option<String>,
    pub payload: Option<Value>,
}

/// A decoded frame from a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Register { user_id: Option<String> },
    Signal(SignalRequest),
    Ping,
}

/// A frame sent from the relay to a peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    UserRegistered(UserRegisteredPayload),
    UserOnline(PresencePayload),
    UserDisconnected(PresencePayload),
    Offer(ForwardedOffer),
    Answer(ForwardedAnswer),
    IceCandidate(ForwardedCandidate),
    Pong(PongPayload),
    Error(ErrorPayload),
}

impl ServerEvent {
    /// Build an `error` event carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Build the forwarded form of a signal: only `from` and the payload survive.
    pub fn forwarded(kind: SignalKind, from: String, payload: Value) -> Self {
        match kind {
            SignalKind::Offer => ServerEvent::Offer(ForwardedOffer {
                from,
                offer: payload,
            }),
            SignalKind::Answer => ServerEvent::Answer(ForwardedAnswer {
                from,
                answer: payload,
            }),
            SignalKind::IceCandidate => ServerEvent::IceCandidate(ForwardedCandidate {
                from,
                candidate: payload,
            }),
        }
    }

    /// Wire name of this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::UserRegistered(_) => "user-registered",
            ServerEvent::UserOnline(_) => "user-online",
            ServerEvent::UserDisconnected(_) => "user-disconnected",
            ServerEvent::Offer(_) => EVENT_OFFER,
            ServerEvent::Answer(_) => EVENT_ANSWER,
            ServerEvent::IceCandidate(_) => EVENT_ICE_CANDIDATE,
            ServerEvent::Pong(_) => "pong",
            ServerEvent::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectedPayload {
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegisteredPayload {
    pub user_id: String,
    pub message: String,
}

/// Body of `user-online` and `user-disconnected`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardedOffer {
    pub from: String,
    pub offer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardedAnswer {
    pub from: String,
    pub answer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardedCandidate {
    pub from: String,
    pub candidate: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PongPayload {
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Whether a JSON value counts as missing.
///
/// Absent-equivalent values are `null`, `""`, `{}`, `[]`, `false` and zero.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
