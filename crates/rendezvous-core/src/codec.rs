//! JSON text framing for the signaling socket.
//!
//! Wire format: one text frame per event, `{"event": "<name>", "data": {...}}`.
//! `data` may be omitted or `null` for events that carry no fields.

use crate::error::{RendezvousError, RendezvousResult};
use crate::messages::*;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Envelope shared by every inbound frame.
#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Encode an outbound event into a text frame.
pub fn encode_server_event(event: &ServerEvent) -> RendezvousResult<String> {
    Ok(serde_json::to_string(event)?)
}

/// Decode an inbound text frame into a typed event.
pub fn decode_client_event(text: &str) -> RendezvousResult<ClientEvent> {
    let frame: RawFrame = serde_json::from_str(text)?;
    let mut data = match frame.data {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(RendezvousError::InvalidMessage(format!(
                "`data` of {} must be an object, got {other}",
                frame.event
            )))
        }
    };

    match frame.event.as_str() {
        EVENT_REGISTER => Ok(ClientEvent::Register {
            user_id: take_string(&mut data, "userId")?,
        }),
        EVENT_OFFER => decode_signal(SignalKind::Offer, data),
        EVENT_ANSWER => decode_signal(SignalKind::Answer, data),
        EVENT_ICE_CANDIDATE => decode_signal(SignalKind::IceCandidate, data),
        EVENT_PING => Ok(ClientEvent::Ping),
        other => Err(RendezvousError::InvalidMessage(format!(
            "unknown event: {other}"
        ))),
    }
}

fn decode_signal(kind: SignalKind, mut data: Map<String, Value>) -> RendezvousResult<ClientEvent> {
    Ok(ClientEvent::Signal(SignalRequest {
        kind,
        to: take_string(&mut data, "to")?,
        from: take_string(&mut data, "from")?,
        payload: data.remove(kind.payload_field()),
    }))
}

/// Remove a string field; `null` and absence both read as `None`.
fn take_string(data: &mut Map<String, Value>, key: &str) -> RendezvousResult<Option<String>> {
    match data.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(RendezvousError::InvalidMessage(format!(
            "field `{key}` must be a string, got {other}"
        ))),
    }
}
