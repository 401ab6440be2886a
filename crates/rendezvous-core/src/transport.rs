//! Abstract session gateway for the relay.
//!
//! The transport layer owns live connections; the router only ever sees
//! opaque [`SessionId`]s and pushes events through a [`SessionGateway`].

use crate::error::RendezvousResult;
use crate::messages::ServerEvent;
use std::fmt;

/// Opaque handle to one live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound side of the transport, as seen by the router.
///
/// Sends are fire-and-forget: implementations must not block waiting for the
/// recipient, and an `Err` only means this one frame was not queued.
pub trait SessionGateway: Send + Sync {
    /// Queue `event` for delivery to `session`.
    fn send(&self, session: SessionId, event: ServerEvent) -> RendezvousResult<()>;

    /// Snapshot of the sessions that are currently connected.
    fn live_sessions(&self) -> Vec<SessionId>;
}
