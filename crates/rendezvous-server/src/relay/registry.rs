//! Presence registry: which peer identifier is reachable on which session.
//!
//! Holds the single mapping from caller-chosen peer identifiers to live
//! session handles. Registration is last-writer-wins per identifier, and
//! entries keep the order in which each identifier was first registered.

use rendezvous_core::SessionId;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Registry of peers that currently have a live session.
#[derive(Default)]
pub struct PresenceRegistry {
    /// Session handle indexed by peer identifier, in first-registration order.
    peers: RwLock<IndexMap<String, SessionId>>,
}

impl PresenceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `peer_id` to `session`, replacing any previous mapping.
    ///
    /// The superseded session is not notified. Other identifiers that still
    /// point at `session` are left in place. Overwriting keeps the entry's
    /// original position.
    pub async fn register(&self, peer_id: String, session: SessionId) {
        let mut peers = self.peers.write().await;
        if let Some(previous) = peers.insert(peer_id.clone(), session) {
            if previous != session {
                debug!(peer = %peer_id, old = %previous, new = %session, "peer re-registered on new session");
            }
        }
    }

    /// Resolve a peer identifier to its session.
    pub async fn lookup(&self, peer_id: &str) -> Option<SessionId> {
        self.peers.read().await.get(peer_id).copied()
    }

    /// Remove the earliest-registered entry whose session is `session`,
    /// returning its identifier.
    ///
    /// Linear in the number of peers; only called once per disconnect.
    pub async fn remove_by_session(&self, session: SessionId) -> Option<String> {
        let mut peers = self.peers.write().await;
        let index = peers.values().position(|s| *s == session)?;
        let (peer_id, _) = peers.shift_remove_index(index)?;
        Some(peer_id)
    }

    /// Number of registered peers.
    pub async fn count(&self) -> usize {
        self.peers.read().await.len()
    }
}
