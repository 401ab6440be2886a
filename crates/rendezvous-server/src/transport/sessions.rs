//! Live session table: the outbound half of the transport gateway.
//!
//! Every accepted connection gets a [`SessionId`] and a bounded queue. The
//! router sends through [`SessionGateway`]; the connection task drains the
//! queue onto its socket, so a slow peer only ever fills its own queue.

use parking_lot::RwLock;
use rendezvous_core::{RendezvousError, RendezvousResult, ServerEvent, SessionGateway, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub struct SessionTable {
    senders: RwLock<HashMap<SessionId, mpsc::Sender<ServerEvent>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl SessionTable {
    /// Create an empty table whose per-session queues hold `queue_capacity` frames.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Allocate a session and return the receiving end of its queue.
    pub fn open(&self) -> (SessionId, mpsc::Receiver<ServerEvent>) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.senders.write().insert(id, tx);
        (id, rx)
    }

    /// Drop a session from the live set. Idempotent.
    pub fn close(&self, session: SessionId) {
        self.senders.write().remove(&session);
    }

    /// Number of open sessions.
    pub fn count(&self) -> usize {
        self.senders.read().len()
    }
}

impl SessionGateway for SessionTable {
    fn send(&self, session: SessionId, event: ServerEvent) -> RendezvousResult<()> {
        let senders = self.senders.read();
        let tx = senders
            .get(&session)
            .ok_or_else(|| RendezvousError::SessionNotFound(session.to_string()))?;
        tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => {
                RendezvousError::Transport(format!("outbound queue full for session {session}"))
            }
            TrySendError::Closed(_) => RendezvousError::SessionNotFound(session.to_string()),
        })
    }

    fn live_sessions(&self) -> Vec<SessionId> {
        self.senders.read().keys().copied().collect()
    }
}
