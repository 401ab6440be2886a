//! Presence registry and message router.

pub mod registry;
pub mod router;

pub use registry::PresenceRegistry;
pub use router::{InboundEvent, MessageRouter};
