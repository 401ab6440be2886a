//! rendezvous-core: Shared protocol library for the rendezvous relay.
//!
//! Provides the inbound/outbound event types, the JSON text-frame codec,
//! and the abstract session gateway the router sends through.

pub mod codec;
pub mod error;
pub mod messages;
pub mod transport;

// Re-export commonly used items at crate root.
pub use codec::{decode_client_event, encode_server_event};
pub use error::{RendezvousError, RendezvousResult};
pub use messages::{ClientEvent, ServerEvent};
pub use transport::{SessionGateway, SessionId};
