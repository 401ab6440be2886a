//! Transport gateway: WebSocket accept loop and the live session table.

pub mod sessions;
pub mod websocket;

pub use sessions::SessionTable;
