use thiserror::Error;

/// Errors produced by the rendezvous protocol layer.
#[derive(Debug, Error)]
pub enum RendezvousError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RendezvousError {
    fn from(e: serde_json::Error) -> Self {
        RendezvousError::Codec(e.to_string())
    }
}

pub type RendezvousResult<T> = Result<T, RendezvousError>;
