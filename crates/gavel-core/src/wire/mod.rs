// Socket.IO wire format: framing plus the typed auction messages.

pub mod messages;
pub mod packet;

use thiserror::Error;

pub use messages::{ClientEvent, EventKind, ServerEvent};
pub use packet::{EnginePacket, OpenHandshake, SocketPacket};

/// A frame or payload the client could not make sense of. These are
/// protocol errors: the offending message is dropped and logged.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("empty frame")]
    Empty,

    #[error("unknown engine.io packet type {0:?}")]
    UnknownEngineType(char),

    #[error("unknown socket.io packet type {0:?}")]
    UnknownSocketType(char),

    #[error("invalid engine.io handshake: {0}")]
    Handshake(String),

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("unknown event {0:?}")]
    UnknownEvent(String),

    #[error("invalid payload for {event}: {message}")]
    Payload { event: String, message: String },
}
