// WebSocket transport for the auction server.
//
// A `Connector` opens one WebSocket connection and hands back a duplex of
// text frames. The session task owns the duplex; everything above it speaks
// in Engine.IO/Socket.IO frames, never in tungstenite messages.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

/// Outgoing text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Incoming text frames. The stream ends (or yields `Closed`) when the
/// server closes the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open connection.
pub struct Duplex {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection attempt timed out")]
    Timeout,

    /// The server refused the upgrade or the handshake did not line up.
    /// Expected while a server is still coming up; logged at debug only.
    #[error("transport negotiation failed: {0}")]
    Negotiation(String),

    #[error("server rejected connection: {0}")]
    Rejected(String),

    #[error("no heartbeat from server")]
    Heartbeat,

    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// Errors from a transport fallback/negotiation step rather than a real
    /// failure. These are not surfaced to the user.
    pub fn is_fallback(&self) -> bool {
        matches!(self, TransportError::Negotiation(_))
    }

    fn from_ws(err: tungstenite::Error) -> Self {
        use tungstenite::Error as WsError;
        match err {
            WsError::Http(response) => {
                TransportError::Negotiation(format!("upgrade refused with HTTP {}", response.status()))
            }
            WsError::Protocol(e) => TransportError::Negotiation(e.to_string()),
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
            other => TransportError::Connect(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Duplex, TransportError>;
}

/// Real connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Duplex, TransportError> {
        debug!("Dialing {url}");
        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(TransportError::from_ws)?;
        let (write, read) = ws.split();

        let sink = write
            .sink_map_err(TransportError::from_ws)
            .with(|frame: String| future::ready(Ok::<_, TransportError>(Message::Text(frame.into()))));

        Ok(Duplex {
            sink: Box::pin(sink),
            stream: Box::pin(text_frames(read)),
        })
    }
}

/// Reduce a WebSocket message stream to its text frames. Binary and
/// control frames are dropped (tungstenite answers WebSocket pings
/// itself); a close frame becomes `Closed`.
pub fn text_frames<St>(read: St) -> impl Stream<Item = Result<String, TransportError>> + Send
where
    St: Stream<Item = Result<Message, tungstenite::Error>> + Send,
{
    read.filter_map(|msg| {
        future::ready(match msg {
            Ok(Message::Text(text)) => Some(Ok(text.to_string())),
            Ok(Message::Close(_)) => Some(Err(TransportError::Closed)),
            Ok(_) => None,
            Err(e) => Some(Err(TransportError::from_ws(e))),
        })
    })
}

/// Derive the Socket.IO endpoint from the REST base URL: the scheme
/// becomes `ws`/`wss` and a trailing `/api` segment is dropped.
pub fn socket_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let root = trimmed.strip_suffix("/api").unwrap_or(trimmed);
    let ws_root = if let Some(rest) = root.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = root.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        root.to_string()
    };
    format!("{ws_root}/socket.io/?EIO=4&transport=websocket")
}
