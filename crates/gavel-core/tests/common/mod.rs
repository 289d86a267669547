// Shared test helpers: an in-memory connector that hands each dialed
// connection to the test as a scripted fake server.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{sink, stream};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use gavel_core::client::{Session, SessionConfig};
use gavel_core::session::RetryPolicy;
use gavel_core::transport::{Connector, Duplex, TransportError};

pub const AUTH_FRAME: &str = r#"40{"token":"jwt"}"#;

/// The far end of one dialed connection.
pub struct FakeServer {
    to_client: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl FakeServer {
    pub fn send(&self, frame: impl Into<String>) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Ok(frame.into()));
        }
    }

    /// Engine.IO open packet with a generous heartbeat window.
    pub fn open(&self) {
        self.send(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#);
    }

    /// Namespace connect acknowledgement.
    pub fn accept(&self) {
        self.send(r#"40{"sid":"xyz"}"#);
    }

    pub fn emit(&self, name: &str, data: Value) {
        self.send(format!("42{}", json!([name, data])));
    }

    /// Next frame the client wrote, or `None` if nothing arrives within a
    /// second of (virtual) time.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(1), self.from_client.recv())
            .await
            .ok()
            .flatten()
    }

    /// Open, expect the auth packet, accept.
    pub async fn handshake(&mut self) {
        self.open();
        assert_eq!(self.recv().await.as_deref(), Some(AUTH_FRAME));
        self.accept();
    }

    /// Drop the server side of the connection; the client sees end of stream.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }
}

pub fn join_frame(event_id: &str) -> String {
    format!(r#"42["join:auction",{{"eventId":"{event_id}"}}]"#)
}

/// Connector whose dials either fail with a scripted error or produce a
/// `FakeServer` on the returned channel.
pub struct MockConnector {
    servers: mpsc::UnboundedSender<FakeServer>,
    failures: Mutex<VecDeque<TransportError>>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = MockConnector {
            servers,
            failures: Mutex::new(VecDeque::new()),
        };
        (Arc::new(connector), rx)
    }

    /// Make the next `n` dials fail with `err`.
    pub fn fail_next(&self, n: usize, err: TransportError) {
        let mut failures = self.failures.lock().unwrap();
        for _ in 0..n {
            failures.push_back(err.clone());
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Duplex, TransportError> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let (to_client, client_rx) = mpsc::unbounded_channel::<Result<String, TransportError>>();
        let (client_tx, from_client) = mpsc::unbounded_channel::<String>();

        let sink = sink::unfold(client_tx, |tx, frame: String| async move {
            tx.send(frame).map_err(|_| TransportError::Closed)?;
            Ok::<_, TransportError>(tx)
        });
        let stream = stream::unfold(client_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let _ = self.servers.send(FakeServer {
            to_client: Some(to_client),
            from_client,
        });
        Ok(Duplex {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial: Duration::from_millis(100),
        max: Duration::from_millis(400),
        factor: 2.0,
    }
}

pub fn open_session(connector: Arc<MockConnector>, token: Option<&str>, retry: RetryPolicy) -> Session {
    let config = SessionConfig {
        url: "ws://test/socket.io/?EIO=4&transport=websocket".into(),
        token: token.map(str::to_string),
        retry,
    };
    Session::open(config, connector)
}

pub fn player_json(id: &str, name: &str, role: &str, base: u64) -> Value {
    json!({"_id": id, "name": name, "role": role, "basePrice": base})
}
