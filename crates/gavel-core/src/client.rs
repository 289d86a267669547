// Realtime session: a single task that owns the socket.
//
// `Session::open` spawns the task and returns immediately. Callers talk to
// it through a cloneable `SessionHandle`: commands go in over an mpsc
// channel, connection state comes out over a watch channel and server
// events are fanned out to scoped `Subscription`s. All connection rules
// (deferred join, retry budget) live in `ConnectionMachine`; this file only
// performs the I/O it asks for.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{future, SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::MAX_WINDOW_SECS;
use crate::listeners::{ListenerRegistry, Subscription};
use crate::session::{Action, ConnectionMachine, ConnectionState, RetryPolicy};
use crate::transport::{Connector, Duplex, FrameSink, FrameStream, TransportError};
use crate::wire::messages::CommandResponse;
use crate::wire::{ClientEvent, EnginePacket, EventKind, ServerEvent, SocketPacket, WireError};

/// Upper bound for the WebSocket dial plus the Engine.IO open packet, and
/// separately for the namespace acknowledgement after it.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap on the server-advertised heartbeat window.
const MAX_PING_WINDOW: Duration = Duration::from_secs(600);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("not connected to the auction server")]
    Disconnected,

    #[error("session has shut down")]
    Closed,
}

pub type Reply = Result<CommandResponse, SessionError>;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Full Socket.IO WebSocket URL (see `transport::socket_url`).
    pub url: String,
    pub token: Option<String>,
    pub retry: RetryPolicy,
}

enum Command {
    Connect,
    Disconnect,
    Join(String),
    Leave(String),
    Request {
        event: ClientEvent,
        reply: oneshot::Sender<Reply>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Owner of the session task.
pub struct Session {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl Session {
    pub fn open(config: SessionConfig, connector: Arc<dyn Connector>) -> Session {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionState::Disconnected);
        let registry = ListenerRegistry::new();

        let actor = Actor {
            machine: ConnectionMachine::new(config.retry, config.token.is_some()),
            connector,
            url: config.url,
            token: config.token,
            registry: registry.clone(),
            status_tx,
            pending: HashMap::new(),
            link: None,
            dial: None,
            retry_at: None,
        };
        let task = tokio::spawn(actor.run(cmd_rx));

        Session {
            handle: SessionHandle {
                cmd_tx,
                status: status_rx,
                registry,
            },
            task,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Disconnect, fail outstanding requests and wait for the task to exit.
    pub async fn close(self) {
        let _ = self.handle.cmd_tx.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!("Session task ended abnormally: {e}");
        }
    }
}

/// Cheap, cloneable front end to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionState>,
    registry: ListenerRegistry,
}

impl SessionHandle {
    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("Session task gone, command dropped");
        }
    }

    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close the connection and release every listener.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    pub fn join_channel(&self, event_id: &str) {
        self.send(Command::Join(event_id.to_string()));
    }

    pub fn leave_channel(&self, event_id: &str) {
        self.send(Command::Leave(event_id.to_string()));
    }

    pub fn listen(&self, kinds: &[EventKind]) -> Subscription {
        self.registry.subscribe(kinds)
    }

    pub fn submit_bid(&self, event_id: &str, player_id: &str, amount: u64) -> PendingReply {
        self.request(ClientEvent::SubmitBid {
            event_id: event_id.to_string(),
            player_id: player_id.to_string(),
            amount,
        })
    }

    pub fn start_player(&self, event_id: &str, player_id: &str) -> PendingReply {
        self.request(ClientEvent::StartPlayer {
            event_id: event_id.to_string(),
            player_id: player_id.to_string(),
        })
    }

    fn request(&self, event: ClientEvent) -> PendingReply {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Request { event, reply });
        PendingReply(rx)
    }

    pub fn status(&self) -> ConnectionState {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }
}

/// The one-shot reply to a bid or start request.
pub struct PendingReply(oneshot::Receiver<Reply>);

impl PendingReply {
    pub async fn wait(self) -> Reply {
        self.0.await.unwrap_or(Err(SessionError::Closed))
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

type DialFuture = Pin<Box<dyn Future<Output = Result<Duplex, TransportError>> + Send>>;

struct Link {
    sink: FrameSink,
    stream: FrameStream,
    /// Namespace connect acknowledged.
    joined: bool,
    /// Fail the connection if no ping (or open packet) arrives by then.
    deadline: Instant,
    ping_window: Duration,
    /// Fail the connection if the namespace is not acknowledged by then.
    /// Pings do not extend it. Cleared once `joined`.
    ack_deadline: Option<Instant>,
}

impl Link {
    /// The earliest deadline still armed, and the error it raises.
    fn expiry(&self) -> (Instant, TransportError) {
        match self.ack_deadline {
            Some(ack) if ack < self.deadline => (ack, TransportError::Timeout),
            _ => (self.deadline, TransportError::Heartbeat),
        }
    }
}

struct Actor {
    machine: ConnectionMachine,
    connector: Arc<dyn Connector>,
    url: String,
    token: Option<String>,
    registry: ListenerRegistry,
    status_tx: watch::Sender<ConnectionState>,
    /// Responders waiting for a one-shot reply, oldest first.
    pending: HashMap<EventKind, VecDeque<oneshot::Sender<Reply>>>,
    link: Option<Link>,
    dial: Option<DialFuture>,
    retry_at: Option<Instant>,
}

async fn dial_result(dial: &mut Option<DialFuture>) -> Result<Duplex, TransportError> {
    match dial {
        Some(fut) => fut.await,
        None => future::pending().await,
    }
}

async fn next_frame(link: &mut Option<Link>) -> Option<Result<String, TransportError>> {
    match link {
        Some(link) => link.stream.next().await,
        None => future::pending().await,
    }
}

/// Sleep until `at`, or forever when there is no deadline.
pub(crate) async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => future::pending().await,
    }
}

impl Actor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            let (expiry, expiry_error) = match self.link.as_ref().map(Link::expiry) {
                Some((at, err)) => (Some(at), Some(err)),
                None => (None, None),
            };
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Shutdown) | None => {
                            self.teardown().await;
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                result = dial_result(&mut self.dial) => {
                    self.dial = None;
                    match result {
                        Ok(duplex) => {
                            debug!("Transport open, waiting for handshake");
                            self.link = Some(Link {
                                sink: duplex.sink,
                                stream: duplex.stream,
                                joined: false,
                                deadline: Instant::now() + CONNECT_TIMEOUT,
                                ping_window: CONNECT_TIMEOUT,
                                ack_deadline: None,
                            });
                        }
                        Err(e) => self.fail(e).await,
                    }
                }
                frame = next_frame(&mut self.link) => {
                    match frame {
                        Some(Ok(text)) => self.handle_frame(&text).await,
                        Some(Err(e)) => self.fail(e).await,
                        None => self.fail(TransportError::Closed).await,
                    }
                }
                _ = sleep_until(self.retry_at) => {
                    self.retry_at = None;
                    let actions = self.machine.on_retry_due();
                    self.execute(actions).await;
                }
                _ = sleep_until(expiry) => {
                    let err = expiry_error.unwrap_or(TransportError::Heartbeat);
                    self.fail(err).await;
                }
            }
            self.publish();
        }
        self.publish();
        info!("Session task stopped");
    }

    fn publish(&self) {
        let state = self.machine.state().clone();
        self.status_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    async fn teardown(&mut self) {
        self.registry.clear();
        let actions = self.machine.disconnect();
        self.execute(actions).await;
    }

    async fn handle_command(&mut self, cmd: Command) {
        let actions = match cmd {
            Command::Connect => self.machine.connect(),
            Command::Disconnect => {
                self.teardown().await;
                return;
            }
            Command::Join(event_id) => self.machine.join(&event_id),
            Command::Leave(event_id) => self.machine.leave(&event_id),
            Command::Request { event, reply } => {
                if let Some(kind) = event.response_kind() {
                    self.pending.entry(kind).or_default().push_back(reply);
                }
                self.machine.request(event)
            }
            Command::Shutdown => vec![],
        };
        self.execute(actions).await;
    }

    async fn fail(&mut self, err: TransportError) {
        let actions = self.machine.on_failure(&err);
        self.execute(actions).await;
    }

    async fn execute(&mut self, actions: Vec<Action>) {
        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                Action::Dial => {
                    let connector = Arc::clone(&self.connector);
                    let url = self.url.clone();
                    self.dial = Some(Box::pin(async move {
                        match tokio::time::timeout(CONNECT_TIMEOUT, connector.connect(&url)).await {
                            Ok(result) => result,
                            Err(_) => Err(TransportError::Timeout),
                        }
                    }));
                }
                Action::Emit(event) => {
                    if self.link.is_none() {
                        debug!("No connection, dropping {}", event.wire_name());
                        continue;
                    }
                    debug!("-> {}", event.wire_name());
                    if let Err(e) = self.send_frame(event.to_frame()).await {
                        queue.extend(self.machine.on_failure(&e));
                    }
                }
                Action::ScheduleRetry(delay) => {
                    let delay = delay.min(Duration::from_secs(MAX_WINDOW_SECS));
                    self.retry_at = Some(Instant::now() + delay);
                }
                Action::CloseSocket => self.close_link().await,
                Action::FailPending => self.fail_pending(),
            }
        }
    }

    async fn close_link(&mut self) {
        self.dial = None;
        self.retry_at = None;
        if let Some(mut link) = self.link.take() {
            if link.joined {
                let _ = link.sink.send(SocketPacket::Disconnect.to_frame()).await;
            }
            let _ = link.sink.close().await;
        }
    }

    fn fail_pending(&mut self) {
        for (_, queue) in self.pending.drain() {
            for reply in queue {
                let _ = reply.send(Err(SessionError::Disconnected));
            }
        }
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        match self.link.as_mut() {
            Some(link) => link.sink.send(frame).await,
            None => Err(TransportError::Closed),
        }
    }

    async fn handle_frame(&mut self, text: &str) {
        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(WireError::Handshake(e)) => {
                self.fail(TransportError::Negotiation(e)).await;
                return;
            }
            Err(e) => {
                warn!("Dropping frame: {e}");
                return;
            }
        };

        match packet {
            EnginePacket::Open(handshake) => {
                debug!("Engine open, sid {}", handshake.sid);
                if let Some(link) = self.link.as_mut() {
                    let window = handshake.ping_interval.saturating_add(handshake.ping_timeout);
                    link.ping_window = Duration::from_millis(window).min(MAX_PING_WINDOW);
                    link.deadline = Instant::now() + link.ping_window;
                    link.ack_deadline = Some(Instant::now() + CONNECT_TIMEOUT);
                }
                let auth = self.token.as_ref().map(|token| json!({ "token": token }));
                if let Err(e) = self.send_frame(SocketPacket::Connect(auth).to_frame()).await {
                    self.fail(e).await;
                }
            }
            EnginePacket::Ping(data) => {
                if let Some(link) = self.link.as_mut() {
                    link.deadline = Instant::now() + link.ping_window;
                }
                if let Err(e) = self.send_frame(EnginePacket::Pong(data).encode()).await {
                    self.fail(e).await;
                }
            }
            EnginePacket::Close => self.fail(TransportError::Closed).await,
            EnginePacket::Message(body) => self.handle_message(&body).await,
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {}
        }
    }

    async fn handle_message(&mut self, body: &str) {
        let packet = match SocketPacket::decode(body) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping socket packet: {e}");
                return;
            }
        };

        match packet {
            SocketPacket::Connect(_) => {
                if let Some(link) = self.link.as_mut() {
                    link.joined = true;
                    link.ack_deadline = None;
                }
                let actions = self.machine.on_connected();
                self.execute(actions).await;
            }
            SocketPacket::ConnectError(data) => {
                let reason = SocketPacket::connect_error_message(&data);
                self.fail(TransportError::Rejected(reason)).await;
            }
            SocketPacket::Disconnect => {
                info!("Server closed the session");
                self.fail(TransportError::Closed).await;
            }
            SocketPacket::Event { name, data, .. } => match ServerEvent::from_wire(&name, data) {
                Ok(event) => self.deliver(event),
                Err(e) => warn!("Dropping event: {e}"),
            },
            SocketPacket::Ack { id, .. } => debug!("Ignoring ack {id}"),
        }
    }

    fn deliver(&mut self, event: ServerEvent) {
        let kind = event.kind();
        debug!("<- {}", kind.wire_name());
        let response = match &event {
            ServerEvent::BidResponse(r) | ServerEvent::StartPlayerResponse(r) => Some(r.clone()),
            _ => None,
        };
        if let Some(response) = response {
            match self.pending.get_mut(&kind).and_then(VecDeque::pop_front) {
                Some(reply) => {
                    let _ = reply.send(Ok(response));
                }
                None => debug!("Unsolicited {}", kind.wire_name()),
            }
        }
        self.registry.dispatch(&event);
    }
}
