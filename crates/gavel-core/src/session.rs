// Connection state machine for one auction session.
//
// Pure bookkeeping: every input returns the list of `Action`s the session
// task must perform (dial, emit, schedule a retry, ...). Keeping I/O out of
// here lets the join-deferral and retry rules be tested without sockets.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::RetryConfig;
use crate::transport::TransportError;
use crate::wire::ClientEvent;

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff.
///
/// `delay_for(n)` is the wait before reconnect attempt `n` (1-based):
/// `min(initial * factor^(n-1), max)`. Past `max_attempts` it returns `None`
/// and the session gives up.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let exp = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let millis = self.initial.as_millis() as f64 * self.factor.powi(exp);
        let capped = millis.min(self.max.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: cfg.max_attempts,
            initial: Duration::from_millis(cfg.initial_delay_ms),
            max: Duration::from_millis(cfg.max_delay_ms),
            factor: cfg.factor,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    /// Dial or handshake in flight. `attempt` is 0 for the first try.
    Connecting { attempt: u32 },
    Connected,
    /// Waiting `delay` before reconnect attempt `attempt`.
    Backoff { attempt: u32, delay: Duration },
    /// Retry budget exhausted.
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting { .. } => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Backoff { .. } => "Reconnecting",
            ConnectionState::Failed { .. } => "Failed",
        }
    }
}

/// Side effects requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open a new transport connection.
    Dial,
    /// Send an event over the open connection.
    Emit(ClientEvent),
    /// Wake up after the delay and call `on_retry_due`.
    ScheduleRetry(Duration),
    /// Tear down the transport (and any dial in flight).
    CloseSocket,
    /// Fail every request still waiting on a reply or a connection.
    FailPending,
}

// ---------------------------------------------------------------------------
// ConnectionMachine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    policy: RetryPolicy,
    has_credential: bool,
    /// Failed attempts since the last successful connect.
    retry_count: u32,
    /// Channel joined (or to be joined). Re-joined after a reconnect.
    channel: Option<String>,
    /// A join must be emitted on the next connect acknowledgement.
    join_pending: bool,
    /// Requests issued while not connected, flushed on connect.
    queued: Vec<ClientEvent>,
}

impl ConnectionMachine {
    pub fn new(policy: RetryPolicy, has_credential: bool) -> Self {
        ConnectionMachine {
            state: ConnectionState::Disconnected,
            policy,
            has_credential,
            retry_count: 0,
            channel: None,
            join_pending: false,
            queued: Vec::new(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Start connecting unless connected or already trying.
    pub fn connect(&mut self) -> Vec<Action> {
        if !self.has_credential {
            error!("No authentication token found, not connecting");
            return vec![];
        }
        match self.state {
            ConnectionState::Connected
            | ConnectionState::Connecting { .. }
            | ConnectionState::Backoff { .. } => {
                debug!("connect() ignored, state is {}", self.state.label());
                vec![]
            }
            ConnectionState::Disconnected | ConnectionState::Failed { .. } => {
                self.retry_count = 0;
                self.state = ConnectionState::Connecting { attempt: 0 };
                vec![Action::Dial]
            }
        }
    }

    /// The namespace connect acknowledgement arrived.
    pub fn on_connected(&mut self) -> Vec<Action> {
        info!("Connected after {} failed attempt(s)", self.retry_count);
        self.state = ConnectionState::Connected;
        self.retry_count = 0;

        let mut actions = Vec::new();
        if self.join_pending {
            self.join_pending = false;
            if let Some(event_id) = &self.channel {
                actions.push(Action::Emit(ClientEvent::JoinAuction {
                    event_id: event_id.clone(),
                }));
            }
        }
        actions.extend(self.queued.drain(..).map(Action::Emit));
        actions
    }

    /// A dial, handshake, or established connection failed.
    pub fn on_failure(&mut self, err: &TransportError) -> Vec<Action> {
        if matches!(self.state, ConnectionState::Disconnected) {
            // Explicitly disconnected; late errors from the old socket don't count.
            debug!("Ignoring transport error after disconnect: {}", err);
            return vec![];
        }

        if err.is_fallback() {
            debug!("Transport negotiation fell through: {}", err);
        } else {
            warn!("Transport error: {}", err);
        }

        if self.state.is_connected() && self.channel.is_some() {
            self.join_pending = true;
        }

        // Replies for anything in flight will never come, and queued
        // requests are not replayed on a later connection.
        self.queued.clear();
        self.retry_count += 1;
        let mut actions = vec![Action::CloseSocket, Action::FailPending];
        match self.policy.delay_for(self.retry_count) {
            Some(delay) => {
                info!(
                    "Reconnecting in {:?} (attempt {}/{})",
                    delay, self.retry_count, self.policy.max_attempts
                );
                self.state = ConnectionState::Backoff {
                    attempt: self.retry_count,
                    delay,
                };
                actions.push(Action::ScheduleRetry(delay));
            }
            None => {
                error!(
                    "Giving up after {} attempts: {}",
                    self.retry_count - 1,
                    err
                );
                self.state = ConnectionState::Failed {
                    reason: err.to_string(),
                };
            }
        }
        actions
    }

    /// The backoff delay elapsed.
    pub fn on_retry_due(&mut self) -> Vec<Action> {
        match self.state {
            ConnectionState::Backoff { attempt, .. } => {
                self.state = ConnectionState::Connecting { attempt };
                vec![Action::Dial]
            }
            _ => vec![],
        }
    }

    /// Join an event channel, connecting first if needed. The join is
    /// emitted at most once per call and never twice while connecting.
    pub fn join(&mut self, event_id: &str) -> Vec<Action> {
        self.channel = Some(event_id.to_string());
        match self.state {
            ConnectionState::Connected => vec![Action::Emit(ClientEvent::JoinAuction {
                event_id: event_id.to_string(),
            })],
            ConnectionState::Connecting { .. } | ConnectionState::Backoff { .. } => {
                self.join_pending = true;
                vec![]
            }
            ConnectionState::Disconnected | ConnectionState::Failed { .. } => {
                self.join_pending = true;
                self.connect()
            }
        }
    }

    /// Leave an event channel. Only emits when connected; otherwise the
    /// local membership is forgotten and nothing is queued.
    pub fn leave(&mut self, event_id: &str) -> Vec<Action> {
        if self.channel.as_deref() == Some(event_id) {
            self.channel = None;
            self.join_pending = false;
        }
        if self.state.is_connected() {
            vec![Action::Emit(ClientEvent::LeaveAuction {
                event_id: event_id.to_string(),
            })]
        } else {
            debug!("leave({}) while {}: nothing to send", event_id, self.state.label());
            vec![]
        }
    }

    /// Send a request now, or queue it until the connect acknowledgement.
    /// A queued request is failed, not replayed, if the attempt fails.
    pub fn request(&mut self, event: ClientEvent) -> Vec<Action> {
        if self.state.is_connected() {
            return vec![Action::Emit(event)];
        }
        if !self.has_credential {
            error!("No authentication token found, dropping {}", event.wire_name());
            return vec![Action::FailPending];
        }
        self.queued.push(event);
        self.connect()
    }

    /// Explicit teardown. Forgets membership and queued requests.
    pub fn disconnect(&mut self) -> Vec<Action> {
        self.state = ConnectionState::Disconnected;
        self.retry_count = 0;
        self.channel = None;
        self.join_pending = false;
        self.queued.clear();
        vec![Action::CloseSocket, Action::FailPending]
    }
}
