// Auction session synchronizer: the event loop behind the live view.
//
// One task owns the `AuctionView`, the notification list and every local
// timer. It multiplexes server pushes, connection status, command replies,
// the 1 s tick and UI commands with `tokio::select!`, and pushes a fresh
// snapshot to the UI after each step.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{sleep_until, PendingReply, Reply, Session, SessionHandle};
use crate::config::{save_ui_state, Config, NotificationConfig, UiState};
use crate::countdown::{self, CountdownDisplay};
use crate::listeners::Subscription;
use crate::model::{format_amount, Player, PlayerRole, Viewer};
use crate::notify::{NotificationCenter, NotificationKind};
use crate::protocol::{ConnectionStatus, UiUpdate, UserCommand, ViewSnapshot};
use crate::reducer::{AuctionView, Effect, Phase, TeamBalance, ViewSettings};
use crate::session::ConnectionState;
use crate::wire::EventKind;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

const FATAL_CONNECT_TEXT: &str = "Failed to connect to auction server. Please try again.";
const JOIN_TIMEOUT_TEXT: &str = "Failed to load event. Please check if the event exists and try again.";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub event_id: String,
    pub viewer: Viewer,
    pub view: ViewSettings,
    pub join_timeout: Duration,
    pub auto_start: bool,
    pub notifications: NotificationConfig,
    /// Non-authoritative balance from the REST team record, if known.
    pub initial_balance: Option<TeamBalance>,
    /// Base dir to save the auto-start toggle under. `None` keeps it in memory.
    pub state_dir: Option<PathBuf>,
}

impl SyncConfig {
    pub fn new(config: &Config, event_id: impl Into<String>, viewer: Viewer) -> Self {
        SyncConfig {
            event_id: event_id.into(),
            viewer,
            view: ViewSettings {
                player_timer: Duration::from_secs(u64::from(config.auction.player_timer_secs)),
                settle_delay: config.auction.settle_delay(),
                default_bid_increment: config.auction.default_bid_increment,
            },
            join_timeout: config.auction.join_timeout(),
            auto_start: config.auction.auto_start,
            notifications: config.notifications.clone(),
            initial_balance: None,
            state_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Player selection
// ---------------------------------------------------------------------------

const ROLE_ORDER: [PlayerRole; 3] = [PlayerRole::Batsman, PlayerRole::Bowler, PlayerRole::AllRounder];

/// Choose the next player to auto-start: the cheapest player of the event's
/// current category (batsman by default), else of the first non-empty
/// category in batsman, bowler, all-rounder order, else of everyone.
pub fn pick_next_player(players: &[Player], category: Option<PlayerRole>) -> Option<&Player> {
    let cheapest = |role: Option<PlayerRole>| {
        players
            .iter()
            .filter(|p| match role {
                Some(r) => p.role == r,
                None => true,
            })
            .min_by_key(|p| p.base_price)
    };

    let preferred = category.unwrap_or(PlayerRole::Batsman);
    if ROLE_ORDER.contains(&preferred) {
        if let Some(p) = cheapest(Some(preferred)) {
            return Some(p);
        }
    }
    ROLE_ORDER
        .iter()
        .find_map(|role| cheapest(Some(*role)))
        .or_else(|| cheapest(None))
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Which request a reply belongs to.
#[derive(Debug)]
enum Request {
    Bid { amount: u64 },
    Start { name: String },
}

/// Wall-clock time derived from the tokio clock, so that paused-time tests
/// drive countdowns too.
struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    fn start() -> Self {
        Clock {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

struct Driver {
    handle: SessionHandle,
    view: AuctionView,
    notes: NotificationCenter,
    clock: Clock,
    auto_start: bool,
    state_dir: Option<PathBuf>,
    join_timeout: Duration,
    join_deadline: Option<Instant>,
    settle_at: Option<(Instant, u64)>,
    auto_start_at: Option<Instant>,
    /// Local timers run until the auction ends.
    ticking: bool,
    countdown: CountdownDisplay,
    connection: ConnectionState,
    fatal_reported: bool,
    reply_tx: mpsc::UnboundedSender<(Request, Reply)>,
}

async fn next_event(sub: &mut Option<Subscription>) -> Option<crate::wire::ServerEvent> {
    match sub {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_status(rx: &mut Option<watch::Receiver<ConnectionState>>) -> Option<ConnectionState> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

/// Run the synchronizer until the user quits or the UI goes away, then
/// leave the channel and close the session.
pub async fn run(
    session: Session,
    config: SyncConfig,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
) -> anyhow::Result<()> {
    info!("Synchronizer started for event {}", config.event_id);

    let handle = session.handle();
    let mut sub = Some(handle.listen(&EventKind::STATE));
    let mut status_rx = Some(handle.watch_status());
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

    let mut view = AuctionView::new(config.event_id.clone(), config.viewer.clone(), config.view);
    if let Some(balance) = config.initial_balance {
        view.seed_balance(balance);
    }

    let mut driver = Driver {
        handle: handle.clone(),
        view,
        notes: NotificationCenter::new(&config.notifications),
        clock: Clock::start(),
        auto_start: config.auto_start,
        state_dir: config.state_dir.clone(),
        join_timeout: config.join_timeout,
        join_deadline: None,
        settle_at: None,
        auto_start_at: None,
        ticking: true,
        countdown: CountdownDisplay::Waiting,
        connection: handle.status(),
        fatal_reported: false,
        reply_tx,
    };

    driver.join();
    driver.publish(&ui_tx).await?;

    let mut tick = tokio::time::interval(TICK_INTERVAL);
    tick.tick().await;

    loop {
        let settle_deadline = driver.settle_at.map(|(at, _)| at);
        tokio::select! {
            event = next_event(&mut sub) => {
                match event {
                    Some(event) => {
                        let now = driver.clock.now();
                        let effects = driver.view.apply(event, now);
                        driver.perform(effects);
                    }
                    None => {
                        warn!("Event subscription closed");
                        sub = None;
                    }
                }
            }

            status = next_status(&mut status_rx) => {
                match status {
                    Some(state) => {
                        driver.on_status(state);
                        let status = ConnectionStatus::from(&driver.connection);
                        if ui_tx.send(UiUpdate::ConnectionStatus(status)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        info!("Session status channel closed");
                        status_rx = None;
                    }
                }
            }

            Some((request, reply)) = reply_rx.recv() => {
                driver.on_reply(request, reply);
            }

            _ = tick.tick(), if driver.ticking => {
                driver.on_tick();
            }

            _ = sleep_until(settle_deadline) => {
                if let Some((_, generation)) = driver.settle_at.take() {
                    let effects = driver.view.settle(generation);
                    driver.perform(effects);
                }
            }

            _ = sleep_until(driver.auto_start_at) => {
                driver.auto_start_at = None;
                driver.auto_start_next();
            }

            _ = sleep_until(driver.join_deadline) => {
                driver.join_deadline = None;
                if driver.view.phase == Phase::Loading {
                    warn!("No join acknowledgement within {:?}", driver.join_timeout);
                    driver.view.join_error = Some(JOIN_TIMEOUT_TEXT.to_string());
                    driver.notify(NotificationKind::Error, JOIN_TIMEOUT_TEXT);
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => driver.on_command(cmd),
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }

        if driver.publish(&ui_tx).await.is_err() {
            info!("UI channel closed, shutting down");
            break;
        }
    }

    // Teardown: drop the listener, leave the room, close the socket.
    drop(sub);
    handle.leave_channel(&config.event_id);
    session.close().await;
    info!("Synchronizer stopped");
    Ok(())
}

impl Driver {
    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        let now = self.clock.now();
        self.notes.push(kind, message, now);
    }

    fn save_auto_start(&self) {
        let Some(dir) = &self.state_dir else {
            return;
        };
        let state = UiState {
            auto_start: Some(self.auto_start),
        };
        if let Err(e) = save_ui_state(dir, &state) {
            warn!("Could not save auto-start preference: {}", e);
        }
    }

    fn join(&mut self) {
        self.view.begin_join();
        self.handle.connect();
        self.handle.join_channel(&self.view.event_id);
        self.join_deadline = Instant::now().checked_add(self.join_timeout);
    }

    async fn publish(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) -> anyhow::Result<()> {
        let now = self.clock.now();
        self.notes.expire(now);
        let snapshot = ViewSnapshot::build(&self.view, self.countdown.clone(), self.auto_start, now);
        ui_tx.send(UiUpdate::Snapshot(Box::new(snapshot))).await?;
        ui_tx
            .send(UiUpdate::Notifications(self.notes.items().to_vec()))
            .await?;
        Ok(())
    }

    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Notify(kind, message) => self.notify(kind, message),
                Effect::ScheduleSettle { generation, delay } => {
                    self.settle_at = Instant::now().checked_add(delay).map(|at| (at, generation));
                }
                Effect::StopTimers => {
                    debug!("Stopping local timers");
                    self.ticking = false;
                    self.settle_at = None;
                    self.auto_start_at = None;
                    self.join_deadline = None;
                    self.countdown = CountdownDisplay::Started;
                }
                Effect::ReadyForNextPlayer { delay } => {
                    if self.auto_start && self.view.viewer.is_admin() {
                        self.auto_start_at = Instant::now().checked_add(delay);
                    }
                }
            }
        }
    }

    fn on_status(&mut self, state: ConnectionState) {
        debug!("Connection state: {}", state.label());
        match &state {
            ConnectionState::Connected => self.fatal_reported = false,
            ConnectionState::Failed { reason } => {
                if !self.fatal_reported {
                    warn!("Connection failed for good: {reason}");
                    self.fatal_reported = true;
                    self.notify(NotificationKind::Error, FATAL_CONNECT_TEXT);
                }
            }
            _ => {}
        }
        self.connection = state;
    }

    fn on_tick(&mut self) {
        let now = self.clock.now();
        let (start_date, status) = match &self.view.event {
            Some(event) => (event.start_date.as_deref(), event.status),
            None => (None, Default::default()),
        };
        let was_started = self.countdown.is_started();
        self.countdown = countdown::pre_start(start_date, status, now);

        // Countdown hitting zero is the one place the clock drives the
        // connection: make sure we are in the room.
        let idle = matches!(
            self.connection,
            ConnectionState::Disconnected | ConnectionState::Failed { .. }
        );
        if self.countdown.is_started() && !was_started && idle {
            info!("Auction start reached while disconnected, rejoining");
            self.join();
        }
    }

    fn on_command(&mut self, cmd: UserCommand) {
        match cmd {
            UserCommand::PlaceBid { amount } => self.place_bid(amount),
            UserCommand::StartPlayer(player_id) => self.start_player(&player_id),
            UserCommand::StartRandomPlayer => {
                let choice = self.view.available.choose(&mut rand::thread_rng()).map(|p| p.id.clone());
                match choice {
                    Some(id) => self.start_player(&id),
                    None => self.notify(NotificationKind::Error, "No player available to start auction"),
                }
            }
            UserCommand::Rejoin => {
                info!("Rejoining event {}", self.view.event_id);
                self.join();
            }
            UserCommand::ToggleAutoStart => {
                self.auto_start = !self.auto_start;
                self.save_auto_start();
                if self.auto_start {
                    self.notify(
                        NotificationKind::Success,
                        "Auto-start enabled. Next player will start automatically.",
                    );
                } else {
                    self.auto_start_at = None;
                    self.notify(
                        NotificationKind::Info,
                        "Auto-start disabled. You will need to manually start each player.",
                    );
                }
            }
            UserCommand::DismissNotification(id) => {
                self.notes.dismiss(id);
            }
            UserCommand::Quit => {}
        }
    }

    fn place_bid(&mut self, amount: u64) {
        let target = match (&self.view.current, self.view.phase) {
            (Some(current), Phase::Active) => Some((current.player.id.clone(), current.next_bid_amount)),
            _ => None,
        };
        let Some((player_id, next)) = target else {
            self.notify(NotificationKind::Error, "No player is currently on auction");
            return;
        };
        if amount == 0 {
            self.notify(NotificationKind::Error, "Please enter a valid bid amount");
            return;
        }
        if amount < next {
            self.notify(
                NotificationKind::Error,
                format!("Minimum bid is ₹{}", format_amount(next)),
            );
            return;
        }

        info!("Placing bid of {amount} on {player_id}");
        let pending = self.handle.submit_bid(&self.view.event_id, &player_id, amount);
        self.forward(Request::Bid { amount }, pending);
    }

    fn start_player(&mut self, player_id: &str) {
        let name = self
            .view
            .available
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "selected player".to_string());
        info!("Starting auction for {name} ({player_id})");
        let pending = self.handle.start_player(&self.view.event_id, player_id);
        self.forward(Request::Start { name }, pending);
    }

    fn auto_start_next(&mut self) {
        if !self.auto_start || !self.view.viewer.is_admin() || self.view.phase != Phase::Idle {
            return;
        }
        let category = self.view.event.as_ref().and_then(|e| e.current_category);
        let next = pick_next_player(&self.view.available, category).map(|p| p.id.clone());
        if let Some(id) = next {
            self.start_player(&id);
        }
    }

    fn forward(&self, request: Request, pending: PendingReply) {
        let tx = self.reply_tx.clone();
        tokio::spawn(async move {
            let reply = pending.wait().await;
            let _ = tx.send((request, reply));
        });
    }

    fn on_reply(&mut self, request: Request, reply: Reply) {
        match (request, reply) {
            (Request::Bid { amount }, Ok(resp)) if resp.success => self.notify(
                NotificationKind::Success,
                format!("Bid of ₹{} placed successfully!", format_amount(amount)),
            ),
            (Request::Start { name }, Ok(resp)) if resp.success => self.notify(
                NotificationKind::Success,
                format!("Player auction started for {name}!"),
            ),
            (Request::Bid { .. }, Ok(resp)) => {
                let message = resp.error.unwrap_or_else(|| "Failed to place bid".to_string());
                self.notify(NotificationKind::Error, message);
            }
            (Request::Start { .. }, Ok(resp)) => {
                let message = resp
                    .error
                    .unwrap_or_else(|| "Failed to start player auction".to_string());
                self.notify(NotificationKind::Error, message);
            }
            (Request::Bid { .. }, Err(e)) => {
                warn!("Bid failed: {e}");
                self.notify(NotificationKind::Error, "Failed to place bid");
            }
            (Request::Start { .. }, Err(e)) => {
                warn!("Start player failed: {e}");
                self.notify(NotificationKind::Error, "Failed to start player auction");
            }
        }
    }
}
