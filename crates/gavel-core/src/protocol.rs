// Messages between the synchronizer task and the UI.
//
// The synchronizer owns all state; the UI only ever sees immutable
// snapshots and sends `UserCommand`s back.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::countdown::CountdownDisplay;
use crate::model::{AuctionEvent, Player};
use crate::notify::Notification;
use crate::reducer::{AuctionView, Outcome, Phase, TeamBalance};
use crate::session::ConnectionState;
use crate::wire::messages::AuctionEnded;

// ---------------------------------------------------------------------------
// Sync -> UI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    Failed,
}

impl From<&ConnectionState> for ConnectionStatus {
    fn from(state: &ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting { .. } => ConnectionStatus::Connecting,
            ConnectionState::Connected => ConnectionStatus::Connected,
            ConnectionState::Backoff { attempt, delay } => ConnectionStatus::Reconnecting {
                attempt: *attempt,
                delay: *delay,
            },
            ConnectionState::Failed { .. } => ConnectionStatus::Failed,
        }
    }
}

/// The player on the block, flattened for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPlayerView {
    pub player: Player,
    pub current_bid: u64,
    pub next_bid: u64,
    pub winning_team: Option<String>,
    pub remaining_secs: u64,
    pub timer_secs: u64,
    /// The timer is anchored at local receipt time, not a server timestamp.
    pub provisional: bool,
    /// This viewer's team holds the highest bid.
    pub is_winning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub event_id: String,
    pub phase: Phase,
    pub event: Option<AuctionEvent>,
    pub countdown: CountdownDisplay,
    pub current: Option<CurrentPlayerView>,
    pub outcome: Option<Outcome>,
    pub available: Vec<Player>,
    pub balance: Option<TeamBalance>,
    pub ended: Option<AuctionEnded>,
    pub join_error: Option<String>,
    pub is_admin: bool,
    pub is_team_owner: bool,
    pub auto_start: bool,
}

impl ViewSnapshot {
    pub fn build(view: &AuctionView, countdown: CountdownDisplay, auto_start: bool, now: DateTime<Utc>) -> Self {
        let is_winning = view.is_winning();
        let current = match view.phase {
            Phase::Active | Phase::Settling => view.current.as_ref().map(|c| CurrentPlayerView {
                player: c.player.clone(),
                current_bid: c.current_bid_amount,
                next_bid: c.next_bid_amount,
                winning_team: c.winning_team.as_ref().map(|t| t.name.clone()),
                remaining_secs: view.remaining_secs(now).unwrap_or(0),
                timer_secs: c.timer.duration.as_secs(),
                provisional: c.timer.provisional,
                is_winning,
            }),
            _ => None,
        };

        ViewSnapshot {
            event_id: view.event_id.clone(),
            phase: view.phase,
            event: view.event.clone(),
            countdown,
            current,
            outcome: view.outcome.clone(),
            available: view.available.clone(),
            balance: view.balance,
            ended: view.ended.clone(),
            join_error: view.join_error.clone(),
            is_admin: view.viewer.is_admin(),
            is_team_owner: view.viewer.is_team_owner(),
            auto_start,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    ConnectionStatus(ConnectionStatus),
    Snapshot(Box<ViewSnapshot>),
    Notifications(Vec<Notification>),
}

// ---------------------------------------------------------------------------
// UI -> Sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Bid the next-bid amount the user was shown. A stale amount is
    /// rejected locally against the current state.
    PlaceBid { amount: u64 },
    StartPlayer(String),
    StartRandomPlayer,
    /// Retry joining after a failed or timed-out join.
    Rejoin,
    ToggleAutoStart,
    DismissNotification(u64),
    Quit,
}
