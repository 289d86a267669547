// Event-to-state reducer for one auction view.
//
// `AuctionView::apply` folds each server push into local state and returns
// the side effects (notifications, settle scheduling, ...) for the driver to
// perform. Time is passed in, never read, so every transition can be
// replayed in tests.
//
// Phases:
//
//   Loading --joined(ok)--> Idle | Active        (any non-terminal phase)
//   Loading --joined(err)-> JoinFailed --rejoin--> Loading
//   Idle --player-changed--> Active --bid--> Active
//   Active --sold/unsold--> Settling --settle(gen)--> Idle
//   * --auction-ended--> Ended                   (terminal)

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::countdown::PlayerTimer;
use crate::model::{format_amount, AuctionEvent, EventStatus, Player, Team, TeamRef, Viewer};
use crate::notify::NotificationKind;
use crate::wire::messages::{
    AuctionEnded, AuctionJoined, BidReceived, CurrentBid, PlayerChanged, PlayerSold, PlayerUnsold,
};
use crate::wire::ServerEvent;

/// Wait after a settle before auto-starting the next player.
pub const AUTO_START_AFTER_SETTLE: Duration = Duration::from_millis(1_000);
/// Wait after a fresh player list arrives while idle.
pub const AUTO_START_AFTER_LIST: Duration = Duration::from_millis(500);

const JOIN_FAILED_TEXT: &str =
    "Failed to join auction. The event may not exist or you may not have access.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    JoinFailed,
    Idle,
    Active,
    Settling,
    Ended,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Loading => "Loading",
            Phase::JoinFailed => "Join failed",
            Phase::Idle => "Waiting for next player",
            Phase::Active => "Bidding",
            Phase::Settling => "Settling",
            Phase::Ended => "Ended",
        }
    }
}

/// Team balance. Only a server push is authoritative; a value projected
/// from the team record is shown until one arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamBalance {
    pub amount: u64,
    pub authoritative: bool,
}

impl TeamBalance {
    pub fn pushed(raw: i64) -> Self {
        TeamBalance {
            amount: raw.max(0) as u64,
            authoritative: true,
        }
    }

    /// `remainingBudget`, else `budget - spent`, clamped at zero.
    pub fn projected(team: &Team) -> Option<Self> {
        let raw = match (team.remaining_budget, team.budget, team.spent) {
            (Some(remaining), _, _) => remaining,
            (None, Some(budget), spent) => budget - spent.unwrap_or(0),
            (None, None, _) => return None,
        };
        Some(TeamBalance {
            amount: raw.max(0) as u64,
            authoritative: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPlayerState {
    pub player: Player,
    pub current_bid_amount: u64,
    pub next_bid_amount: u64,
    pub winning_team: Option<TeamRef>,
    pub winning_bidder: Option<String>,
    pub timer: PlayerTimer,
}

/// Result shown while settling.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sold(Box<PlayerSold>),
    Unsold(Box<PlayerUnsold>),
}

impl Outcome {
    pub fn player(&self) -> &Player {
        match self {
            Outcome::Sold(s) => &s.player,
            Outcome::Unsold(u) => &u.player,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(NotificationKind, String),
    /// Call `settle(generation)` after `delay`.
    ScheduleSettle { generation: u64, delay: Duration },
    /// The auction is over: stop every local timer.
    StopTimers,
    /// The slot is free and players remain; an admin may start the next one.
    ReadyForNextPlayer { delay: Duration },
}

/// Local presentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSettings {
    pub player_timer: Duration,
    pub settle_delay: Duration,
    pub default_bid_increment: u64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        ViewSettings {
            player_timer: Duration::from_secs(20),
            settle_delay: Duration::from_millis(5_500),
            default_bid_increment: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// AuctionView
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuctionView {
    pub event_id: String,
    pub phase: Phase,
    pub event: Option<AuctionEvent>,
    pub current: Option<CurrentPlayerState>,
    pub outcome: Option<Outcome>,
    pub available: Vec<Player>,
    pub balance: Option<TeamBalance>,
    pub ended: Option<AuctionEnded>,
    pub join_error: Option<String>,
    pub viewer: Viewer,
    settings: ViewSettings,
    /// Bumped on every change of the current-player slot; a settle carrying
    /// an older generation is stale.
    generation: u64,
}

impl AuctionView {
    pub fn new(event_id: impl Into<String>, viewer: Viewer, settings: ViewSettings) -> Self {
        AuctionView {
            event_id: event_id.into(),
            phase: Phase::Loading,
            event: None,
            current: None,
            outcome: None,
            available: Vec::new(),
            balance: None,
            ended: None,
            join_error: None,
            viewer,
            settings,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bid_increment(&self) -> u64 {
        self.event
            .as_ref()
            .map(|e| e.settings.bid_increment)
            .filter(|inc| *inc > 0)
            .unwrap_or(self.settings.default_bid_increment)
    }

    pub fn next_bid_amount(&self) -> Option<u64> {
        self.current.as_ref().map(|c| c.next_bid_amount)
    }

    /// Seconds left on the per-player timer, if a player is up.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        match self.phase {
            Phase::Active => self.current.as_ref().map(|c| c.timer.remaining_secs(now)),
            _ => None,
        }
    }

    /// True when this viewer's team holds the highest bid.
    pub fn is_winning(&self) -> bool {
        if !self.viewer.is_team_owner() {
            return false;
        }
        self.current.as_ref().is_some_and(|c| {
            self.viewer.owns_bid(
                c.winning_bidder.as_deref(),
                c.winning_team.as_ref().map(|t| t.id.as_str()),
            )
        })
    }

    /// Seed a non-authoritative balance (e.g. from the REST team record).
    pub fn seed_balance(&mut self, balance: TeamBalance) {
        if !matches!(self.balance, Some(b) if b.authoritative) {
            self.balance = Some(balance);
        }
    }

    /// Prepare for a (re)join. No-op once the auction has ended.
    pub fn begin_join(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        if self.phase == Phase::JoinFailed {
            self.phase = Phase::Loading;
        }
        self.join_error = None;
    }

    pub fn apply(&mut self, event: ServerEvent, now: DateTime<Utc>) -> Vec<Effect> {
        if self.phase == Phase::Ended {
            debug!("Auction ended, ignoring {}", event.kind().wire_name());
            return vec![];
        }
        if self.phase == Phase::JoinFailed && !matches!(event, ServerEvent::AuctionJoined(_)) {
            debug!("Join failed, ignoring {}", event.kind().wire_name());
            return vec![];
        }

        match event {
            ServerEvent::AuctionJoined(joined) => self.on_joined(*joined, now),
            ServerEvent::BidReceived(bid) => self.on_bid(bid, now),
            ServerEvent::PlayerChanged(changed) => self.on_player_changed(*changed, now),
            ServerEvent::PlayerSold(sold) => {
                let id = sold.player.id.clone();
                self.on_outcome(&id, Outcome::Sold(sold))
            }
            ServerEvent::PlayerUnsold(unsold) => {
                let id = unsold.player.id.clone();
                self.on_outcome(&id, Outcome::Unsold(unsold))
            }
            ServerEvent::TeamBalance(update) => match update.team_balance {
                Some(raw) => self.on_balance(raw),
                None => vec![],
            },
            ServerEvent::AvailablePlayers(update) => {
                let Some(players) = update.players else {
                    return vec![];
                };
                self.available = players;
                if self.phase == Phase::Idle && !self.available.is_empty() {
                    vec![Effect::ReadyForNextPlayer {
                        delay: AUTO_START_AFTER_LIST,
                    }]
                } else {
                    vec![]
                }
            }
            ServerEvent::EventUpdate(update) => {
                match self.event.as_mut() {
                    Some(event) => {
                        event.merge(update.settings.as_ref(), update.stats.as_ref(), update.status)
                    }
                    None => debug!("event:update before snapshot, ignored"),
                }
                vec![]
            }
            ServerEvent::AuctionEnded(ended) => {
                info!("Auction ended");
                self.phase = Phase::Ended;
                self.generation += 1;
                if let Some(event) = self.event.as_mut() {
                    event.status = EventStatus::Completed;
                }
                self.ended = Some(ended);
                vec![Effect::StopTimers]
            }
            ServerEvent::BidResponse(_) | ServerEvent::StartPlayerResponse(_) => vec![],
        }
    }

    /// The display window after an outcome elapsed.
    pub fn settle(&mut self, generation: u64) -> Vec<Effect> {
        if self.phase != Phase::Settling || generation != self.generation {
            debug!("Stale settle (generation {generation}, current {})", self.generation);
            return vec![];
        }
        self.clear_slot();
        self.phase = Phase::Idle;
        if self.available.is_empty() {
            vec![]
        } else {
            vec![Effect::ReadyForNextPlayer {
                delay: AUTO_START_AFTER_SETTLE,
            }]
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn on_joined(&mut self, joined: AuctionJoined, now: DateTime<Utc>) -> Vec<Effect> {
        self.generation += 1;
        self.outcome = None;

        if !joined.success {
            let message = joined.error.unwrap_or_else(|| JOIN_FAILED_TEXT.to_string());
            warn!("Failed to join auction: {message}");
            self.phase = Phase::JoinFailed;
            self.current = None;
            self.join_error = Some(message.clone());
            return vec![Effect::Notify(NotificationKind::Error, message)];
        }

        info!("Joined auction {}", self.event_id);
        if joined.event.is_some() {
            self.event = joined.event;
        }
        self.available = joined.available_players.unwrap_or_default();
        if let Some(raw) = joined.team_balance {
            if self.viewer.is_team_owner() {
                self.balance = Some(TeamBalance::pushed(raw));
            }
        }
        self.join_error = None;

        let increment = self.bid_increment();
        self.current = joined.current_player.map(|cp| {
            let amount = cp.current_bid_amount.filter(|a| *a > 0).unwrap_or(cp.player.base_price);
            let (winning_team, winning_bidder) = winner_from(cp.current_bid.as_ref());
            CurrentPlayerState {
                timer: PlayerTimer::anchored(self.settings.player_timer, cp.start_time.as_deref(), now),
                player: cp.player,
                current_bid_amount: amount,
                next_bid_amount: amount.saturating_add(increment),
                winning_team,
                winning_bidder,
            }
        });
        self.phase = if self.current.is_some() {
            Phase::Active
        } else {
            Phase::Idle
        };
        vec![]
    }

    fn on_bid(&mut self, bid: BidReceived, now: DateTime<Utc>) -> Vec<Effect> {
        let increment = self.bid_increment();
        let player_timer = self.settings.player_timer;
        let active = self.phase == Phase::Active;
        let Some(current) = self.current.as_mut().filter(|_| active) else {
            debug!("Bid for {} with no active player, ignored", bid.player_id);
            return vec![];
        };
        if current.player.id != bid.player_id {
            warn!(
                "Stale bid for {} (active player is {})",
                bid.player_id, current.player.id
            );
            return vec![];
        }

        current.current_bid_amount = bid.amount;
        current.next_bid_amount = bid.amount.saturating_add(increment);
        current.winning_team = Some(TeamRef {
            id: bid.team_id.clone().unwrap_or_default(),
            name: bid.team_name.clone(),
            short_name: bid.team_short_name.clone(),
        });
        current.winning_bidder = bid.bidder_id.clone();
        if bid.timer_reset {
            current.timer = PlayerTimer {
                duration: player_timer,
                start: now,
                provisional: false,
            };
        }

        let mine = matches!(
            (bid.bidder_id.as_deref(), self.viewer.user_id.as_deref()),
            (Some(a), Some(b)) if a == b
        );
        if mine {
            vec![]
        } else {
            vec![Effect::Notify(
                NotificationKind::Info,
                format!("{} placed a bid of ₹{}", bid.team_name, format_amount(bid.amount)),
            )]
        }
    }

    fn on_player_changed(&mut self, changed: PlayerChanged, now: DateTime<Utc>) -> Vec<Effect> {
        let Some(player) = changed.player else {
            debug!("No player on the block");
            self.generation += 1;
            self.clear_slot();
            if self.phase != Phase::Loading {
                self.phase = Phase::Idle;
            }
            return vec![];
        };

        let increment = self.bid_increment();
        let amount = changed
            .current_bid_amount
            .filter(|a| *a > 0)
            .unwrap_or(player.base_price);
        let (winning_team, winning_bidder) = winner_from(changed.current_bid.as_ref());
        let timer = PlayerTimer::anchored(self.settings.player_timer, changed.start_time.as_deref(), now);
        let message = format!("New player on auction: {}", player.name);

        self.generation += 1;
        self.outcome = None;
        self.current = Some(CurrentPlayerState {
            player,
            current_bid_amount: amount,
            next_bid_amount: amount.saturating_add(increment),
            winning_team,
            winning_bidder,
            timer,
        });
        self.phase = Phase::Active;
        vec![Effect::Notify(NotificationKind::Info, message)]
    }

    fn on_outcome(&mut self, player_id: &str, outcome: Outcome) -> Vec<Effect> {
        let active = self.phase == Phase::Active
            && self.current.as_ref().is_some_and(|c| c.player.id == player_id);
        if !active {
            warn!("Stale outcome for {player_id}, ignored");
            return vec![];
        }
        self.generation += 1;
        self.outcome = Some(outcome);
        self.phase = Phase::Settling;
        vec![Effect::ScheduleSettle {
            generation: self.generation,
            delay: self.settings.settle_delay,
        }]
    }

    fn on_balance(&mut self, raw: i64) -> Vec<Effect> {
        if !self.viewer.is_team_owner() {
            return vec![];
        }
        let new = TeamBalance::pushed(raw);
        let old = self.balance.replace(new);
        match old {
            Some(old) if new.amount < old.amount => vec![Effect::Notify(
                NotificationKind::Success,
                format!(
                    "Player purchased! Balance updated: ₹{} → ₹{} (Spent: ₹{})",
                    format_amount(old.amount),
                    format_amount(new.amount),
                    format_amount(old.amount - new.amount)
                ),
            )],
            Some(_) => vec![],
            None => {
                debug!("Team balance loaded: {}", new.amount);
                vec![]
            }
        }
    }

    fn clear_slot(&mut self) {
        self.current = None;
        self.outcome = None;
    }
}

fn winner_from(bid: Option<&CurrentBid>) -> (Option<TeamRef>, Option<String>) {
    let Some(bid) = bid else {
        return (None, None);
    };
    let team = bid.team_id.as_ref().map(|id| TeamRef {
        id: id.clone(),
        name: bid.team_name.clone().unwrap_or_default(),
        short_name: None,
    });
    (team, bid.bidder_id.clone())
}
