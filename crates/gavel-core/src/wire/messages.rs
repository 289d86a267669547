// Typed auction messages carried in Socket.IO events.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::packet::SocketPacket;
use super::WireError;
use crate::model::{AuctionEvent, EventStats, EventStatus, Player, SettingsPatch, StatsPatch, TeamRef};

// ---------------------------------------------------------------------------
// Server -> client payloads
// ---------------------------------------------------------------------------

/// Highest bid embedded in a current-player payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentBid {
    pub team_id: Option<String>,
    pub team_name: Option<String>,
    pub bidder_id: Option<String>,
    pub amount: Option<u64>,
}

/// Player under auction as replayed in the join snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlayerPayload {
    pub player: Player,
    #[serde(default)]
    pub current_bid_amount: Option<u64>,
    #[serde(default)]
    pub current_bid: Option<CurrentBid>,
    #[serde(default)]
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionJoined {
    pub success: bool,
    #[serde(default)]
    pub event: Option<AuctionEvent>,
    #[serde(default)]
    pub current_player: Option<CurrentPlayerPayload>,
    #[serde(default)]
    pub available_players: Option<Vec<Player>>,
    #[serde(default)]
    pub team_balance: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidReceived {
    pub player_id: String,
    pub amount: u64,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub team_short_name: Option<String>,
    #[serde(default)]
    pub bidder_id: Option<String>,
    #[serde(default)]
    pub timer_reset: bool,
}

/// `player:current`. A payload without a player means nobody is on the block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerChanged {
    pub player_id: Option<String>,
    pub player: Option<Player>,
    pub current_bid_amount: Option<u64>,
    pub current_bid: Option<CurrentBid>,
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSold {
    pub player: Player,
    #[serde(default)]
    pub team: Option<TeamRef>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    #[serde(default)]
    pub bid_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUnsold {
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamBalanceUpdate {
    #[serde(default)]
    pub team_balance: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailablePlayers {
    #[serde(default)]
    pub players: Option<Vec<Player>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EventUpdate {
    pub settings: Option<SettingsPatch>,
    pub stats: Option<StatsPatch>,
    pub status: Option<EventStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuctionEnded {
    pub message: Option<String>,
    pub stats: Option<EventStats>,
}

/// Reply to a `bid:submit` or `player:start` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// ServerEvent
// ---------------------------------------------------------------------------

/// Every event name the client listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AuctionJoined,
    BidReceived,
    PlayerChanged,
    PlayerSold,
    PlayerUnsold,
    TeamBalance,
    AvailablePlayers,
    EventUpdate,
    AuctionEnded,
    BidResponse,
    StartPlayerResponse,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::AuctionJoined,
        EventKind::BidReceived,
        EventKind::PlayerChanged,
        EventKind::PlayerSold,
        EventKind::PlayerUnsold,
        EventKind::TeamBalance,
        EventKind::AvailablePlayers,
        EventKind::EventUpdate,
        EventKind::AuctionEnded,
        EventKind::BidResponse,
        EventKind::StartPlayerResponse,
    ];

    /// Push events that drive the live view (everything but the one-shot
    /// command responses).
    pub const STATE: [EventKind; 9] = [
        EventKind::AuctionJoined,
        EventKind::BidReceived,
        EventKind::PlayerChanged,
        EventKind::PlayerSold,
        EventKind::PlayerUnsold,
        EventKind::TeamBalance,
        EventKind::AvailablePlayers,
        EventKind::EventUpdate,
        EventKind::AuctionEnded,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            EventKind::AuctionJoined => "auction:joined",
            EventKind::BidReceived => "bid:received",
            EventKind::PlayerChanged => "player:current",
            EventKind::PlayerSold => "player:sold",
            EventKind::PlayerUnsold => "player:unsold",
            EventKind::TeamBalance => "team:balance",
            EventKind::AvailablePlayers => "players:available",
            EventKind::EventUpdate => "event:update",
            EventKind::AuctionEnded => "auction:ended",
            EventKind::BidResponse => "bid:response",
            EventKind::StartPlayerResponse => "player:start:response",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|k| k.wire_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    AuctionJoined(Box<AuctionJoined>),
    BidReceived(BidReceived),
    PlayerChanged(Box<PlayerChanged>),
    PlayerSold(Box<PlayerSold>),
    PlayerUnsold(Box<PlayerUnsold>),
    TeamBalance(TeamBalanceUpdate),
    AvailablePlayers(AvailablePlayers),
    EventUpdate(EventUpdate),
    AuctionEnded(AuctionEnded),
    BidResponse(CommandResponse),
    StartPlayerResponse(CommandResponse),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::AuctionJoined(_) => EventKind::AuctionJoined,
            ServerEvent::BidReceived(_) => EventKind::BidReceived,
            ServerEvent::PlayerChanged(_) => EventKind::PlayerChanged,
            ServerEvent::PlayerSold(_) => EventKind::PlayerSold,
            ServerEvent::PlayerUnsold(_) => EventKind::PlayerUnsold,
            ServerEvent::TeamBalance(_) => EventKind::TeamBalance,
            ServerEvent::AvailablePlayers(_) => EventKind::AvailablePlayers,
            ServerEvent::EventUpdate(_) => EventKind::EventUpdate,
            ServerEvent::AuctionEnded(_) => EventKind::AuctionEnded,
            ServerEvent::BidResponse(_) => EventKind::BidResponse,
            ServerEvent::StartPlayerResponse(_) => EventKind::StartPlayerResponse,
        }
    }

    /// Build a typed event from a Socket.IO event name and its payload.
    pub fn from_wire(name: &str, data: Value) -> Result<Self, WireError> {
        let kind = EventKind::from_wire_name(name)
            .ok_or_else(|| WireError::UnknownEvent(name.to_string()))?;

        // `auction:ended` may arrive without a payload.
        let data = match (kind, data) {
            (EventKind::AuctionEnded, Value::Null) => json!({}),
            (_, data) => data,
        };

        let payload_err = |e: serde_json::Error| WireError::Payload {
            event: name.to_string(),
            message: e.to_string(),
        };

        let event = match kind {
            EventKind::AuctionJoined => {
                ServerEvent::AuctionJoined(Box::new(serde_json::from_value(data).map_err(payload_err)?))
            }
            EventKind::BidReceived => {
                ServerEvent::BidReceived(serde_json::from_value(data).map_err(payload_err)?)
            }
            EventKind::PlayerChanged => {
                ServerEvent::PlayerChanged(Box::new(serde_json::from_value(data).map_err(payload_err)?))
            }
            EventKind::PlayerSold => {
                ServerEvent::PlayerSold(Box::new(serde_json::from_value(data).map_err(payload_err)?))
            }
            EventKind::PlayerUnsold => {
                ServerEvent::PlayerUnsold(Box::new(serde_json::from_value(data).map_err(payload_err)?))
            }
            EventKind::TeamBalance => {
                ServerEvent::TeamBalance(serde_json::from_value(data).map_err(payload_err)?)
            }
            EventKind::AvailablePlayers => {
                ServerEvent::AvailablePlayers(serde_json::from_value(data).map_err(payload_err)?)
            }
            EventKind::EventUpdate => {
                ServerEvent::EventUpdate(serde_json::from_value(data).map_err(payload_err)?)
            }
            EventKind::AuctionEnded => {
                ServerEvent::AuctionEnded(serde_json::from_value(data).map_err(payload_err)?)
            }
            EventKind::BidResponse => {
                ServerEvent::BidResponse(serde_json::from_value(data).map_err(payload_err)?)
            }
            EventKind::StartPlayerResponse => {
                ServerEvent::StartPlayerResponse(serde_json::from_value(data).map_err(payload_err)?)
            }
        };
        Ok(event)
    }
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinAuction { event_id: String },
    LeaveAuction { event_id: String },
    SubmitBid { event_id: String, player_id: String, amount: u64 },
    StartPlayer { event_id: String, player_id: String },
}

impl ClientEvent {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ClientEvent::JoinAuction { .. } => "join:auction",
            ClientEvent::LeaveAuction { .. } => "leave:auction",
            ClientEvent::SubmitBid { .. } => "bid:submit",
            ClientEvent::StartPlayer { .. } => "player:start",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            ClientEvent::JoinAuction { event_id } | ClientEvent::LeaveAuction { event_id } => {
                json!({ "eventId": event_id })
            }
            ClientEvent::SubmitBid { event_id, player_id, amount } => {
                json!({ "eventId": event_id, "playerId": player_id, "amount": amount })
            }
            ClientEvent::StartPlayer { event_id, player_id } => {
                json!({ "eventId": event_id, "playerId": player_id })
            }
        }
    }

    /// The one-shot reply this request expects, if any.
    pub fn response_kind(&self) -> Option<EventKind> {
        match self {
            ClientEvent::SubmitBid { .. } => Some(EventKind::BidResponse),
            ClientEvent::StartPlayer { .. } => Some(EventKind::StartPlayerResponse),
            _ => None,
        }
    }

    /// Full WebSocket text frame for this event.
    pub fn to_frame(&self) -> String {
        SocketPacket::Event {
            name: self.wire_name().to_string(),
            data: self.payload(),
            ack_id: None,
        }
        .to_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_for_every_kind() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_wire_name(kind.wire_name()), Some(kind));
        }
        assert_eq!(EventKind::from_wire_name("chat:message"), None);
    }

    #[test]
    fn parses_join_ack_snapshot() {
        let data = json!({
            "success": true,
            "event": {"_id": "e1", "name": "Premier Auction", "status": "live",
                      "startDate": "2026-10-17T10:00:00Z",
                      "settings": {"bidIncrement": 100}},
            "currentPlayer": {
                "player": {"_id": "p1", "name": "Rohit", "role": "batsman", "basePrice": 1000},
                "currentBidAmount": 1500,
                "currentBid": {"teamId": "t1", "teamName": "Kings"},
                "startTime": "2026-10-17T10:05:00Z"
            },
            "availablePlayers": [],
            "teamBalance": 9000
        });
        let ServerEvent::AuctionJoined(joined) = ServerEvent::from_wire("auction:joined", data).unwrap()
        else {
            panic!("expected AuctionJoined");
        };
        assert!(joined.success);
        assert_eq!(joined.event.as_ref().unwrap().settings.bid_increment, 100);
        let current = joined.current_player.unwrap();
        assert_eq!(current.current_bid_amount, Some(1500));
        assert_eq!(current.current_bid.unwrap().team_name.as_deref(), Some("Kings"));
        assert_eq!(joined.team_balance, Some(9000));
    }

    #[test]
    fn parses_failed_join_ack() {
        let event =
            ServerEvent::from_wire("auction:joined", json!({"success": false, "error": "not found"}))
                .unwrap();
        let ServerEvent::AuctionJoined(joined) = event else {
            panic!("expected AuctionJoined");
        };
        assert!(!joined.success);
        assert_eq!(joined.error.as_deref(), Some("not found"));
    }

    #[test]
    fn parses_bid_with_timer_reset_default() {
        let event = ServerEvent::from_wire(
            "bid:received",
            json!({"playerId": "p1", "amount": 700, "teamId": "t2", "teamName": "Riders"}),
        )
        .unwrap();
        match event {
            ServerEvent::BidReceived(bid) => {
                assert_eq!(bid.amount, 700);
                assert!(!bid.timer_reset);
            }
            other => panic!("expected BidReceived, got {other:?}"),
        }
    }

    #[test]
    fn auction_ended_tolerates_missing_payload() {
        let event = ServerEvent::from_wire("auction:ended", Value::Null).unwrap();
        assert_eq!(event.kind(), EventKind::AuctionEnded);
    }

    #[test]
    fn unknown_event_and_bad_payload_are_errors() {
        assert!(matches!(
            ServerEvent::from_wire("chat:message", json!({})),
            Err(WireError::UnknownEvent(_))
        ));
        assert!(matches!(
            ServerEvent::from_wire("bid:received", json!({"amount": "lots"})),
            Err(WireError::Payload { .. })
        ));
    }

    #[test]
    fn client_events_encode_expected_frames() {
        let bid = ClientEvent::SubmitBid {
            event_id: "e1".into(),
            player_id: "p1".into(),
            amount: 550,
        };
        let frame = bid.to_frame();
        assert!(frame.starts_with(r#"42["bid:submit","#));
        let body: Value = serde_json::from_str(&frame[2..]).unwrap();
        assert_eq!(body[1], json!({"eventId": "e1", "playerId": "p1", "amount": 550}));
        assert_eq!(bid.response_kind(), Some(EventKind::BidResponse));

        let leave = ClientEvent::LeaveAuction { event_id: "e1".into() };
        assert_eq!(leave.to_frame(), r#"42["leave:auction",{"eventId":"e1"}]"#);
        assert_eq!(leave.response_kind(), None);
    }
}
