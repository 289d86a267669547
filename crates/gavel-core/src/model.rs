// Domain records shared by the wire messages, the REST client and the view.
//
// Field names follow the backend's JSON (camelCase, Mongo-style `_id`).
// Everything the client does not strictly need is optional so that schema
// drift on the server degrades to missing data instead of dropped messages.

use serde::{Deserialize, Serialize};

/// Lifecycle of an auction event as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    #[default]
    Scheduled,
    Live,
    Paused,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl EventStatus {
    pub fn label(self) -> &'static str {
        match self {
            EventStatus::Draft => "Draft",
            EventStatus::Scheduled => "Scheduled",
            EventStatus::Live => "Live",
            EventStatus::Paused => "Paused",
            EventStatus::Completed => "Completed",
            EventStatus::Cancelled => "Cancelled",
            EventStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerRole {
    Batsman,
    Bowler,
    AllRounder,
    WicketKeeper,
    WicketKeeperBatsman,
    #[serde(other)]
    Other,
}

impl PlayerRole {
    pub fn label(self) -> &'static str {
        match self {
            PlayerRole::Batsman => "Batsman",
            PlayerRole::Bowler => "Bowler",
            PlayerRole::AllRounder => "All-rounder",
            PlayerRole::WicketKeeper => "Wicket-keeper",
            PlayerRole::WicketKeeperBatsman => "WK-Batsman",
            PlayerRole::Other => "Other",
        }
    }
}

/// Role of the logged-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Auctioneer,
    TeamOwner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerStatistics {
    pub matches: u32,
    pub runs: u32,
    pub wickets: u32,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    pub role: PlayerRole,
    #[serde(default)]
    pub base_price: u64,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub statistics: PlayerStatistics,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSettings {
    pub bid_increment: u64,
    /// Server-side bid timer in seconds. Informational only.
    pub bid_timer: u32,
    pub starting_budget: u64,
    pub auto_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EventStats {
    pub total_players: u32,
    pub players_sold: u32,
    pub players_unsold: u32,
    pub total_amount_spent: u64,
}

/// Field-wise patch applied by an `event:update` delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub bid_increment: Option<u64>,
    pub bid_timer: Option<u32>,
    pub starting_budget: Option<u64>,
    pub auto_mode: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsPatch {
    pub total_players: Option<u32>,
    pub players_sold: Option<u32>,
    pub players_unsold: Option<u32>,
    pub total_amount_spent: Option<u64>,
}

/// Snapshot of an auction event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Kept as the raw string so an unparseable date can be reported by the
    /// countdown instead of failing the whole snapshot.
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub settings: EventSettings,
    #[serde(default)]
    pub stats: EventStats,
    #[serde(default)]
    pub current_category: Option<PlayerRole>,
}

impl AuctionEvent {
    /// Merge an `event:update` delta into this snapshot.
    pub fn merge(
        &mut self,
        settings: Option<&SettingsPatch>,
        stats: Option<&StatsPatch>,
        status: Option<EventStatus>,
    ) {
        if let Some(s) = settings {
            if let Some(v) = s.bid_increment {
                self.settings.bid_increment = v;
            }
            if let Some(v) = s.bid_timer {
                self.settings.bid_timer = v;
            }
            if let Some(v) = s.starting_budget {
                self.settings.starting_budget = v;
            }
            if let Some(v) = s.auto_mode {
                self.settings.auto_mode = v;
            }
        }
        if let Some(s) = stats {
            if let Some(v) = s.total_players {
                self.stats.total_players = v;
            }
            if let Some(v) = s.players_sold {
                self.stats.players_sold = v;
            }
            if let Some(v) = s.players_unsold {
                self.stats.players_unsold = v;
            }
            if let Some(v) = s.total_amount_spent {
                self.stats.total_amount_spent = v;
            }
        }
        if let Some(status) = status {
            self.status = status;
        }
    }
}

/// Reference to a team as embedded in bid and outcome payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

/// Full team record from the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub spent: Option<i64>,
    #[serde(default)]
    pub remaining_budget: Option<i64>,
}

/// An id that the backend sometimes sends bare and sometimes populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdRef {
    Id(String),
    Populated {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl IdRef {
    pub fn id(&self) -> &str {
        match self {
            IdRef::Id(id) => id,
            IdRef::Populated { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<IdRef>,
    #[serde(default)]
    pub team: Option<Team>,
}

/// Who is watching the auction. Decides which pushes apply to this client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Viewer {
    pub user_id: Option<String>,
    pub team_id: Option<String>,
    pub role: Option<Role>,
}

impl Viewer {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    pub fn is_team_owner(&self) -> bool {
        self.role == Some(Role::TeamOwner)
    }

    /// True when the given bidder/team identifies this viewer.
    pub fn owns_bid(&self, bidder_id: Option<&str>, team_id: Option<&str>) -> bool {
        let by_user = matches!((bidder_id, self.user_id.as_deref()), (Some(a), Some(b)) if a == b);
        let by_team = matches!((team_id, self.team_id.as_deref()), (Some(a), Some(b)) if a == b);
        by_user || by_team
    }
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        let team_id = user
            .team_id
            .as_ref()
            .map(|r| r.id().to_string())
            .or_else(|| user.team.as_ref().map(|t| t.id.clone()));
        Viewer {
            user_id: Some(user.id.clone()),
            team_id,
            role: Some(user.role),
        }
    }
}

/// Format a rupee amount with thousands separators (`125000` -> `125,000`).
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_deserializes_with_sparse_fields() {
        let json = r#"{"_id":"p1","name":"Virat","role":"batsman","basePrice":2000}"#;
        let p: Player = serde_json::from_str(json).unwrap();
        assert_eq!(p.id, "p1");
        assert_eq!(p.role, PlayerRole::Batsman);
        assert_eq!(p.base_price, 2000);
        assert_eq!(p.statistics, PlayerStatistics::default());
    }

    #[test]
    fn player_role_kebab_case_and_unknown() {
        let r: PlayerRole = serde_json::from_str("\"wicket-keeper-batsman\"").unwrap();
        assert_eq!(r, PlayerRole::WicketKeeperBatsman);
        let r: PlayerRole = serde_json::from_str("\"all-rounder\"").unwrap();
        assert_eq!(r, PlayerRole::AllRounder);
        let r: PlayerRole = serde_json::from_str("\"coach\"").unwrap();
        assert_eq!(r, PlayerRole::Other);
    }

    #[test]
    fn event_merge_is_field_wise() {
        let mut event: AuctionEvent = serde_json::from_str(
            r#"{"_id":"e1","name":"IPL","status":"scheduled",
                "settings":{"bidIncrement":50,"bidTimer":20,"startingBudget":10000},
                "stats":{"totalPlayers":10,"playersSold":2}}"#,
        )
        .unwrap();

        let settings = SettingsPatch {
            bid_increment: Some(100),
            ..Default::default()
        };
        let stats = StatsPatch {
            players_sold: Some(3),
            ..Default::default()
        };
        event.merge(Some(&settings), Some(&stats), Some(EventStatus::Live));

        assert_eq!(event.settings.bid_increment, 100);
        assert_eq!(event.settings.bid_timer, 20);
        assert_eq!(event.settings.starting_budget, 10000);
        assert_eq!(event.stats.players_sold, 3);
        assert_eq!(event.stats.total_players, 10);
        assert_eq!(event.status, EventStatus::Live);
    }

    #[test]
    fn user_team_id_bare_or_populated() {
        let bare: User =
            serde_json::from_str(r#"{"_id":"u1","role":"team_owner","teamId":"t1"}"#).unwrap();
        assert_eq!(Viewer::from(&bare).team_id.as_deref(), Some("t1"));

        let populated: User = serde_json::from_str(
            r#"{"_id":"u1","role":"team_owner","teamId":{"_id":"t2","name":"Kings"}}"#,
        )
        .unwrap();
        assert_eq!(Viewer::from(&populated).team_id.as_deref(), Some("t2"));

        let via_team: User = serde_json::from_str(
            r#"{"_id":"u1","role":"team_owner","team":{"_id":"t3","name":"Riders","budget":100}}"#,
        )
        .unwrap();
        assert_eq!(Viewer::from(&via_team).team_id.as_deref(), Some("t3"));
    }

    #[test]
    fn viewer_owns_bid_by_user_or_team() {
        let viewer = Viewer {
            user_id: Some("u1".into()),
            team_id: Some("t1".into()),
            role: Some(Role::TeamOwner),
        };
        assert!(viewer.owns_bid(Some("u1"), None));
        assert!(viewer.owns_bid(None, Some("t1")));
        assert!(!viewer.owns_bid(Some("u2"), Some("t2")));
        assert!(!Viewer::default().owns_bid(Some("u1"), Some("t1")));
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(950), "950");
        assert_eq!(format_amount(1500), "1,500");
        assert_eq!(format_amount(125000), "125,000");
        assert_eq!(format_amount(1234567), "1,234,567");
    }
}
