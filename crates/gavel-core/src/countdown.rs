// Local countdowns: time until the event starts, and the per-player bid
// timer. Both are derived from server timestamps on every tick and never
// accumulate local state, so they cannot drift from the server.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::model::EventStatus;

// ---------------------------------------------------------------------------
// Time breakdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBreakdown {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeBreakdown {
    pub fn from_secs(total: u64) -> Self {
        TimeBreakdown {
            days: total / 86_400,
            hours: (total % 86_400) / 3_600,
            minutes: (total % 3_600) / 60,
            seconds: total % 60,
        }
    }

    /// Labelled, zero-padded components. Leading zero components are
    /// omitted; seconds are always present.
    pub fn parts(&self) -> Vec<(&'static str, String)> {
        let mut parts = Vec::with_capacity(4);
        if self.days > 0 {
            parts.push(("Days", format!("{:02}", self.days)));
        }
        if self.days > 0 || self.hours > 0 {
            parts.push(("Hours", format!("{:02}", self.hours)));
        }
        if self.days > 0 || self.hours > 0 || self.minutes > 0 {
            parts.push(("Minutes", format!("{:02}", self.minutes)));
        }
        parts.push(("Seconds", format!("{:02}", self.seconds)));
        parts
    }

    /// `"1d 2h 3m 4s"`, `"3m 4s"`, `"4s"`.
    pub fn compact(&self) -> String {
        if self.days > 0 {
            format!("{}d {}h {}m {}s", self.days, self.hours, self.minutes, self.seconds)
        } else if self.hours > 0 {
            format!("{}h {}m {}s", self.hours, self.minutes, self.seconds)
        } else if self.minutes > 0 {
            format!("{}m {}s", self.minutes, self.seconds)
        } else {
            format!("{}s", self.seconds)
        }
    }
}

// ---------------------------------------------------------------------------
// Pre-start countdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownDisplay {
    /// No event or no start date yet.
    Waiting,
    /// The start date could not be parsed.
    Invalid,
    Counting(TimeBreakdown),
    Started,
}

impl CountdownDisplay {
    pub fn text(&self) -> String {
        match self {
            CountdownDisplay::Waiting => "Waiting for event data...".to_string(),
            CountdownDisplay::Invalid => "Invalid start date".to_string(),
            CountdownDisplay::Counting(b) => b.compact(),
            CountdownDisplay::Started => "Auction Started!".to_string(),
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, CountdownDisplay::Started)
    }

    /// Breakdown to display. Placeholders and the started state show zero.
    pub fn breakdown(&self) -> TimeBreakdown {
        match self {
            CountdownDisplay::Counting(b) => *b,
            _ => TimeBreakdown::default(),
        }
    }
}

/// Parse a server timestamp (RFC 3339, as produced by `Date.toISOString`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Countdown to the event start. A `live` status wins over the clock.
pub fn pre_start(start_date: Option<&str>, status: EventStatus, now: DateTime<Utc>) -> CountdownDisplay {
    if status == EventStatus::Live {
        return CountdownDisplay::Started;
    }
    let Some(raw) = start_date else {
        return CountdownDisplay::Waiting;
    };
    let Some(start) = parse_timestamp(raw) else {
        warn!("Invalid start date {raw:?}");
        return CountdownDisplay::Invalid;
    };

    let gap_ms = (start - now).num_milliseconds();
    if gap_ms <= 0 {
        return CountdownDisplay::Started;
    }
    CountdownDisplay::Counting(TimeBreakdown::from_secs(gap_ms as u64 / 1000))
}

// ---------------------------------------------------------------------------
// Per-player timer
// ---------------------------------------------------------------------------

/// Fixed-duration window anchored at the player's start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerTimer {
    pub duration: Duration,
    pub start: DateTime<Utc>,
    /// Anchored at local receipt time because the server sent no usable
    /// timestamp. Replaced as soon as one arrives.
    pub provisional: bool,
}

impl PlayerTimer {
    /// Anchor at a server timestamp, falling back to `now` (provisional)
    /// when it is missing or unparseable.
    pub fn anchored(duration: Duration, start_time: Option<&str>, now: DateTime<Utc>) -> Self {
        match start_time.and_then(parse_timestamp) {
            Some(start) => PlayerTimer {
                duration,
                start,
                provisional: false,
            },
            None => {
                if let Some(raw) = start_time {
                    warn!("Unparseable player start time {raw:?}, using receipt time");
                }
                PlayerTimer {
                    duration,
                    start: now,
                    provisional: true,
                }
            }
        }
    }

    /// Whole seconds left, clamped to `[0, duration]`. Holds at zero until
    /// the server announces the outcome.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let total = self.duration.as_secs() as i64;
        let elapsed = (now - self.start).num_milliseconds().max(0) / 1000;
        (total - elapsed).clamp(0, total) as u64
    }
}
