// Transient user notifications (toasts).

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::config::{NotificationConfig, MAX_WINDOW_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Ordered list of live notifications, oldest first.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    next_id: u64,
    items: Vec<Notification>,
    info_ttl: ChronoDuration,
    error_ttl: ChronoDuration,
}

fn ttl(secs: u64) -> ChronoDuration {
    ChronoDuration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

impl NotificationCenter {
    pub fn new(config: &NotificationConfig) -> Self {
        NotificationCenter {
            next_id: 0,
            items: Vec::new(),
            info_ttl: ttl(config.info_secs),
            error_ttl: ttl(config.error_secs),
        }
    }

    /// Add a notification and return its id. Success and info messages
    /// live for `info_secs`, errors and warnings for `error_secs`.
    pub fn push(&mut self, kind: NotificationKind, message: impl Into<String>, now: DateTime<Utc>) -> u64 {
        self.next_id += 1;
        let ttl = match kind {
            NotificationKind::Success | NotificationKind::Info => self.info_ttl,
            NotificationKind::Error | NotificationKind::Warning => self.error_ttl,
        };
        self.items.push(Notification {
            id: self.next_id,
            kind,
            message: message.into(),
            expires_at: now + ttl,
        });
        self.next_id
    }

    /// Drop expired notifications. Returns true if anything was removed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.expires_at > now);
        self.items.len() != before
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
