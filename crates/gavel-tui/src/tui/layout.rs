// Screen layout: panel arrangement and sizing.
//
// +--------------------------------------------------+
// | Status Bar (1 row)                                |
// +--------------------------------------------------+
// | Auction Header (3 rows)                           |
// +-------------------------+------------------------+
// | Current Player (60%)     | Balance (5 rows)       |
// |                          +------------------------+
// +--------------------------+ Available Players      |
// | Notifications (6 rows)   |                        |
// +-------------------------+------------------------+
// | Help Bar (1 row)                                  |
// +--------------------------------------------------+

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Resolved screen areas for each dashboard zone.
#[derive(Debug, Clone)]
pub struct AppLayout {
    /// Connection state and viewer role.
    pub status_bar: Rect,
    /// Event name, status, start countdown and stats.
    pub header: Rect,
    /// The player on the block, or the outcome / idle / ended message.
    pub current_player: Rect,
    /// Toast-style notifications, newest last.
    pub notifications: Rect,
    /// Team balance.
    pub balance: Rect,
    /// Players still to be auctioned.
    pub available: Rect,
    /// Keyboard shortcut hints.
    pub help_bar: Rect,
}

pub fn build_layout(area: Rect) -> AppLayout {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Length(3), // header
            Constraint::Min(10),   // middle
            Constraint::Length(1), // help bar
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(vertical[2]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(6)])
        .split(horizontal[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(4)])
        .split(horizontal[1]);

    AppLayout {
        status_bar: vertical[0],
        header: vertical[1],
        current_player: left[0],
        notifications: left[1],
        balance: right[0],
        available: right[1],
        help_bar: vertical[3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zones_have_area() {
        let layout = build_layout(Rect::new(0, 0, 120, 40));
        let zones = [
            ("status_bar", layout.status_bar),
            ("header", layout.header),
            ("current_player", layout.current_player),
            ("notifications", layout.notifications),
            ("balance", layout.balance),
            ("available", layout.available),
            ("help_bar", layout.help_bar),
        ];
        for (name, rect) in zones {
            assert!(rect.width > 0 && rect.height > 0, "{name} has zero area: {rect:?}");
        }
    }

    #[test]
    fn fixed_rows_keep_their_height() {
        let layout = build_layout(Rect::new(0, 0, 120, 40));
        assert_eq!(layout.status_bar.height, 1);
        assert_eq!(layout.header.height, 3);
        assert_eq!(layout.notifications.height, 6);
        assert_eq!(layout.balance.height, 5);
        assert_eq!(layout.help_bar.height, 1);
        assert_eq!(layout.help_bar.y, 39);
    }

    #[test]
    fn left_column_is_wider() {
        let layout = build_layout(Rect::new(0, 0, 100, 30));
        assert!(layout.current_player.width > layout.available.width);
        assert_eq!(layout.current_player.x, 0);
        assert_eq!(layout.available.x, layout.current_player.width);
    }
}
