// Notifications panel: the live toast list, newest at the bottom.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use gavel_core::notify::{Notification, NotificationKind};

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    // Keep the newest entries when there are more than fit.
    let rows = area.height.saturating_sub(2) as usize;
    let skip = state.notifications.len().saturating_sub(rows);
    let lines: Vec<Line> = state.notifications[skip..].iter().map(line).collect();

    let paragraph =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Notifications"));
    frame.render_widget(paragraph, area);
}

pub fn kind_style(kind: NotificationKind) -> (&'static str, Color) {
    match kind {
        NotificationKind::Success => ("✓", Color::Green),
        NotificationKind::Error => ("✗", Color::Red),
        NotificationKind::Warning => ("!", Color::Yellow),
        NotificationKind::Info => ("i", Color::Cyan),
    }
}

fn line(notification: &Notification) -> Line<'static> {
    let (icon, color) = kind_style(notification.kind);
    Line::from(vec![
        Span::styled(format!(" {icon} "), Style::default().fg(color)),
        Span::raw(notification.message.clone()),
    ])
}
