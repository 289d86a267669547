// Status bar widget: connection state, viewer role, auction phase.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use gavel_core::protocol::ConnectionStatus;

use crate::tui::ViewState;

/// Layout: [connection indicator + label] | [role] | [phase] [auto-start]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (dot, color) = connection_indicator(&state.connection_status);
    let mut spans = vec![
        Span::styled(format!(" {dot} "), Style::default().fg(color)),
        Span::styled(connection_label(&state.connection_status), Style::default().fg(Color::White)),
        Span::styled(" | ", Style::default().fg(Color::Gray)),
        Span::styled(role_label(state), Style::default().fg(Color::Cyan)),
    ];

    if let Some(snapshot) = &state.snapshot {
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            snapshot.phase.label(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
        if snapshot.is_admin && snapshot.auto_start {
            spans.push(Span::styled(" [AUTO]", Style::default().fg(Color::Green)));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Return the connection dot character and its color.
pub fn connection_indicator(status: &ConnectionStatus) -> (&'static str, Color) {
    match status {
        ConnectionStatus::Connected => ("●", Color::Green),
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting { .. } => ("●", Color::Yellow),
        ConnectionStatus::Disconnected | ConnectionStatus::Failed => ("●", Color::Red),
    }
}

pub fn connection_label(status: &ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Connected => "Connected".to_string(),
        ConnectionStatus::Connecting => "Connecting...".to_string(),
        ConnectionStatus::Reconnecting { attempt, delay } => {
            format!("Reconnecting (attempt {attempt}, {:.1}s)", delay.as_secs_f64())
        }
        ConnectionStatus::Disconnected => "Disconnected".to_string(),
        ConnectionStatus::Failed => "Connection failed (j to retry)".to_string(),
    }
}

fn role_label(state: &ViewState) -> &'static str {
    if state.is_admin() {
        "Admin"
    } else if state.is_team_owner() {
        "Team owner"
    } else {
        "Spectator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn indicator_colors() {
        assert_eq!(connection_indicator(&ConnectionStatus::Connected).1, Color::Green);
        assert_eq!(
            connection_indicator(&ConnectionStatus::Reconnecting {
                attempt: 2,
                delay: Duration::from_secs(2)
            })
            .1,
            Color::Yellow
        );
        assert_eq!(connection_indicator(&ConnectionStatus::Failed).1, Color::Red);
    }

    #[test]
    fn reconnecting_label_shows_attempt_and_delay() {
        let label = connection_label(&ConnectionStatus::Reconnecting {
            attempt: 3,
            delay: Duration::from_millis(4000),
        });
        assert_eq!(label, "Reconnecting (attempt 3, 4.0s)");
    }

    #[test]
    fn render_does_not_panic_with_defaults() {
        let backend = ratatui::backend::TestBackend::new(80, 1);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let state = ViewState::default();
        terminal.draw(|frame| render(frame, frame.area(), &state)).unwrap();
    }
}
