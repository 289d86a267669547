// Auction header: event name, status, pre-start countdown and running stats.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use gavel_core::countdown::CountdownDisplay;
use gavel_core::model::{format_amount, EventStatus};

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let Some(snapshot) = &state.snapshot else {
        let paragraph = Paragraph::new(Span::styled(
            " Loading auction...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(Block::default().borders(Borders::ALL).title("Auction"));
        frame.render_widget(paragraph, area);
        return;
    };

    let title = snapshot
        .event
        .as_ref()
        .map(|e| e.name.clone())
        .unwrap_or_else(|| snapshot.event_id.clone());

    let mut spans = Vec::new();
    if let Some(event) = &snapshot.event {
        spans.push(Span::styled(
            format!(" {} ", event.status.label()),
            Style::default()
                .fg(Color::Black)
                .bg(status_color(event.status))
                .add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
    }
    spans.push(countdown_span(&snapshot.countdown));

    if let Some(event) = &snapshot.event {
        let stats = &event.stats;
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            format!(
                "Sold {} · Unsold {} · Total {} · Spent ₹{}",
                stats.players_sold,
                stats.players_unsold,
                stats.total_players,
                format_amount(stats.total_amount_spent)
            ),
            Style::default().fg(Color::White),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
}

pub fn status_color(status: EventStatus) -> Color {
    match status {
        EventStatus::Live => Color::Green,
        EventStatus::Scheduled | EventStatus::Draft => Color::Cyan,
        EventStatus::Paused => Color::Yellow,
        EventStatus::Completed => Color::Blue,
        EventStatus::Cancelled | EventStatus::Unknown => Color::Gray,
    }
}

/// "Starts in 02 Days 05 Hours ..." while counting, otherwise the display text.
pub fn countdown_text(countdown: &CountdownDisplay) -> String {
    match countdown {
        CountdownDisplay::Counting(breakdown) => {
            let parts: Vec<String> = breakdown
                .parts()
                .into_iter()
                .map(|(label, value)| format!("{value} {label}"))
                .collect();
            format!("Starts in {}", parts.join(" "))
        }
        other => other.text(),
    }
}

fn countdown_span(countdown: &CountdownDisplay) -> Span<'static> {
    let style = match countdown {
        CountdownDisplay::Started => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        CountdownDisplay::Invalid => Style::default().fg(Color::Red),
        CountdownDisplay::Waiting => Style::default().fg(Color::DarkGray),
        CountdownDisplay::Counting(_) => Style::default().fg(Color::Yellow),
    };
    Span::styled(countdown_text(countdown), style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::tests::active_snapshot;
    use gavel_core::countdown::TimeBreakdown;

    #[test]
    fn countdown_text_lists_parts() {
        let text = countdown_text(&CountdownDisplay::Counting(TimeBreakdown::from_secs(3_725)));
        assert!(text.starts_with("Starts in "));
        assert!(text.contains("Hours"));
        assert!(text.contains("Seconds"));
        assert_eq!(countdown_text(&CountdownDisplay::Started), "Auction Started!");
    }

    #[test]
    fn render_shows_event_name_and_stats() {
        let backend = ratatui::backend::TestBackend::new(100, 3);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = ViewState::default();
        state.apply_snapshot(active_snapshot());
        terminal.draw(|frame| render(frame, frame.area(), &state)).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Premier Auction"));
        assert!(text.contains("Sold 12"));
    }

    #[test]
    fn render_does_not_panic_without_snapshot() {
        let backend = ratatui::backend::TestBackend::new(40, 3);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let state = ViewState::default();
        terminal.draw(|frame| render(frame, frame.area(), &state)).unwrap();
    }
}
