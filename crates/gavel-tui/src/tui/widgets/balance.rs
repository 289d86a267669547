// Balance panel: the team owner's remaining budget, or the admin's
// auto-start setting.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use gavel_core::model::format_amount;
use gavel_core::reducer::TeamBalance;

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let (title, lines) = if state.is_admin() {
        ("Controls", admin_lines(state))
    } else {
        ("Team Balance", balance_lines(state.snapshot.as_ref().and_then(|s| s.balance)))
    };
    let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(paragraph, area);
}

pub fn balance_lines(balance: Option<TeamBalance>) -> Vec<Line<'static>> {
    match balance {
        Some(balance) => {
            let mut lines = vec![Line::from(Span::styled(
                format!(" ₹{}", format_amount(balance.amount)),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ))];
            if !balance.authoritative {
                // Seeded from the team record; the server has not pushed one yet.
                lines.push(Line::from(Span::styled(
                    " (estimated)",
                    Style::default().fg(Color::DarkGray),
                )));
            }
            lines
        }
        None => vec![Line::from(Span::styled(
            " --",
            Style::default().fg(Color::DarkGray),
        ))],
    }
}

fn admin_lines(state: &ViewState) -> Vec<Line<'static>> {
    let auto_start = state.snapshot.as_ref().is_some_and(|s| s.auto_start);
    let (label, color) = if auto_start {
        ("ON", Color::Green)
    } else {
        ("OFF", Color::Gray)
    };
    vec![
        Line::from(vec![
            Span::styled(" Auto-start: ", Style::default().fg(Color::Gray)),
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(Span::styled(
            format!(" {} players remaining", state.available().len()),
            Style::default().fg(Color::Gray),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn estimated_balance_is_marked() {
        let lines = balance_lines(Some(TeamBalance {
            amount: 125_000,
            authoritative: false,
        }));
        assert_eq!(text(&lines), vec![" ₹125,000", " (estimated)"]);

        let lines = balance_lines(Some(TeamBalance {
            amount: 9_000,
            authoritative: true,
        }));
        assert_eq!(text(&lines), vec![" ₹9,000"]);
    }

    #[test]
    fn missing_balance_shows_placeholder() {
        assert_eq!(text(&balance_lines(None)), vec![" --"]);
    }

    #[test]
    fn render_does_not_panic_with_defaults() {
        let backend = ratatui::backend::TestBackend::new(40, 5);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let state = ViewState::default();
        terminal.draw(|frame| render(frame, frame.area(), &state)).unwrap();
    }
}
