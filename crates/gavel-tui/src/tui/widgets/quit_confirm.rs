// Leave-auction overlay, drawn over the main layout while
// `ViewState::confirm_quit` is set.

use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

const WIDTH: u16 = 34;
const HEIGHT: u16 = 5;

pub fn render(frame: &mut Frame, area: Rect) {
    let dialog = centered(area);
    frame.render_widget(Clear, dialog);

    let key = |k: &'static str, color: Color| {
        Span::styled(k, Style::default().fg(color).add_modifier(Modifier::BOLD))
    };
    let lines = vec![
        Line::from(" Leave the auction room?"),
        Line::from(vec![
            Span::raw(" "),
            key("y", Color::Green),
            Span::raw(" leave   "),
            key("n", Color::Red),
            Span::raw(" stay"),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            " Quit ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    frame.render_widget(
        Paragraph::new(lines).block(block).style(Style::default().bg(Color::Black)),
        dialog,
    );
}

/// Dialog rectangle centered in `area`, shrunk to fit small terminals.
fn centered(area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(HEIGHT.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    let [cell] = Layout::horizontal([Constraint::Length(WIDTH.min(area.width))])
        .flex(Flex::Center)
        .areas(row);
    cell
}
