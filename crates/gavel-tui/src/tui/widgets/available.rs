// Available players widget: players still to be auctioned, with the
// admin's selection highlighted.
//
// Columns: #, Name, Role, Base price.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Row, Table, TableState};
use ratatui::Frame;

use gavel_core::model::{format_amount, Player};

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let players = state.available();

    let header = Row::new(vec![
        Cell::from("#"),
        Cell::from("Name"),
        Cell::from("Role"),
        Cell::from("Base"),
    ])
    .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = players
        .iter()
        .enumerate()
        .map(|(i, p)| row(i, p))
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Min(12),
        Constraint::Length(14),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Available Players ({})", players.len())),
        )
        .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");

    let mut table_state = TableState::default();
    if state.is_admin() && !players.is_empty() {
        table_state.select(Some(state.selected));
    }
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn row(index: usize, player: &Player) -> Row<'static> {
    Row::new(vec![
        Cell::from(format!("{}", index + 1)),
        Cell::from(player.name.clone()),
        Cell::from(player.role.label()),
        Cell::from(format!("₹{}", format_amount(player.base_price))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::tests::active_snapshot;

    fn rendered(state: &ViewState) -> String {
        let backend = ratatui::backend::TestBackend::new(60, 10);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal.draw(|frame| render(frame, frame.area(), state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn lists_players_with_count() {
        let mut state = ViewState::default();
        state.apply_snapshot(active_snapshot());
        let text = rendered(&state);
        assert!(text.contains("Available Players (2)"));
        assert!(text.contains("Bumrah"));
        assert!(text.contains("₹500"));
        assert!(!text.contains(">>"));
    }

    #[test]
    fn admin_sees_selection_marker() {
        let mut snapshot = active_snapshot();
        snapshot.is_admin = true;
        let mut state = ViewState::default();
        state.apply_snapshot(snapshot);
        assert!(rendered(&state).contains(">>"));
    }

    #[test]
    fn render_does_not_panic_with_defaults() {
        let state = ViewState::default();
        assert!(rendered(&state).contains("Available Players (0)"));
    }
}
