// Current player panel: the player on the block with bid state and timer,
// or whatever the auction is doing instead (joining, settling, idle, ended).

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Frame;

use gavel_core::model::format_amount;
use gavel_core::protocol::{CurrentPlayerView, ViewSnapshot};
use gavel_core::reducer::{Outcome, Phase};

use crate::tui::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("On the Block");
    let Some(snapshot) = &state.snapshot else {
        frame.render_widget(Paragraph::new(dim(" Connecting...")).block(block), area);
        return;
    };

    match (snapshot.phase, &snapshot.current) {
        (Phase::Active, Some(current)) => {
            let block = block.border_style(Style::default().fg(Color::Yellow));
            let inner = block.inner(area);
            frame.render_widget(block, area);

            let [body, timer] =
                Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);
            frame.render_widget(Paragraph::new(player_lines(current)), body);
            frame.render_widget(timer_gauge(current), timer);
        }
        _ => {
            let paragraph = Paragraph::new(status_lines(snapshot))
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(paragraph, area);
        }
    }
}

fn dim(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
    ))
}

/// Name, role, price and bid lines for the active player.
pub fn player_lines(current: &CurrentPlayerView) -> Vec<Line<'static>> {
    let player = &current.player;
    let mut header = vec![
        Span::styled(
            format!(" {}", player.name),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", player.role.label()), Style::default().fg(Color::Cyan)),
    ];
    if let Some(age) = player.age {
        header.push(Span::styled(format!(" · {age} yrs"), Style::default().fg(Color::Gray)));
    }

    let stats = &player.statistics;
    let mut lines = vec![
        Line::from(header),
        Line::from(Span::styled(
            format!(
                " {} matches · {} runs · {} wickets · avg {:.2}",
                stats.matches, stats.runs, stats.wickets, stats.average
            ),
            Style::default().fg(Color::Gray),
        )),
        Line::from(vec![
            Span::styled(" Base: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("₹{}", format_amount(player.base_price))),
        ]),
        Line::from(vec![
            Span::styled(" Current bid: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("₹{}", format_amount(current.current_bid)),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Next: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("₹{}", format_amount(current.next_bid))),
        ]),
        Line::from(vec![
            Span::styled(" Leading: ", Style::default().fg(Color::Gray)),
            Span::raw(current.winning_team.clone().unwrap_or_else(|| "No bids yet".to_string())),
        ]),
    ];
    if current.is_winning {
        lines.push(Line::from(Span::styled(
            " You are winning!",
            Style::default().fg(Color::Black).bg(Color::Green).add_modifier(Modifier::BOLD),
        )));
    }
    lines
}

/// Fraction of the player timer remaining, in `[0, 1]`.
pub fn timer_ratio(current: &CurrentPlayerView) -> f64 {
    if current.timer_secs == 0 {
        return 0.0;
    }
    (current.remaining_secs as f64 / current.timer_secs as f64).clamp(0.0, 1.0)
}

fn timer_gauge(current: &CurrentPlayerView) -> Gauge<'static> {
    let color = match current.remaining_secs {
        0..=5 => Color::Red,
        6..=10 => Color::Yellow,
        _ => Color::Green,
    };
    let mut label = format!("{}s", current.remaining_secs);
    if current.provisional {
        label.push_str(" (approx.)");
    }
    Gauge::default()
        .gauge_style(Style::default().fg(color))
        .ratio(timer_ratio(current))
        .label(label)
}

/// Lines shown when no player is actively on the block.
pub fn status_lines(snapshot: &ViewSnapshot) -> Vec<Line<'static>> {
    match snapshot.phase {
        Phase::Loading => match &snapshot.join_error {
            Some(error) => error_lines(error),
            None => vec![dim(" Joining auction...")],
        },
        Phase::JoinFailed => error_lines(
            snapshot
                .join_error
                .as_deref()
                .unwrap_or("Failed to join auction"),
        ),
        Phase::Settling => match &snapshot.outcome {
            Some(outcome) => outcome_lines(outcome),
            None => vec![dim(" Waiting for the next player...")],
        },
        Phase::Idle | Phase::Active => vec![dim(" Waiting for the next player...")],
        Phase::Ended => {
            let message = snapshot
                .ended
                .as_ref()
                .and_then(|e| e.message.clone())
                .unwrap_or_else(|| "The auction has ended.".to_string());
            let mut lines = vec![Line::from(Span::styled(
                " AUCTION ENDED",
                Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            ))];
            lines.push(Line::from(format!(" {message}")));
            if let Some(stats) = snapshot.ended.as_ref().and_then(|e| e.stats.as_ref()) {
                lines.push(Line::from(format!(
                    " {} sold · {} unsold · ₹{} spent",
                    stats.players_sold,
                    stats.players_unsold,
                    format_amount(stats.total_amount_spent)
                )));
            }
            lines
        }
    }
}

fn error_lines(error: &str) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(format!(" {error}"), Style::default().fg(Color::Red))),
        dim(" Press j to try again."),
    ]
}

pub fn outcome_lines(outcome: &Outcome) -> Vec<Line<'static>> {
    match outcome {
        Outcome::Sold(sold) => {
            let team = sold
                .team
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_else(|| "Unknown team".to_string());
            vec![
                Line::from(Span::styled(
                    " SOLD!",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )),
                Line::from(format!(
                    " {} to {} for ₹{}",
                    sold.player.name,
                    team,
                    format_amount(sold.bid_amount)
                )),
            ]
        }
        Outcome::Unsold(unsold) => vec![
            Line::from(Span::styled(
                " UNSOLD",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(" {} went unsold", unsold.player.name)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::tests::{active_snapshot, player};
    use gavel_core::model::PlayerRole;
    use gavel_core::wire::messages::{PlayerSold, PlayerUnsold};

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn timer_ratio_is_clamped() {
        let mut current = active_snapshot().current.unwrap();
        assert!((timer_ratio(&current) - 0.6).abs() < 1e-9);
        current.remaining_secs = 99;
        assert_eq!(timer_ratio(&current), 1.0);
        current.timer_secs = 0;
        assert_eq!(timer_ratio(&current), 0.0);
    }

    #[test]
    fn winning_badge_only_when_winning() {
        let mut current = active_snapshot().current.unwrap();
        let texts: Vec<String> = player_lines(&current).iter().map(line_text).collect();
        assert!(texts.iter().any(|t| t.contains("₹1,600")));
        assert!(!texts.iter().any(|t| t.contains("winning")));

        current.is_winning = true;
        let texts: Vec<String> = player_lines(&current).iter().map(line_text).collect();
        assert!(texts.iter().any(|t| t.contains("You are winning!")));
    }

    #[test]
    fn outcome_lines_describe_sale() {
        let sold = Outcome::Sold(Box::new(PlayerSold {
            player: player("p1", "Rohit", PlayerRole::Batsman, 1000),
            team: None,
            owner: None,
            bid_amount: 12_500,
        }));
        let text: Vec<String> = outcome_lines(&sold).iter().map(line_text).collect();
        assert_eq!(text[0], " SOLD!");
        assert_eq!(text[1], " Rohit to Unknown team for ₹12,500");

        let unsold = Outcome::Unsold(Box::new(PlayerUnsold {
            player: player("p2", "Bumrah", PlayerRole::Bowler, 300),
        }));
        let text: Vec<String> = outcome_lines(&unsold).iter().map(line_text).collect();
        assert_eq!(text[1], " Bumrah went unsold");
    }

    #[test]
    fn join_error_is_shown_while_loading() {
        let mut snapshot = active_snapshot();
        snapshot.phase = Phase::Loading;
        snapshot.current = None;
        snapshot.join_error = Some("Failed to load event".into());
        let text: Vec<String> = status_lines(&snapshot).iter().map(line_text).collect();
        assert_eq!(text[0], " Failed to load event");
    }

    #[test]
    fn render_each_phase_without_panic() {
        let backend = ratatui::backend::TestBackend::new(70, 12);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        for phase in [
            Phase::Loading,
            Phase::JoinFailed,
            Phase::Idle,
            Phase::Active,
            Phase::Settling,
            Phase::Ended,
        ] {
            let mut snapshot = active_snapshot();
            snapshot.phase = phase;
            let mut state = ViewState::default();
            state.apply_snapshot(snapshot);
            terminal.draw(|frame| render(frame, frame.area(), &state)).unwrap();
        }
    }
}
