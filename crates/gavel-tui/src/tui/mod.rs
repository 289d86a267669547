// TUI dashboard: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors the latest snapshot pushed by the
// synchronizer. `UiUpdate`s arrive over an mpsc channel; the TUI applies
// them to `ViewState` and re-renders at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::{info, warn};

use gavel_core::model::Player;
use gavel_core::notify::Notification;
use gavel_core::protocol::{ConnectionStatus, UiUpdate, UserCommand, ViewSnapshot};

use layout::{build_layout, AppLayout};

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// TUI-local state: the last snapshot plus purely local selection state.
pub struct ViewState {
    pub connection_status: ConnectionStatus,
    pub snapshot: Option<ViewSnapshot>,
    pub notifications: Vec<Notification>,
    /// Highlighted row in the available players list.
    pub selected: usize,
    /// Quit confirmation overlay is showing.
    pub confirm_quit: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            connection_status: ConnectionStatus::Disconnected,
            snapshot: None,
            notifications: Vec::new(),
            selected: 0,
            confirm_quit: false,
        }
    }
}

impl ViewState {
    pub fn available(&self) -> &[Player] {
        self.snapshot.as_ref().map(|s| s.available.as_slice()).unwrap_or(&[])
    }

    pub fn selected_player(&self) -> Option<&Player> {
        self.available().get(self.selected)
    }

    pub fn is_admin(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.is_admin)
    }

    pub fn is_team_owner(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.is_team_owner)
    }

    /// Next-bid amount currently on screen, if a player is up.
    pub fn next_bid(&self) -> Option<u64> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.current.as_ref())
            .map(|c| c.next_bid)
    }

    pub fn apply_snapshot(&mut self, snapshot: ViewSnapshot) {
        let len = snapshot.available.len();
        self.selected = self.selected.min(len.saturating_sub(1));
        self.snapshot = Some(snapshot);
    }
}

/// Apply a single UiUpdate to the ViewState.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Snapshot(snapshot) => state.apply_snapshot(*snapshot),
        UiUpdate::Notifications(items) => state.notifications = items,
        UiUpdate::ConnectionStatus(status) => state.connection_status = status,
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete dashboard frame.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    widgets::auction_header::render(frame, layout.header, state);
    widgets::current_player::render(frame, layout.current_player, state);
    widgets::notifications::render(frame, layout.notifications, state);
    widgets::balance::render(frame, layout.balance, state);
    widgets::available::render(frame, layout.available, state);
    render_help_bar(frame, &layout, state);

    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area());
    }
}

/// Shortcut hints for the keys this viewer can use.
pub fn help_text(state: &ViewState) -> String {
    let mut parts = Vec::new();
    if state.is_team_owner() {
        parts.push("b:Bid");
    }
    if state.is_admin() {
        parts.push("s:Start selected");
        parts.push("r:Random");
        parts.push("a:Auto-start");
    }
    parts.push("↑↓:Select");
    parts.push("j:Rejoin");
    parts.push("d:Dismiss");
    parts.push("q:Quit");
    format!(" {}", parts.join(" | "))
}

fn render_help_bar(frame: &mut Frame, layout: &AppLayout, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        help_text(state),
        Style::default().fg(Color::White).add_modifier(Modifier::DIM),
    )]))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, layout.help_bar);
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop until the user quits or the synchronizer goes away.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    // Restore the terminal before the default hook prints the panic.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    None => {
                        info!("Synchronizer closed the UI channel");
                        break;
                    }
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            if cmd_tx.send(cmd).await.is_err() || quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Terminal input error: {e}");
                        break;
                    }
                    None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    ratatui::restore();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
