// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into `UserCommand`s for the synchronizer,
// or into local `ViewState` changes (selection, quit confirmation). Role
// gating here only hides keys; the server still decides.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use gavel_core::protocol::UserCommand;

use super::ViewState;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// synchronizer, `None` when it was handled locally.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // Windows reports both press and release.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c') {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_state.selected = view_state.selected.saturating_sub(1);
            None
        }
        KeyCode::Down => {
            let last = view_state.available().len().saturating_sub(1);
            view_state.selected = (view_state.selected + 1).min(last);
            None
        }

        KeyCode::Char('b') if view_state.is_team_owner() => {
            // Bid exactly what is on screen; a stale amount bounces locally.
            view_state
                .next_bid()
                .map(|amount| UserCommand::PlaceBid { amount })
        }

        KeyCode::Char('s') | KeyCode::Enter if view_state.is_admin() => view_state
            .selected_player()
            .map(|p| UserCommand::StartPlayer(p.id.clone())),
        KeyCode::Char('r') if view_state.is_admin() => Some(UserCommand::StartRandomPlayer),
        KeyCode::Char('a') if view_state.is_admin() => Some(UserCommand::ToggleAutoStart),

        KeyCode::Char('j') => Some(UserCommand::Rejoin),

        // Dismiss the newest notification.
        KeyCode::Char('d') => view_state
            .notifications
            .last()
            .map(|n| UserCommand::DismissNotification(n.id)),

        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            None
        }

        _ => None,
    }
}

fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
