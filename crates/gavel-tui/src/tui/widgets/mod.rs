// TUI widget modules for each dashboard panel.

pub mod auction_header;
pub mod available;
pub mod balance;
pub mod current_player;
pub mod notifications;
pub mod quit_confirm;
pub mod status_bar;
