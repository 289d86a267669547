// Library root: the auction client engine. The TUI crate and integration
// tests consume everything through these modules.

pub mod api;
pub mod client;
pub mod config;
pub mod countdown;
pub mod listeners;
pub mod model;
pub mod notify;
pub mod protocol;
pub mod reducer;
pub mod session;
pub mod sync;
pub mod transport;
pub mod wire;
