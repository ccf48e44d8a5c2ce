//! Ratatui UI loop.
//!
//! Keys:
//! - Up/Down: move the device highlight
//! - Enter: confirm the highlighted device as the output
//! - Tab: move focus between the device list and the channel panes
//! - Space: toggle the focused channel between ba and da
//! - p: play (left channel first, then right; blocks until both finish)
//! - r: refresh the device list
//! - q: quit

mod app;
mod render;

pub(crate) use app::run_tui;
