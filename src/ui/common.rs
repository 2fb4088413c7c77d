//! # UI Common Components and Utilities
//!
//! Shared colors and frame helpers for the demo screen.

use eframe::egui::{Color32, Frame, Stroke};

use crate::mqtt::ConnectionState;

/// Dark theme palette
///
/// Colors go from darkest to lightest background, plus status colors for the
/// connection indicator.
pub struct UiColors;

impl UiColors {
    /// Primary background color for main content areas (RGB: 30, 30, 30)
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    /// Secondary background color for nested components (RGB: 25, 25, 25)
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    /// Border color for component separation (RGB: 60, 60, 60)
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Connected (RGB: 50, 200, 20) - Green
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// CONNECT sent, waiting for the broker (RGB: 220, 170, 30) - Amber
    pub const PENDING: Color32 = Color32::from_rgb(220, 170, 30);

    /// Disconnected or failed (RGB: 200, 50, 20) - Red
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    /// Outbound log entries
    pub const OUTBOUND_TEXT: Color32 = Color32::from_rgb(120, 170, 230);
}

/// Indicator color for a connection state
pub fn state_color(state: ConnectionState) -> Color32 {
    match state {
        ConnectionState::Connecting => UiColors::PENDING,
        state if state.is_online() => UiColors::ACTIVE,
        _ => UiColors::INACTIVE,
    }
}

/// Bordered frame with the standard margins
pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(4)
        .outer_margin(2)
}
