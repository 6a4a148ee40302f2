//! Render module - UI components for the session display
//!
//! This module provides:
//! - Beat indicator widget
//! - Countdown and notification overlays

mod beat_indicator;
mod overlay;

pub use beat_indicator::{BeatIndicator, IndicatorSettings};
pub use overlay::{
    format_mmss, Countdown, CountdownFrame, CountdownStep, Notifications, COMPLETION_DURATION,
    NOTIFY_DURATION,
};
