//! Audio module - the sample-accurate beat path
//!
//! This module provides:
//! - `BeatClock` mapping sample indices onto the beat grid
//! - Two-tone click synthesis
//! - `BeatRenderer` for the real-time callback
//! - Lock-free beat event queue back to the scheduler
//! - Audio engine for cpal integration

mod beats;
mod click;
mod clock;
mod engine;
mod renderer;

pub use beats::{beat_queue, BeatEvent, BeatReceiver, BeatSender};
pub use click::{ClickConfig, ClickSynth};
pub use clock::{BeatClock, BeatPhase};
pub use engine::{AudioEngine, AudioError, AudioLink};
pub use renderer::BeatRenderer;
