//! cadence-rs - Session-timed metronome engine
//!
//! The engine behind the desktop app, usable headless:
//! - `session`: the session record, its state machine and the published render view
//! - `audio`: sample-accurate click rendering and the cpal output stream
//! - `scheduler`: wall-clock seconds and timer beats with drift correction
//! - `broadcast`: event fan-out to independently-lived consumers
//! - `metronome` / `runtime`: the coarse context tying it together on its own thread

pub mod audio;
pub mod broadcast;
pub mod metronome;
pub mod render;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod settings;
