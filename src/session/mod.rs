//! Session module - the canonical session record and its state machine
//!
//! This module provides:
//! - `Session` snapshot type and its lifecycle states
//! - `SessionStateMachine`, the only writer of session state
//! - `SessionCell`, a lock-free published view for the render thread
//! - `Command`, the UI-facing command set

mod cell;
mod command;
mod state;

pub use cell::{RenderGate, SessionCell};
pub use command::Command;
pub use state::{
    Advance, Session, SessionMode, SessionState, SessionStateMachine, Transition,
    DEFAULT_TEMPO_BPM, MAX_TARGET_MINUTES, MIN_TARGET_MINUTES,
};
