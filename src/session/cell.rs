//! Published session view for the render thread
//!
//! The render callback must never lock, so the fields it needs (state,
//! volume, run epoch) are packed into a single `AtomicU64`. One load always
//! yields a consistent snapshot; there are no partial field reads.
//!
//! Layout (low to high bits):
//! - `0..8`   session state
//! - `8..24`  volume in units of 1/10000
//! - `32..64` run epoch

use std::sync::atomic::{AtomicU64, Ordering};

use super::{Session, SessionState};

const VOLUME_SCALE: f32 = 10_000.0;

fn state_to_bits(state: SessionState) -> u64 {
    match state {
        SessionState::Idle => 0,
        SessionState::CountingDown => 1,
        SessionState::Running => 2,
        SessionState::Paused => 3,
        SessionState::Completed => 4,
    }
}

fn state_from_bits(bits: u64) -> SessionState {
    match bits {
        1 => SessionState::CountingDown,
        2 => SessionState::Running,
        3 => SessionState::Paused,
        4 => SessionState::Completed,
        _ => SessionState::Idle,
    }
}

/// What the renderer sees of the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderGate {
    pub state: SessionState,
    pub volume: f32,
    pub run_epoch: u32,
}

impl RenderGate {
    fn pack(&self) -> u64 {
        let volume = if self.volume.is_finite() {
            (self.volume.clamp(0.0, 1.0) * VOLUME_SCALE).round() as u64
        } else {
            0
        };
        state_to_bits(self.state) | (volume << 8) | ((self.run_epoch as u64) << 32)
    }

    fn unpack(bits: u64) -> Self {
        Self {
            state: state_from_bits(bits & 0xff),
            volume: ((bits >> 8) & 0xffff) as f32 / VOLUME_SCALE,
            run_epoch: (bits >> 32) as u32,
        }
    }

    /// Whether audio should be produced at all
    pub fn is_audible(&self) -> bool {
        self.state == SessionState::Running
    }
}

/// Single-writer, multi-reader cell holding the current `RenderGate`
pub struct SessionCell {
    bits: AtomicU64,
}

impl SessionCell {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(
                RenderGate {
                    state: SessionState::Idle,
                    volume: 0.0,
                    run_epoch: 0,
                }
                .pack(),
            ),
        }
    }

    /// Publish a session snapshot (coarse context only)
    pub fn publish(&self, session: &Session, run_epoch: u32) {
        let gate = RenderGate {
            state: session.state,
            volume: session.volume,
            run_epoch,
        };
        self.bits.store(gate.pack(), Ordering::Release);
    }

    /// Read a consistent snapshot (any thread, lock-free)
    pub fn load(&self) -> RenderGate {
        RenderGate::unpack(self.bits.load(Ordering::Acquire))
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStateMachine;

    #[test]
    fn test_new_cell_is_silent() {
        let cell = SessionCell::new();
        let gate = cell.load();
        assert_eq!(gate.state, SessionState::Idle);
        assert!(!gate.is_audible());
    }

    #[test]
    fn test_publish_then_load() {
        let mut machine = SessionStateMachine::default();
        machine.start(10, 37);
        machine.countdown_complete();
        let cell = SessionCell::new();
        cell.publish(&machine.session(), machine.run_epoch());

        let gate = cell.load();
        assert_eq!(gate.state, SessionState::Running);
        assert!((gate.volume - 0.37).abs() < 1e-4);
        assert_eq!(gate.run_epoch, machine.run_epoch());
        assert!(gate.is_audible());
    }

    #[test]
    fn test_large_epoch_survives_packing() {
        let gate = RenderGate {
            state: SessionState::Paused,
            volume: 1.0,
            run_epoch: u32::MAX,
        };
        let back = RenderGate::unpack(gate.pack());
        assert_eq!(back, gate);
    }

    #[test]
    fn test_non_finite_volume_packs_as_silence() {
        let gate = RenderGate {
            state: SessionState::Running,
            volume: f32::NAN,
            run_epoch: 3,
        };
        assert_eq!(RenderGate::unpack(gate.pack()).volume, 0.0);
    }
}
