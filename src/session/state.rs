//! Session state machine
//!
//! Holds the canonical `Session` record. Every mutation goes through one of
//! the transition functions below; each returns `Some(Transition)` when the
//! session actually changed and `None` when the command did not apply.
//!
//! ```text
//!   Idle ──start──▶ CountingDown ──countdown complete──▶ Running
//!                                                        │    ▲
//!                                                  pause │    │ resume
//!                                                        ▼    │
//!                                                        Paused
//!   Running ──elapsed ≥ target──▶ Completed ──acknowledge──▶ Idle
//!   (any) ──reset──▶ Idle
//! ```

use serde::Serialize;

use super::Command;

/// Tempo used for every session
pub const DEFAULT_TEMPO_BPM: u32 = 180;

/// Shortest session a user may request
pub const MIN_TARGET_MINUTES: u32 = 1;

/// Longest session a user may request
pub const MAX_TARGET_MINUTES: u32 = 180;

const DEFAULT_TARGET_MINUTES: u32 = 30;
const DEFAULT_VOLUME: f32 = 0.5;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    CountingDown,
    Running,
    Paused,
    Completed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::CountingDown => "Counting down",
            SessionState::Running => "Running",
            SessionState::Paused => "Paused",
            SessionState::Completed => "Completed",
        }
    }
}

/// Whether the session is a real timed session or a short test burst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionMode {
    Timed,
    Test,
}

/// A complete, self-sufficient snapshot of session state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub state: SessionState,
    pub mode: SessionMode,
    pub elapsed_seconds: u32,
    pub target_seconds: u32,
    /// Linear gain (0.0 to 1.0)
    pub volume: f32,
    pub tempo_bpm: u32,
}

impl Session {
    fn idle(target_seconds: u32, volume: f32, tempo_bpm: u32) -> Self {
        Self {
            state: SessionState::Idle,
            mode: SessionMode::Timed,
            elapsed_seconds: 0,
            target_seconds,
            volume,
            tempo_bpm,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.target_seconds.saturating_sub(self.elapsed_seconds)
    }
}

/// A change to the session produced by a transition function
///
/// `from == to` for changes that only touch a field (e.g. volume).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub session: Session,
}

/// Result of advancing the session clock by one second
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
    Ticked(u32),
    Completed(Transition),
}

fn volume_from_percent(percent: u32) -> f32 {
    percent.min(100) as f32 / 100.0
}

/// The single writer of session state
pub struct SessionStateMachine {
    session: Session,
    /// Incremented on every entry into `Running`; the renderer uses it to
    /// restart its beat phase.
    run_epoch: u32,
    /// Volume to restore when a test burst ends
    volume_before_test: Option<f32>,
}

impl SessionStateMachine {
    pub fn new(tempo_bpm: u32) -> Self {
        Self {
            session: Session::idle(DEFAULT_TARGET_MINUTES * 60, DEFAULT_VOLUME, tempo_bpm),
            run_epoch: 0,
            volume_before_test: None,
        }
    }

    /// Current snapshot (copied)
    pub fn session(&self) -> Session {
        self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn run_epoch(&self) -> u32 {
        self.run_epoch
    }

    /// Dispatch a control-surface command
    pub fn apply(&mut self, command: Command) -> Option<Transition> {
        match command {
            Command::Start {
                target_minutes,
                volume_percent,
            } => self.start(target_minutes, volume_percent),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Reset => self.reset(),
            Command::SetVolume(percent) => self.set_volume(percent),
            Command::Test(percent) => self.test(percent),
            Command::CountdownComplete => self.countdown_complete(),
            Command::Acknowledge => self.acknowledge(),
        }
    }

    /// Idle (or an unacknowledged Completed) → CountingDown
    pub fn start(&mut self, target_minutes: u32, volume_percent: u32) -> Option<Transition> {
        if !matches!(
            self.session.state,
            SessionState::Idle | SessionState::Completed
        ) {
            return None;
        }
        let minutes = target_minutes.clamp(MIN_TARGET_MINUTES, MAX_TARGET_MINUTES);
        self.session.mode = SessionMode::Timed;
        self.session.elapsed_seconds = 0;
        self.session.target_seconds = minutes * 60;
        self.session.volume = volume_from_percent(volume_percent);
        Some(self.enter(SessionState::CountingDown))
    }

    /// Idle → CountingDown in test mode
    pub fn test(&mut self, volume_percent: u32) -> Option<Transition> {
        if self.session.state != SessionState::Idle {
            return None;
        }
        self.session.mode = SessionMode::Test;
        self.session.elapsed_seconds = 0;
        self.volume_before_test = Some(self.session.volume);
        self.session.volume = volume_from_percent(volume_percent);
        Some(self.enter(SessionState::CountingDown))
    }

    pub fn countdown_complete(&mut self) -> Option<Transition> {
        if self.session.state != SessionState::CountingDown {
            return None;
        }
        Some(self.enter(SessionState::Running))
    }

    pub fn pause(&mut self) -> Option<Transition> {
        if self.session.state != SessionState::Running || self.session.mode == SessionMode::Test {
            return None;
        }
        Some(self.enter(SessionState::Paused))
    }

    /// Paused → Running; the beat phase restarts at the top of a beat.
    pub fn resume(&mut self) -> Option<Transition> {
        if self.session.state != SessionState::Paused {
            return None;
        }
        Some(self.enter(SessionState::Running))
    }

    pub fn reset(&mut self) -> Option<Transition> {
        if self.session.state == SessionState::Idle {
            return None;
        }
        self.session.mode = SessionMode::Timed;
        self.session.elapsed_seconds = 0;
        self.restore_volume();
        Some(self.enter(SessionState::Idle))
    }

    pub fn acknowledge(&mut self) -> Option<Transition> {
        if self.session.state != SessionState::Completed {
            return None;
        }
        self.session.elapsed_seconds = 0;
        Some(self.enter(SessionState::Idle))
    }

    /// End a test burst (Running in test mode → Idle)
    pub fn finish_test(&mut self) -> Option<Transition> {
        if self.session.mode != SessionMode::Test || self.session.state != SessionState::Running {
            return None;
        }
        self.session.mode = SessionMode::Timed;
        self.restore_volume();
        Some(self.enter(SessionState::Idle))
    }

    /// Change the volume. Only reported while a session exists; in `Idle`
    /// the value is just stored for the next start.
    pub fn set_volume(&mut self, percent: u32) -> Option<Transition> {
        let volume = volume_from_percent(percent);
        if (self.session.volume - volume).abs() < f32::EPSILON {
            return None;
        }
        self.session.volume = volume;
        if self.session.state == SessionState::Idle {
            return None;
        }
        let state = self.session.state;
        Some(Transition {
            from: state,
            to: state,
            session: self.session,
        })
    }

    /// Advance elapsed time by one second.
    ///
    /// Only a timed session in `Running` advances. Reaching the target moves
    /// to `Completed` on the same call, so elapsed never exceeds the target.
    pub fn advance_second(&mut self) -> Option<Advance> {
        if self.session.state != SessionState::Running || self.session.mode != SessionMode::Timed {
            return None;
        }
        self.session.elapsed_seconds += 1;
        if self.session.elapsed_seconds >= self.session.target_seconds {
            self.session.elapsed_seconds = self.session.target_seconds;
            return Some(Advance::Completed(self.enter(SessionState::Completed)));
        }
        Some(Advance::Ticked(self.session.elapsed_seconds))
    }

    fn restore_volume(&mut self) {
        if let Some(volume) = self.volume_before_test.take() {
            self.session.volume = volume;
        }
    }

    fn enter(&mut self, to: SessionState) -> Transition {
        let from = self.session.state;
        self.session.state = to;
        if to == SessionState::Running {
            self.run_epoch = self.run_epoch.wrapping_add(1);
        }
        log::debug!("Session {} -> {}", from.name(), to.name());
        Transition {
            from,
            to,
            session: self.session,
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPO_BPM)
    }
}
