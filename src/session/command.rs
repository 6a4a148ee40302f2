//! Commands accepted from the control surface

/// A command from the control surface into the session state machine.
///
/// Commands that do not apply to the current state are silently ignored,
/// so a control surface may retry freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin a new session (enters the countdown)
    Start {
        target_minutes: u32,
        volume_percent: u32,
    },
    Pause,
    Resume,
    /// Return to idle from any state
    Reset,
    SetVolume(u32),
    /// Countdown plus a short beat burst that never touches the session timer
    Test(u32),
    /// Raised by the visual collaborator once its countdown has finished
    CountdownComplete,
    /// Dismiss a completed session
    Acknowledge,
}
