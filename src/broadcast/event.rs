//! Events delivered to consumers

use serde::Serialize;

use crate::session::Session;

/// Something a consumer is told about
///
/// Serialized as tagged JSON, e.g. `{"type":"beat","toneParity":true}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// Full session snapshot; also the resync message on attach
    StateChanged(Session),
    #[serde(rename_all = "camelCase")]
    Beat { tone_parity: bool },
    /// Sent every elapsed second while running
    #[serde(rename_all = "camelCase")]
    Tick { elapsed_seconds: u32 },
    #[serde(rename_all = "camelCase")]
    PeriodicNotification { elapsed_seconds: u32 },
    #[serde(rename_all = "camelCase")]
    Completed { elapsed_seconds: u32 },
    TestStarted,
    TestFinished,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::StateChanged(_) => "stateChanged",
            Event::Beat { .. } => "beat",
            Event::Tick { .. } => "tick",
            Event::PeriodicNotification { .. } => "periodicNotification",
            Event::Completed { .. } => "completed",
            Event::TestStarted => "testStarted",
            Event::TestFinished => "testFinished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStateMachine;

    #[test]
    fn test_beat_json_shape() {
        let json = serde_json::to_value(Event::Beat { tone_parity: false }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "beat", "toneParity": false}));
    }

    #[test]
    fn test_state_changed_flattens_session() {
        let mut machine = SessionStateMachine::default();
        machine.start(2, 50);
        let json = serde_json::to_value(Event::StateChanged(machine.session())).unwrap();
        assert_eq!(json["type"], "stateChanged");
        assert_eq!(json["state"], "countingDown");
        assert_eq!(json["targetSeconds"], 120);
        assert_eq!(json["tempoBpm"], 180);
    }
}
