//! Metronome - the coarse execution context
//!
//! Owns the session state machine, the coarse scheduler and the broadcast
//! hub, and is driven by two calls: `apply` for commands and `poll` on the
//! scheduler's fixed interval. Everything here runs on one thread, so the
//! hub and the state machine need no locking; the only thing shared with
//! the render thread is the published `SessionCell` (written here) and the
//! beat queue inside the `AudioLink` (read here).

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{AudioLink, ClickConfig};
use crate::broadcast::{AttachOutcome, BroadcastHub, Consumer, ConsumerId, Event};
use crate::scheduler::{CoarseScheduler, SchedulerConfig};
use crate::session::{
    Advance, Command, Session, SessionCell, SessionMode, SessionState, SessionStateMachine,
    Transition, DEFAULT_TEMPO_BPM,
};

/// Engine-level configuration
#[derive(Clone, Debug)]
pub struct MetronomeConfig {
    pub tempo_bpm: u32,
    pub scheduler: SchedulerConfig,
    /// Elapsed seconds between periodic notifications (0 disables them)
    pub notify_every_seconds: u32,
    /// Length of the beat burst played by `test`
    pub test_duration: Duration,
    /// Consecutive delivery failures before a consumer is pruned
    pub failure_threshold: u32,
    /// Capacity of the render → scheduler beat queue
    pub beat_queue_capacity: usize,
    pub click: ClickConfig,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: DEFAULT_TEMPO_BPM,
            scheduler: SchedulerConfig::default(),
            notify_every_seconds: 300,
            test_duration: Duration::from_secs(4),
            failure_threshold: 2,
            beat_queue_capacity: 64,
            click: ClickConfig::default(),
        }
    }
}

/// Where beat events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatSource {
    /// The renderer's sample-accurate beat queue
    Audio,
    /// The coarse scheduler's beat deadlines
    Timer,
}

pub struct Metronome {
    config: MetronomeConfig,
    machine: SessionStateMachine,
    scheduler: CoarseScheduler,
    hub: BroadcastHub,
    cell: Arc<SessionCell>,
    audio: Option<AudioLink>,
    test_ends_at: Option<Instant>,
}

impl Metronome {
    pub fn new(config: MetronomeConfig, cell: Arc<SessionCell>) -> Self {
        let machine = SessionStateMachine::new(config.tempo_bpm);
        cell.publish(&machine.session(), machine.run_epoch());
        Self {
            scheduler: CoarseScheduler::new(config.tempo_bpm, config.scheduler.clone()),
            hub: BroadcastHub::new(config.failure_threshold),
            machine,
            cell,
            audio: None,
            test_ends_at: None,
            config,
        }
    }

    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.machine.session()
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn beat_source(&self) -> BeatSource {
        if self.audio.is_some() {
            BeatSource::Audio
        } else {
            BeatSource::Timer
        }
    }

    pub fn attach(&mut self, id: ConsumerId, consumer: Box<dyn Consumer>) -> AttachOutcome {
        let snapshot = self.machine.session();
        self.hub.attach(id, consumer, &snapshot)
    }

    pub fn detach(&mut self, id: ConsumerId) -> bool {
        self.hub.detach(id)
    }

    /// Switch beat delivery to a (new) render path
    pub fn link_audio(&mut self, mut link: AudioLink) {
        // Anything queued before the switch belongs to no current run
        link.drain(|_| {});
        self.audio = Some(link);
        log::info!("Beat source: audio");
    }

    pub fn apply(&mut self, command: Command, now: Instant) {
        if let Some(transition) = self.machine.apply(command) {
            self.commit(transition, now);
        } else {
            log::debug!(
                "No change from {:?} in state {}",
                command,
                self.machine.state().name()
            );
        }
    }

    /// One scheduler step; call on every poll interval
    pub fn poll(&mut self, now: Instant) {
        self.check_audio();
        self.forward_audio_beats();

        if self.test_ends_at.is_some_and(|end| now >= end) {
            self.test_ends_at = None;
            if let Some(transition) = self.machine.finish_test() {
                self.commit(transition, now);
                self.hub.broadcast(&Event::TestFinished);
            }
        }

        let outcome = self.scheduler.poll(now);
        if outcome.resynced {
            if let Some(tick) = self.scheduler.scheduled() {
                log::debug!(
                    "Timer beats realigned, total correction {:?}",
                    tick.accumulated_drift_correction
                );
            }
        }

        for _ in 0..outcome.seconds {
            match self.machine.advance_second() {
                Some(Advance::Ticked(elapsed_seconds)) => {
                    self.hub.broadcast(&Event::Tick { elapsed_seconds });
                    let every = self.config.notify_every_seconds;
                    if every > 0 && elapsed_seconds % every == 0 {
                        log::info!("Periodic notification at {}s", elapsed_seconds);
                        self.hub
                            .broadcast(&Event::PeriodicNotification { elapsed_seconds });
                    }
                }
                Some(Advance::Completed(transition)) => {
                    let elapsed_seconds = transition.session.elapsed_seconds;
                    self.hub.broadcast(&Event::Tick { elapsed_seconds });
                    self.commit(transition, now);
                    log::info!("Session completed after {}s", elapsed_seconds);
                    self.hub.broadcast(&Event::Completed { elapsed_seconds });
                    break;
                }
                None => break,
            }
        }

        if let Some(beat) = outcome.beat {
            if self.machine.state() == SessionState::Running
                && self.beat_source() == BeatSource::Timer
            {
                log::trace!("Timer beat (tone {})", beat.tone_parity);
                self.hub.broadcast(&Event::Beat {
                    tone_parity: beat.tone_parity,
                });
            }
        }
    }

    fn commit(&mut self, transition: Transition, now: Instant) {
        let Transition { from, to, session } = transition;
        self.cell.publish(&session, self.machine.run_epoch());

        if from != to {
            if to == SessionState::Running {
                self.scheduler.arm(now);
                if session.mode == SessionMode::Test && from == SessionState::CountingDown {
                    self.test_ends_at = Some(now + self.config.test_duration);
                }
            } else {
                self.scheduler.disarm();
                self.test_ends_at = None;
            }
        }

        self.hub.broadcast(&Event::StateChanged(session));

        if from == SessionState::Idle
            && to == SessionState::CountingDown
            && session.mode == SessionMode::Test
        {
            self.hub.broadcast(&Event::TestStarted);
        }
    }

    fn check_audio(&mut self) {
        if self.audio.as_ref().is_some_and(|link| link.is_faulted()) {
            log::warn!("Render path faulted; falling back to timer beats");
            self.audio = None;
        }
    }

    fn forward_audio_beats(&mut self) {
        let Some(link) = self.audio.as_mut() else {
            return;
        };
        let running = self.machine.session().is_running();
        let hub = &mut self.hub;
        link.drain(|beat| {
            // Beats rendered just before a pause or reset are stale
            if running {
                hub.broadcast(&Event::Beat {
                    tone_parity: beat.tone_parity,
                });
            }
        });
    }
}
