//! Beat renderer - runs inside the audio callback
//!
//! For every output frame the renderer reads the published session view,
//! asks the `BeatClock` where the frame falls in the beat grid, queues a
//! `BeatEvent` at the top of each beat and writes the click sample scaled
//! by the session volume.
//!
//! The callback never blocks, allocates or logs. Anything unexpected
//! (degenerate grid, full event queue) degrades to silence or a dropped
//! event.

use std::sync::Arc;

use cpal::{FromSample, Sample};

use super::beats::{BeatEvent, BeatSender};
use super::click::{ClickConfig, ClickSynth};
use super::clock::{BeatClock, BeatPhase};
use crate::session::{RenderGate, SessionCell};

pub struct BeatRenderer {
    clock: BeatClock,
    synth: ClickSynth,
    cell: Arc<SessionCell>,
    beats: BeatSender,
    /// Frames rendered since the current run started
    frames: u64,
    /// Run epoch the frame counter belongs to
    epoch: Option<u32>,
}

impl BeatRenderer {
    pub fn new(
        sample_rate: u32,
        tempo_bpm: u32,
        click: &ClickConfig,
        cell: Arc<SessionCell>,
        beats: BeatSender,
    ) -> Self {
        Self {
            clock: BeatClock::new(sample_rate, tempo_bpm),
            synth: ClickSynth::new(click, sample_rate),
            cell,
            beats,
            frames: 0,
            epoch: None,
        }
    }

    /// Fill an interleaved output buffer
    ///
    /// The click is mono; every channel of a frame gets the same value.
    pub fn render<T: Sample + FromSample<f32>>(&mut self, data: &mut [T], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            let gate = self.cell.load();
            let value = T::from_sample(self.next_sample(gate));
            for sample in frame.iter_mut() {
                *sample = value;
            }
        }
    }

    /// Phase the next audible frame will be rendered at
    pub fn phase(&self) -> Option<BeatPhase> {
        self.clock.phase_at(self.frames)
    }

    /// Beat events lost because the scheduler did not drain in time
    pub fn dropped_beats(&self) -> u64 {
        self.beats.dropped()
    }

    fn next_sample(&mut self, gate: RenderGate) -> f32 {
        if !gate.is_audible() {
            return 0.0;
        }

        // A new run (start or resume) begins at the top of a beat
        if self.epoch != Some(gate.run_epoch) {
            self.epoch = Some(gate.run_epoch);
            self.frames = 0;
        }

        let Some(phase) = self.clock.phase_at(self.frames) else {
            return 0.0;
        };

        if phase.is_beat_start() {
            self.beats.send(BeatEvent {
                tone_parity: phase.tone_parity,
                beat_index: phase.beat_index,
            });
        }
        self.frames += 1;

        self.synth.sample(phase.current_sample_in_beat, phase.tone_parity) * gate.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::beats::{beat_queue, BeatReceiver};
    use crate::session::SessionStateMachine;

    const RATE: u32 = 48_000;
    const BLOCK: usize = 512;

    struct Rig {
        machine: SessionStateMachine,
        cell: Arc<SessionCell>,
        renderer: BeatRenderer,
        beats: BeatReceiver,
    }

    impl Rig {
        fn new() -> Self {
            let cell = Arc::new(SessionCell::new());
            let (tx, rx) = beat_queue(1024);
            let renderer = BeatRenderer::new(RATE, 180, &ClickConfig::default(), cell.clone(), tx);
            Self {
                machine: SessionStateMachine::default(),
                cell,
                renderer,
                beats: rx,
            }
        }

        fn publish(&self) {
            self.cell
                .publish(&self.machine.session(), self.machine.run_epoch());
        }

        fn run(&mut self, volume_percent: u32) {
            self.machine.start(10, volume_percent);
            self.machine.countdown_complete();
            self.publish();
        }

        fn render_frames(&mut self, frames: usize, channels: usize) -> Vec<f32> {
            let mut out = Vec::with_capacity(frames * channels);
            let mut remaining = frames;
            while remaining > 0 {
                let n = remaining.min(BLOCK);
                let mut buf = vec![0.5f32; n * channels];
                self.renderer.render(&mut buf, channels);
                out.extend_from_slice(&buf);
                remaining -= n;
            }
            out
        }

        fn take_beats(&mut self) -> Vec<BeatEvent> {
            let mut seen = Vec::new();
            self.beats.drain(|e| seen.push(e));
            seen
        }
    }

    #[test]
    fn test_silent_until_running() {
        let mut rig = Rig::new();
        let out = rig.render_frames(2048, 2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(rig.take_beats().is_empty());

        rig.machine.start(10, 50);
        rig.publish();
        let out = rig.render_frames(2048, 1);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(rig.take_beats().is_empty());
    }

    #[test]
    fn test_beat_every_samples_per_beat() {
        let mut rig = Rig::new();
        rig.run(50);

        // 10 beats at 16000 samples each, plus one sample into the 11th
        rig.render_frames(16_000 * 10 + 1, 1);
        let beats = rig.take_beats();
        assert_eq!(beats.len(), 11);
        for (i, beat) in beats.iter().enumerate() {
            assert_eq!(beat.beat_index, i as u64);
            assert_eq!(beat.tone_parity, i % 2 == 0);
        }
    }

    #[test]
    fn test_click_shape_and_volume() {
        let mut rig = Rig::new();
        rig.run(50);
        let out = rig.render_frames(16_000, 1);

        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!(out[1..960].iter().any(|&s| s.abs() > 0.01));
        assert!(out[960..].iter().all(|&s| s == 0.0));
        assert!(out.iter().all(|&s| s.abs() <= 0.5 + 1e-6));
    }

    #[test]
    fn test_channels_carry_same_sample() {
        let mut rig = Rig::new();
        rig.run(100);
        let out = rig.render_frames(64, 2);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn test_volume_change_applies_next_sample() {
        let mut rig = Rig::new();
        rig.run(100);
        rig.render_frames(16_000, 1);

        rig.machine.set_volume(25);
        rig.publish();
        let out = rig.render_frames(1, 1);
        assert!((out[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_pause_holds_and_resume_restarts_beat() {
        let mut rig = Rig::new();
        rig.run(50);
        rig.render_frames(20_000, 1);
        assert_eq!(rig.take_beats().len(), 2);
        let held = rig.renderer.phase().unwrap();
        assert_eq!(held.current_sample_in_beat, 4_000);

        rig.machine.pause();
        rig.publish();
        let out = rig.render_frames(30_000, 1);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(rig.take_beats().is_empty());
        assert_eq!(rig.renderer.phase(), Some(held));

        rig.machine.resume();
        rig.publish();
        let out = rig.render_frames(1, 1);
        assert!((out[0] - 0.5).abs() < 1e-6);
        let beats = rig.take_beats();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].beat_index, 0);
        assert!(beats[0].tone_parity);
    }

    #[test]
    fn test_reset_silences_within_one_buffer() {
        let mut rig = Rig::new();
        rig.run(50);
        rig.render_frames(BLOCK, 1);

        rig.machine.reset();
        rig.publish();
        let out = rig.render_frames(BLOCK, 1);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let cell = Arc::new(SessionCell::new());
        let (tx, _rx) = beat_queue(2);
        let mut renderer = BeatRenderer::new(RATE, 180, &ClickConfig::default(), cell.clone(), tx);
        let mut machine = SessionStateMachine::default();
        machine.start(10, 50);
        machine.countdown_complete();
        cell.publish(&machine.session(), machine.run_epoch());

        let mut buf = vec![0.0f32; 16_000 * 5];
        renderer.render(&mut buf, 1);
        assert_eq!(renderer.dropped_beats(), 3);
    }

    #[test]
    fn test_degenerate_grid_renders_silence() {
        let cell = Arc::new(SessionCell::new());
        let (tx, mut rx) = beat_queue(4);
        let mut renderer = BeatRenderer::new(RATE, 0, &ClickConfig::default(), cell.clone(), tx);
        let mut machine = SessionStateMachine::new(0);
        machine.start(10, 50);
        machine.countdown_complete();
        cell.publish(&machine.session(), machine.run_epoch());

        let mut buf = vec![1.0f32; 256];
        renderer.render(&mut buf, 1);
        assert!(buf.iter().all(|&s| s == 0.0));
        let mut count = 0;
        rx.drain(|_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_integer_sample_formats() {
        let mut rig = Rig::new();
        rig.run(100);
        let mut buf = vec![0i16; 8];
        rig.renderer.render(&mut buf, 2);
        assert_eq!(buf[0], i16::MAX);
        assert_eq!(buf[1], i16::MAX);
    }
}
