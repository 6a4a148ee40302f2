//! Beat clock - maps a sample index to a position within the beat grid
//!
//! The clock owns no time of its own. Given a fixed render sample rate `R`
//! and tempo `B`, a beat lasts `floor(R * 60 / B)` samples and the tone
//! alternates on every beat, starting with the high tone.

/// Position of one rendered sample within the beat grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatPhase {
    pub samples_per_beat: u32,
    /// In `[0, samples_per_beat)`
    pub current_sample_in_beat: u32,
    /// `true` selects the high tone
    pub tone_parity: bool,
    /// Beats completed since the phase origin
    pub beat_index: u64,
}

impl BeatPhase {
    /// The phase every run starts from
    pub fn origin(samples_per_beat: u32) -> Self {
        Self {
            samples_per_beat,
            current_sample_in_beat: 0,
            tone_parity: true,
            beat_index: 0,
        }
    }

    pub fn is_beat_start(&self) -> bool {
        self.current_sample_in_beat == 0
    }
}

/// Stateless beat grid for one sample rate and tempo
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatClock {
    samples_per_beat: u32,
}

impl BeatClock {
    pub fn new(sample_rate: u32, tempo_bpm: u32) -> Self {
        let samples_per_beat = if tempo_bpm == 0 {
            0
        } else {
            (sample_rate as u64 * 60 / tempo_bpm as u64).min(u32::MAX as u64) as u32
        };
        Self { samples_per_beat }
    }

    pub fn samples_per_beat(&self) -> u32 {
        self.samples_per_beat
    }

    /// Phase of the `frame`-th sample since the phase origin.
    ///
    /// Returns `None` for a degenerate grid (zero tempo or a sample rate too
    /// low to hold one sample per beat).
    pub fn phase_at(&self, frame: u64) -> Option<BeatPhase> {
        if self.samples_per_beat == 0 {
            return None;
        }
        let spb = self.samples_per_beat as u64;
        let beat_index = frame / spb;
        Some(BeatPhase {
            samples_per_beat: self.samples_per_beat,
            current_sample_in_beat: (frame % spb) as u32,
            tone_parity: beat_index % 2 == 0,
            beat_index,
        })
    }
}
