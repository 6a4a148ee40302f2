//! Click synthesis
//!
//! One click is an attack sample at full amplitude followed by a short
//! exponentially decaying sine tail. Both tones are rendered into tables
//! once, outside the audio callback, so rendering is a table lookup.

use std::f32::consts::TAU;

/// Shape of the two-tone click
#[derive(Clone, Debug)]
pub struct ClickConfig {
    /// Tone for beats with parity `true` (Hz)
    pub high_hz: f32,
    /// Tone for beats with parity `false` (Hz)
    pub low_hz: f32,
    /// Length of the decaying tail in milliseconds; silence after it
    pub tail_ms: f32,
    /// Decay time constant as a fraction of the tail length
    pub decay_ratio: f32,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            high_hz: 1000.0,
            low_hz: 800.0,
            tail_ms: 20.0,
            decay_ratio: 0.2,
        }
    }
}

/// Pre-rendered click tables for one sample rate
pub struct ClickSynth {
    high: Vec<f32>,
    low: Vec<f32>,
}

impl ClickSynth {
    pub fn new(config: &ClickConfig, sample_rate: u32) -> Self {
        let len = ((sample_rate as f32 * config.tail_ms / 1000.0) as usize).max(1);
        let tau = (len as f32 * config.decay_ratio).max(1.0);
        Self {
            high: render_table(config.high_hz, sample_rate, len, tau),
            low: render_table(config.low_hz, sample_rate, len, tau),
        }
    }

    /// Click length in samples (attack included)
    pub fn len(&self) -> usize {
        self.high.len()
    }

    /// Un-scaled click value at a position within the beat
    pub fn sample(&self, sample_in_beat: u32, tone_parity: bool) -> f32 {
        let table = if tone_parity { &self.high } else { &self.low };
        table.get(sample_in_beat as usize).copied().unwrap_or(0.0)
    }
}

fn render_table(freq: f32, sample_rate: u32, len: usize, tau: f32) -> Vec<f32> {
    let rate = sample_rate.max(1) as f32;
    (0..len)
        .map(|i| {
            if i == 0 {
                1.0
            } else {
                let t = i as f32 / rate;
                (TAU * freq * t).sin() * (-(i as f32) / tau).exp()
            }
        })
        .collect()
}
