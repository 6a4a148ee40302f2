//! Beat indicator widget
//!
//! A dot that flashes on every beat event and decays back to a dim
//! resting color. High-tone beats flash green, low-tone beats blue.

use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, Stroke, Vec2};

/// Display settings for the indicator
#[derive(Clone)]
pub struct IndicatorSettings {
    pub high_color: Color32,
    pub low_color: Color32,
    pub rest_color: Color32,
    /// How long a flash takes to fade out
    pub decay: Duration,
    pub radius: f32,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            high_color: Color32::from_rgb(100, 255, 100),
            low_color: Color32::from_rgb(100, 150, 255),
            rest_color: Color32::from_rgb(40, 45, 50),
            decay: Duration::from_millis(150),
            radius: 40.0,
        }
    }
}

pub struct BeatIndicator {
    pub settings: IndicatorSettings,
    last_beat: Option<(Instant, bool)>,
    beats_seen: u64,
}

impl Default for BeatIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatIndicator {
    pub fn new() -> Self {
        Self {
            settings: IndicatorSettings::default(),
            last_beat: None,
            beats_seen: 0,
        }
    }

    pub fn on_beat(&mut self, tone_parity: bool, now: Instant) {
        self.last_beat = Some((now, tone_parity));
        self.beats_seen += 1;
    }

    pub fn clear(&mut self) {
        self.last_beat = None;
    }

    pub fn beats_seen(&self) -> u64 {
        self.beats_seen
    }

    /// Flash strength in 0..=1, linear decay from the last beat
    pub fn pulse(&self, now: Instant) -> f32 {
        let Some((at, _)) = self.last_beat else {
            return 0.0;
        };
        let age = now.saturating_duration_since(at).as_secs_f32();
        let decay = self.settings.decay.as_secs_f32();
        if decay <= 0.0 {
            return 0.0;
        }
        (1.0 - age / decay).clamp(0.0, 1.0)
    }

    pub fn color(&self, now: Instant) -> Color32 {
        let s = &self.settings;
        let Some((_, high)) = self.last_beat else {
            return s.rest_color;
        };
        let flash = if high { s.high_color } else { s.low_color };
        lerp_color(s.rest_color, flash, self.pulse(now))
    }

    pub fn show(&self, ui: &mut egui::Ui, now: Instant) -> egui::Response {
        let side = self.settings.radius * 2.0 + 8.0;
        let (response, painter) = ui.allocate_painter(Vec2::splat(side), egui::Sense::hover());
        let center = response.rect.center();
        let pulse = self.pulse(now);

        painter.circle_filled(
            center,
            self.settings.radius * (0.85 + 0.15 * pulse),
            self.color(now),
        );
        painter.circle_stroke(
            center,
            self.settings.radius,
            Stroke::new(1.0, Color32::from_gray(90)),
        );
        response
    }
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}
