//! Countdown and notification overlays
//!
//! Pure timing logic; the app paints whatever `frame`/`current` return.

use std::time::{Duration, Instant};

use eframe::egui::{self, Align2, Color32, FontId};

const DIGIT_SHOW: Duration = Duration::from_millis(800);
const DIGIT_FADE: Duration = Duration::from_millis(200);
const GO_SHOW: Duration = Duration::from_secs(1);
const DIGITS: u32 = 3;

/// How long a periodic notification stays up
pub const NOTIFY_DURATION: Duration = Duration::from_secs(2);
/// How long the completion notice stays up
pub const COMPLETION_DURATION: Duration = Duration::from_secs(5);

/// Elapsed time as `MM:SS` (minutes are not wrapped at 60)
pub fn format_mmss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountdownStep {
    Digit(u32),
    Go,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownFrame {
    pub step: CountdownStep,
    pub alpha: f32,
}

/// The 3-2-1-Go sequence shown before a run starts
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    started: Instant,
}

impl Countdown {
    pub fn new(now: Instant) -> Self {
        Self { started: now }
    }

    pub fn total() -> Duration {
        (DIGIT_SHOW + DIGIT_FADE) * DIGITS + GO_SHOW
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= Self::total()
    }

    /// What to show at `now`, or `None` once the sequence is over
    pub fn frame(&self, now: Instant) -> Option<CountdownFrame> {
        let t = now.saturating_duration_since(self.started);
        let slot = DIGIT_SHOW + DIGIT_FADE;
        let index = (t.as_nanos() / slot.as_nanos()) as u32;

        if index < DIGITS {
            let within = t - slot * index;
            let alpha = if within < DIGIT_SHOW {
                1.0
            } else {
                1.0 - (within - DIGIT_SHOW).as_secs_f32() / DIGIT_FADE.as_secs_f32()
            };
            return Some(CountdownFrame {
                step: CountdownStep::Digit(DIGITS - index),
                alpha: alpha.clamp(0.0, 1.0),
            });
        }

        if t < Self::total() {
            Some(CountdownFrame {
                step: CountdownStep::Go,
                alpha: 1.0,
            })
        } else {
            None
        }
    }

    pub fn paint(&self, ui: &egui::Ui, now: Instant) {
        let Some(frame) = self.frame(now) else {
            return;
        };
        let text = match frame.step {
            CountdownStep::Digit(d) => d.to_string(),
            CountdownStep::Go => "Go".to_string(),
        };
        let color = Color32::WHITE.gamma_multiply(frame.alpha);
        ui.painter().text(
            ui.max_rect().center(),
            Align2::CENTER_CENTER,
            text,
            FontId::proportional(96.0),
            color,
        );
    }
}

struct Toast {
    text: String,
    until: Instant,
}

/// A single-slot notification banner; a new message replaces the old one
#[derive(Default)]
pub struct Notifications {
    current: Option<Toast>,
}

impl Notifications {
    pub fn show(&mut self, text: impl Into<String>, duration: Duration, now: Instant) {
        self.current = Some(Toast {
            text: text.into(),
            until: now + duration,
        });
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self, now: Instant) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|toast| now < toast.until)
            .map(|toast| toast.text.as_str())
    }

    pub fn paint(&self, ui: &egui::Ui, now: Instant) {
        let Some(text) = self.current(now) else {
            return;
        };
        let rect = ui.max_rect();
        ui.painter().text(
            egui::pos2(rect.center().x, rect.top() + 24.0),
            Align2::CENTER_TOP,
            text,
            FontId::proportional(22.0),
            Color32::from_rgb(255, 210, 90),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn test_format_mmss() {
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(65), "01:05");
        assert_eq!(format_mmss(3_600), "60:00");
        assert_eq!(format_mmss(180 * 60), "180:00");
    }

    #[test]
    fn test_countdown_sequence() {
        let start = Instant::now();
        let countdown = Countdown::new(start);
        assert_eq!(Countdown::total(), Duration::from_secs(4));

        let step = |ms| countdown.frame(at(start, ms)).map(|f| f.step);
        assert_eq!(step(0), Some(CountdownStep::Digit(3)));
        assert_eq!(step(999), Some(CountdownStep::Digit(3)));
        assert_eq!(step(1_000), Some(CountdownStep::Digit(2)));
        assert_eq!(step(2_500), Some(CountdownStep::Digit(1)));
        assert_eq!(step(3_000), Some(CountdownStep::Go));
        assert_eq!(step(3_999), Some(CountdownStep::Go));
        assert_eq!(step(4_000), None);
        assert!(countdown.is_finished(at(start, 4_000)));
        assert!(!countdown.is_finished(at(start, 3_999)));
    }

    #[test]
    fn test_digit_fades_out() {
        let start = Instant::now();
        let countdown = Countdown::new(start);
        let alpha = |ms| countdown.frame(at(start, ms)).unwrap().alpha;
        assert_eq!(alpha(700), 1.0);
        assert!((alpha(900) - 0.5).abs() < 1e-3);
        assert!(alpha(990) < 0.1);
        assert_eq!(alpha(1_000), 1.0);
    }

    #[test]
    fn test_notification_expires() {
        let start = Instant::now();
        let mut notes = Notifications::default();
        assert_eq!(notes.current(start), None);

        notes.show("05:00 elapsed", NOTIFY_DURATION, start);
        assert_eq!(notes.current(at(start, 1_999)), Some("05:00 elapsed"));
        assert_eq!(notes.current(at(start, 2_000)), None);

        notes.show("Done", COMPLETION_DURATION, start);
        notes.show("Newer", NOTIFY_DURATION, at(start, 100));
        assert_eq!(notes.current(at(start, 200)), Some("Newer"));
        notes.clear();
        assert_eq!(notes.current(at(start, 200)), None);
    }
}
