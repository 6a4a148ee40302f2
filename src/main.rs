//! cadence-rs - Session-timed metronome
//!
//! Plays a two-tone click at a fixed tempo for a timed session, with a
//! countdown before the run and periodic notifications while it lasts.
//!
//! Three execution contexts cooperate:
//! - the cpal audio callback renders clicks sample-accurately
//! - the scheduler thread owns the session and broadcasts events
//! - the egui thread draws the controls and sends commands

use std::sync::Arc;
use std::time::Instant;

use eframe::egui;

use cadence_rs::audio::AudioEngine;
use cadence_rs::broadcast::{Event, LogConsumer, Subscription};
use cadence_rs::metronome::Metronome;
use cadence_rs::render::{
    format_mmss, BeatIndicator, Countdown, Notifications, COMPLETION_DURATION, NOTIFY_DURATION,
};
use cadence_rs::runtime::MetronomeHandle;
use cadence_rs::session::{
    Command, Session, SessionCell, SessionMode, SessionState, SessionStateMachine,
    MAX_TARGET_MINUTES, MIN_TARGET_MINUTES,
};
use cadence_rs::settings::AppSettings;

/// Capacity of the UI's event channel
const UI_EVENT_CAPACITY: usize = 256;

fn main() -> eframe::Result<()> {
    env_logger::init();
    log::info!("Starting cadence-rs");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 420.0])
            .with_title("cadence-rs"),
        ..Default::default()
    };

    eframe::run_native(
        "cadence-rs",
        options,
        Box::new(|cc| Ok(Box::new(CadenceApp::new(cc)?))),
    )
}

struct CadenceApp {
    settings: AppSettings,
    audio: AudioEngine,
    metronome: MetronomeHandle,
    /// UI event stream; renewed if the hub ever prunes it
    events: Subscription,

    /// Latest snapshot seen on the event stream
    session: Session,

    indicator: BeatIndicator,
    countdown: Option<Countdown>,
    notifications: Notifications,
}

impl CadenceApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> std::io::Result<Self> {
        let settings = AppSettings::load();
        let config = settings.metronome_config();
        let cell = Arc::new(SessionCell::new());

        let mut audio = AudioEngine::new(
            Arc::clone(&cell),
            config.tempo_bpm,
            config.click.clone(),
            config.beat_queue_capacity,
        );
        let tempo_bpm = config.tempo_bpm;
        let mut core = Metronome::new(config, cell);
        match audio.start() {
            Ok(link) => core.link_audio(link),
            Err(e) => log::warn!("Continuing without audio ({}); beats come from the timer", e),
        }

        let metronome = MetronomeHandle::spawn(core)?;
        let (events, consumer) = Subscription::new("ui", UI_EVENT_CAPACITY);
        metronome.attach(Box::new(consumer));
        metronome.attach(Box::new(LogConsumer::new(true)));

        Ok(Self {
            settings,
            audio,
            metronome,
            events,
            session: SessionStateMachine::new(tempo_bpm).session(),
            indicator: BeatIndicator::new(),
            countdown: None,
            notifications: Notifications::default(),
        })
    }

    fn drain_events(&mut self, now: Instant) {
        let mut events = Vec::new();
        if let Some(consumer) = self.events.drain(|event| events.push(event)) {
            // Attaching pushes a fresh snapshot, so the display catches up
            self.metronome.attach(Box::new(consumer));
        }
        for event in events {
            self.on_event(event, now);
        }
    }

    fn on_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::StateChanged(session) => {
                let previous = self.session.state;
                self.session = session;
                match session.state {
                    SessionState::CountingDown if previous != SessionState::CountingDown => {
                        self.countdown = Some(Countdown::new(now));
                    }
                    SessionState::CountingDown => {}
                    SessionState::Idle => {
                        self.countdown = None;
                        self.indicator.clear();
                    }
                    _ => self.countdown = None,
                }
            }
            Event::Beat { tone_parity } => self.indicator.on_beat(tone_parity, now),
            Event::Tick { elapsed_seconds } => self.session.elapsed_seconds = elapsed_seconds,
            Event::PeriodicNotification { elapsed_seconds } => {
                self.notifications.show(
                    format!("{} elapsed", format_mmss(elapsed_seconds)),
                    NOTIFY_DURATION,
                    now,
                );
            }
            Event::Completed { elapsed_seconds } => {
                self.notifications.show(
                    format!("Session complete ({})", format_mmss(elapsed_seconds)),
                    COMPLETION_DURATION,
                    now,
                );
            }
            Event::TestStarted => self.notifications.clear(),
            Event::TestFinished => {
                self.notifications
                    .show("Sound test finished", NOTIFY_DURATION, now);
            }
        }
    }

    fn start(&self) {
        self.metronome.send(Command::Start {
            target_minutes: self.settings.target_minutes,
            volume_percent: self.settings.volume_percent,
        });
    }

    fn reconnect_audio(&mut self) {
        if let Ok(link) = self.audio.start() {
            self.metronome.link_audio(link);
        }
    }

    fn save_settings_after(&self, response: &egui::Response) {
        if response.drag_stopped() || (response.changed() && !response.dragged()) {
            self.settings.save();
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let idle = matches!(
            self.session.state,
            SessionState::Idle | SessionState::Completed
        );

        let minutes = ui.add_enabled(
            idle,
            egui::Slider::new(
                &mut self.settings.target_minutes,
                MIN_TARGET_MINUTES..=MAX_TARGET_MINUTES,
            )
            .text("Minutes"),
        );
        self.save_settings_after(&minutes);

        let volume = ui.add(
            egui::Slider::new(&mut self.settings.volume_percent, 0..=100).text("Volume %"),
        );
        if volume.changed() {
            self.metronome
                .send(Command::SetVolume(self.settings.volume_percent));
        }
        self.save_settings_after(&volume);

        ui.add_space(8.0);
        ui.horizontal(|ui| match self.session.state {
            SessionState::Idle => {
                if ui.button("▶ Start").clicked() {
                    self.start();
                }
                if ui.button("🔊 Test").clicked() {
                    self.metronome
                        .send(Command::Test(self.settings.volume_percent));
                }
            }
            SessionState::CountingDown => {
                if ui.button("⏹ Reset").clicked() {
                    self.metronome.send(Command::Reset);
                }
            }
            SessionState::Running => {
                if self.session.mode == SessionMode::Timed && ui.button("⏸ Pause").clicked() {
                    self.metronome.send(Command::Pause);
                }
                if ui.button("⏹ Reset").clicked() {
                    self.metronome.send(Command::Reset);
                }
            }
            SessionState::Paused => {
                if ui.button("▶ Resume").clicked() {
                    self.metronome.send(Command::Resume);
                }
                if ui.button("⏹ Reset").clicked() {
                    self.metronome.send(Command::Reset);
                }
            }
            SessionState::Completed => {
                if ui.button("✔ OK").clicked() {
                    self.metronome.send(Command::Acknowledge);
                }
                if ui.button("▶ Start again").clicked() {
                    self.start();
                }
            }
        });
    }

    fn session_display(&self, ui: &mut egui::Ui, now: Instant) {
        ui.vertical_centered(|ui| {
            ui.add_space(12.0);
            self.indicator.show(ui, now);
            ui.add_space(8.0);

            let elapsed = format_mmss(self.session.elapsed_seconds);
            let clock = match self.session.mode {
                SessionMode::Test => "Test".to_string(),
                SessionMode::Timed => {
                    format!("{} / {}", elapsed, format_mmss(self.session.target_seconds))
                }
            };
            ui.label(egui::RichText::new(clock).size(36.0).monospace());
            if self.session.mode == SessionMode::Timed && self.session.state != SessionState::Idle {
                ui.small(format!(
                    "{} remaining",
                    format_mmss(self.session.remaining_seconds())
                ));
            }
            ui.label(format!(
                "{} · {} BPM",
                self.session.state.name(),
                self.session.tempo_bpm
            ));
        });
    }
}

impl eframe::App for CadenceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();
        let now = Instant::now();

        self.drain_events(now);

        if self.countdown.is_some_and(|c| c.is_finished(now)) {
            self.countdown = None;
            self.metronome.send(Command::CountdownComplete);
        }

        // Top panel
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("cadence-rs");
                ui.separator();
                ui.label(&self.audio.status);
                if !self.audio.is_active() {
                    ui.separator();
                    ui.small("timer beats");
                    if ui.button("Reconnect audio").clicked() {
                        self.reconnect_audio();
                    }
                }
            });
        });

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            self.controls(ui);
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.session_display(ui, now);
            self.notifications.paint(ui, now);
            if let Some(countdown) = &self.countdown {
                countdown.paint(ui, now);
            }
        });
    }
}
