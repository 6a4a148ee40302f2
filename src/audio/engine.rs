//! Audio engine - handles cpal audio output
//!
//! This module owns the platform output stream. Starting the engine builds
//! a `BeatRenderer`, moves it into the cpal callback and hands back an
//! `AudioLink`: the receiving end of the renderer's beat queue plus a flag
//! raised by the stream error callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use thiserror::Error;

use super::beats::{beat_queue, BeatEvent, BeatReceiver};
use super::click::ClickConfig;
use super::renderer::BeatRenderer;
use crate::session::SessionCell;

/// Errors that can occur while bringing up audio output
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No output device found")]
    NoDevice,

    #[error("Failed to get default output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("Failed to start stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("Unsupported sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}

/// Scheduler-side view of a running render path
pub struct AudioLink {
    beats: BeatReceiver,
    faulted: Arc<AtomicBool>,
}

impl AudioLink {
    pub fn new(beats: BeatReceiver, faulted: Arc<AtomicBool>) -> Self {
        Self { beats, faulted }
    }

    /// Whether the stream reported an error since it was built
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Relaxed)
    }

    pub fn drain<F: FnMut(BeatEvent)>(&mut self, f: F) {
        self.beats.drain(f);
    }
}

/// High-level audio output engine
pub struct AudioEngine {
    /// The audio output stream (kept alive to continue playback)
    stream: Option<cpal::Stream>,

    /// Published session view read by the render callback
    cell: Arc<SessionCell>,

    tempo_bpm: u32,
    click: ClickConfig,
    queue_capacity: usize,

    /// Set by the stream error callback of the current stream
    faulted: Arc<AtomicBool>,

    /// Status message
    pub status: String,
}

impl AudioEngine {
    pub fn new(
        cell: Arc<SessionCell>,
        tempo_bpm: u32,
        click: ClickConfig,
        queue_capacity: usize,
    ) -> Self {
        Self {
            stream: None,
            cell,
            tempo_bpm,
            click,
            queue_capacity,
            faulted: Arc::new(AtomicBool::new(false)),
            status: "Audio not started".to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some() && !self.is_faulted()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Relaxed)
    }

    /// Build (or rebuild) the output stream
    ///
    /// Any previous stream is dropped first. On failure the engine is left
    /// without a stream and `status` describes the error.
    pub fn start(&mut self) -> Result<AudioLink, AudioError> {
        self.stop();
        match self.open() {
            Ok((stream, link, description)) => {
                self.stream = Some(stream);
                self.status = description;
                log::info!("Audio started successfully");
                Ok(link)
            }
            Err(e) => {
                self.status = format!("Audio unavailable: {}", e);
                log::error!("Failed to start audio: {}", e);
                Err(e)
            }
        }
    }

    /// Drop the output stream
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::info!("Audio stopped");
        }
        self.status = "Audio stopped".to_string();
    }

    fn open(&mut self) -> Result<(cpal::Stream, AudioLink, String), AudioError> {
        log::info!("Starting audio engine...");

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using output device: {}", device_name);

        let supported = device.default_output_config()?;
        log::info!("Audio config: {:?}", supported);

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let (sender, receiver) = beat_queue(self.queue_capacity);
        let renderer = BeatRenderer::new(
            sample_rate,
            self.tempo_bpm,
            &self.click,
            Arc::clone(&self.cell),
            sender,
        );

        // Fresh flag per stream so a fault on an old stream never leaks
        let faulted = Arc::new(AtomicBool::new(false));
        self.faulted = Arc::clone(&faulted);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, channels, renderer, &faulted)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, channels, renderer, &faulted)?
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, channels, renderer, &faulted)?
            }
            format => return Err(AudioError::UnsupportedFormat(format)),
        };
        stream.play()?;

        let description = format!("{} @ {} Hz, {} ch", device_name, sample_rate, channels);
        Ok((stream, AudioLink::new(receiver, faulted), description))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut renderer: BeatRenderer,
    faulted: &Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let faulted = Arc::clone(faulted);
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            renderer.render(data, channels);
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
            faulted.store(true, Ordering::Relaxed);
        },
        None,
    )
}
