//! Runtime - hosts the `Metronome` on its own thread
//!
//! The UI talks to the scheduler thread only through a request channel.
//! The thread wakes on every request and on a fixed poll tick, so commands
//! are applied within one poll interval and never block the caller.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{select, Receiver, Sender};

use crate::audio::AudioLink;
use crate::broadcast::{Consumer, ConsumerId};
use crate::metronome::Metronome;
use crate::session::Command;

/// Everything the scheduler thread accepts
pub enum Request {
    Command(Command),
    Attach {
        id: ConsumerId,
        consumer: Box<dyn Consumer>,
    },
    Detach(ConsumerId),
    LinkAudio(AudioLink),
    Shutdown,
}

/// Owner-side handle; dropping it stops and joins the thread
pub struct MetronomeHandle {
    requests: Sender<Request>,
    thread: Option<JoinHandle<()>>,
}

impl MetronomeHandle {
    pub fn spawn(metronome: Metronome) -> std::io::Result<Self> {
        let (requests, inbox) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("coarse-scheduler".to_string())
            .spawn(move || run(metronome, inbox))?;
        Ok(Self {
            requests,
            thread: Some(thread),
        })
    }

    pub fn send(&self, command: Command) {
        self.request(Request::Command(command));
    }

    /// Register a consumer; it receives the current snapshot first
    pub fn attach(&self, consumer: Box<dyn Consumer>) -> ConsumerId {
        let id = ConsumerId::next();
        self.request(Request::Attach { id, consumer });
        id
    }

    pub fn detach(&self, id: ConsumerId) {
        self.request(Request::Detach(id));
    }

    pub fn link_audio(&self, link: AudioLink) {
        self.request(Request::LinkAudio(link));
    }

    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.request(Request::Shutdown);
        if thread.join().is_err() {
            log::error!("Scheduler thread panicked");
        }
    }

    fn request(&self, request: Request) {
        if self.requests.send(request).is_err() {
            log::warn!("Scheduler thread is gone; request dropped");
        }
    }
}

impl Drop for MetronomeHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(mut metronome: Metronome, inbox: Receiver<Request>) {
    let ticker = crossbeam_channel::tick(metronome.config().scheduler.poll_interval);
    log::info!("Scheduler thread started");

    loop {
        select! {
            recv(inbox) -> request => match request {
                Ok(Request::Shutdown) | Err(_) => break,
                Ok(request) => dispatch(&mut metronome, request, Instant::now()),
            },
            recv(ticker) -> _ => metronome.poll(Instant::now()),
        }
    }

    log::info!("Scheduler thread stopped");
}

fn dispatch(metronome: &mut Metronome, request: Request, now: Instant) {
    match request {
        Request::Command(command) => metronome.apply(command, now),
        Request::Attach { id, consumer } => {
            let outcome = metronome.attach(id, consumer);
            log::debug!("Consumer {} attach: {:?}", id, outcome);
        }
        Request::Detach(id) => {
            metronome.detach(id);
        }
        Request::LinkAudio(link) => metronome.link_audio(link),
        Request::Shutdown => {}
    }
}
