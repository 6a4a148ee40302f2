//! Beat event queue between the render thread and the coarse scheduler
//!
//! A bounded single-producer single-consumer ring buffer:
//! - Producer (audio thread): `BeatSender::send()` never blocks or allocates
//! - Consumer (scheduler thread): `BeatReceiver::drain()` takes everything queued
//!
//! When the scheduler falls behind and the queue fills up, the newest
//! event is dropped rather than stalling the audio callback.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// One beat produced by the renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatEvent {
    /// `true` selects the high tone
    pub tone_parity: bool,
    /// Beats since the current run started
    pub beat_index: u64,
}

/// Create a connected sender/receiver pair holding at most `capacity` events
pub fn beat_queue(capacity: usize) -> (BeatSender, BeatReceiver) {
    let (producer, consumer) = HeapRb::<BeatEvent>::new(capacity.max(1)).split();
    (
        BeatSender {
            producer,
            dropped: 0,
        },
        BeatReceiver { consumer },
    )
}

/// Render-side half of the queue
pub struct BeatSender {
    producer: HeapProd<BeatEvent>,
    /// Events lost to a full queue
    dropped: u64,
}

impl BeatSender {
    /// Queue an event; returns `false` if it was dropped
    pub fn send(&mut self, event: BeatEvent) -> bool {
        match self.producer.try_push(event) {
            Ok(()) => true,
            Err(_) => {
                self.dropped += 1;
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Scheduler-side half of the queue
pub struct BeatReceiver {
    consumer: HeapCons<BeatEvent>,
}

impl BeatReceiver {
    /// Hand every queued event to `f`, oldest first
    pub fn drain<F: FnMut(BeatEvent)>(&mut self, mut f: F) {
        while let Some(event) = self.consumer.try_pop() {
            f(event);
        }
    }

    pub fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }
}
