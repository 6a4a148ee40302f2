//! Ready-made consumers

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use super::{Consumer, DeliveryError, Event};

/// Forwards events into a bounded channel without ever blocking
///
/// The receiving side (a window, a socket writer, another thread) drains
/// at its own pace. A full channel counts as a failed delivery; a dropped
/// receiver closes the consumer.
pub struct ChannelConsumer {
    name: String,
    sender: Sender<Event>,
}

impl ChannelConsumer {
    pub fn bounded(name: &str, capacity: usize) -> (Self, Receiver<Event>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        (
            Self {
                name: name.to_string(),
                sender,
            },
            receiver,
        )
    }
}

impl Consumer for ChannelConsumer {
    fn deliver(&mut self, event: &Event) -> Result<(), DeliveryError> {
        match self.sender.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryError::Full),
            Err(TrySendError::Disconnected(_)) => Err(DeliveryError::Closed),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Receiving end of a `ChannelConsumer` that notices when the hub has
/// pruned its sender
///
/// A pruned consumer's sender is dropped, so the channel reads as
/// disconnected once the backlog is drained. `drain` then opens a fresh
/// channel and hands back the new consumer; attaching it brings a full
/// snapshot.
pub struct Subscription {
    name: String,
    capacity: usize,
    receiver: Receiver<Event>,
}

impl Subscription {
    pub fn new(name: &str, capacity: usize) -> (Self, ChannelConsumer) {
        let (consumer, receiver) = ChannelConsumer::bounded(name, capacity);
        (
            Self {
                name: name.to_string(),
                capacity,
                receiver,
            },
            consumer,
        )
    }

    /// Hand every queued event to `f`, oldest first
    ///
    /// Returns a replacement consumer when the old one is gone; the caller
    /// must attach it to keep receiving events.
    pub fn drain<F: FnMut(Event)>(&mut self, mut f: F) -> Option<ChannelConsumer> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => f(event),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Consumer {} was dropped by the hub; resubscribing", self.name);
                    let (consumer, receiver) = ChannelConsumer::bounded(&self.name, self.capacity);
                    self.receiver = receiver;
                    return Some(consumer);
                }
            }
        }
    }
}

/// Writes each event as one JSON line through the `log` facade
pub struct LogConsumer {
    /// Beats arrive three times a second; they are logged at trace level
    quiet_beats: bool,
}

impl LogConsumer {
    pub fn new(quiet_beats: bool) -> Self {
        Self { quiet_beats }
    }
}

impl Consumer for LogConsumer {
    fn deliver(&mut self, event: &Event) -> Result<(), DeliveryError> {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Failed to serialize {} event: {}", event.name(), e);
                return Ok(());
            }
        };
        match event {
            Event::Beat { .. } | Event::Tick { .. } if self.quiet_beats => log::trace!("{}", line),
            _ => log::info!("{}", line),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers_in_order() {
        let (mut consumer, rx) = ChannelConsumer::bounded("ui", 4);
        consumer.deliver(&Event::TestStarted).unwrap();
        consumer.deliver(&Event::Beat { tone_parity: true }).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Event::TestStarted);
        assert_eq!(rx.try_recv().unwrap(), Event::Beat { tone_parity: true });
    }

    #[test]
    fn test_full_channel_reports_full() {
        let (mut consumer, _rx) = ChannelConsumer::bounded("ui", 1);
        assert!(consumer.deliver(&Event::TestStarted).is_ok());
        assert_eq!(consumer.deliver(&Event::TestFinished), Err(DeliveryError::Full));
    }

    #[test]
    fn test_dropped_receiver_reports_closed() {
        let (mut consumer, rx) = ChannelConsumer::bounded("ui", 4);
        drop(rx);
        assert_eq!(consumer.deliver(&Event::TestStarted), Err(DeliveryError::Closed));
    }

    #[test]
    fn test_subscription_resubscribes_after_sender_drops() {
        let (mut subscription, mut consumer) = Subscription::new("ui", 4);
        consumer.deliver(&Event::TestStarted).unwrap();

        let mut seen = Vec::new();
        assert!(subscription.drain(|e| seen.push(e)).is_none());
        assert_eq!(seen, vec![Event::TestStarted]);

        consumer.deliver(&Event::TestFinished).unwrap();
        drop(consumer);
        let mut fresh = subscription.drain(|e| seen.push(e)).unwrap();
        // Backlog is still delivered before the switch
        assert_eq!(seen.last(), Some(&Event::TestFinished));

        fresh.deliver(&Event::Beat { tone_parity: true }).unwrap();
        seen.clear();
        assert!(subscription.drain(|e| seen.push(e)).is_none());
        assert_eq!(seen, vec![Event::Beat { tone_parity: true }]);
    }

    #[test]
    fn test_log_consumer_never_fails() {
        let mut consumer = LogConsumer::new(true);
        assert!(consumer.deliver(&Event::Beat { tone_parity: false }).is_ok());
        assert!(consumer.deliver(&Event::Completed { elapsed_seconds: 60 }).is_ok());
    }
}
