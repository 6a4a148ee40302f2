//! Broadcast hub
//!
//! Holds the set of live consumers and delivers every event to each of
//! them. Delivery problems stay local to the consumer that caused them:
//! a failing consumer never stops the others from receiving the event.
//!
//! ## Pruning policy
//!
//! - `DeliveryError::Closed` is definitive and removes the consumer at once.
//! - Any other failure counts against the consumer; after
//!   `failure_threshold` consecutive failures it is removed.
//! - A successful delivery clears the count.
//!
//! Failed messages are never retried. A consumer that comes back must
//! attach again and receives a full snapshot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::Event;
use crate::session::Session;

/// Why a single delivery failed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("consumer is closed")]
    Closed,

    #[error("consumer is not keeping up")]
    Full,
}

impl DeliveryError {
    /// Whether the consumer can never accept another event
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryError::Closed)
    }
}

/// Anything that can receive broadcast events
///
/// `deliver` must return promptly; implementations hand the event off
/// (queue, channel, log line) rather than waiting on a slow receiver.
pub trait Consumer: Send {
    fn deliver(&mut self, event: &Event) -> Result<(), DeliveryError>;

    /// Label used in log messages
    fn name(&self) -> &str {
        "consumer"
    }
}

/// Opaque consumer identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// A process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an attach request was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    /// The id was already present; its consumer was replaced and resynced
    Reattached,
    /// The resync snapshot could not be delivered; the consumer was not added
    Rejected(DeliveryError),
}

/// Result of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
    pub pruned: Vec<ConsumerId>,
}

struct Entry {
    id: ConsumerId,
    consumer: Box<dyn Consumer>,
    /// Last snapshot this consumer is known to have received
    last_known_state: Option<Session>,
    consecutive_failures: u32,
}

pub struct BroadcastHub {
    entries: Vec<Entry>,
    failure_threshold: u32,
}

impl BroadcastHub {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            entries: Vec::new(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ConsumerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn last_known_state(&self, id: ConsumerId) -> Option<Session> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| e.last_known_state)
    }

    /// Add a consumer and immediately push the full current snapshot to it
    pub fn attach(
        &mut self,
        id: ConsumerId,
        mut consumer: Box<dyn Consumer>,
        snapshot: &Session,
    ) -> AttachOutcome {
        let reattach = self.detach_quietly(id);

        if let Err(e) = consumer.deliver(&Event::StateChanged(*snapshot)) {
            log::warn!(
                "Consumer {} ({}) rejected resync: {}",
                id,
                consumer.name(),
                e
            );
            return AttachOutcome::Rejected(e);
        }

        log::info!(
            "Consumer {} ({}) {}",
            id,
            consumer.name(),
            if reattach { "reattached" } else { "attached" }
        );
        self.entries.push(Entry {
            id,
            consumer,
            last_known_state: Some(*snapshot),
            consecutive_failures: 0,
        });

        if reattach {
            AttachOutcome::Reattached
        } else {
            AttachOutcome::Attached
        }
    }

    /// Remove a consumer; returns whether it was present
    pub fn detach(&mut self, id: ConsumerId) -> bool {
        let removed = self.detach_quietly(id);
        if removed {
            log::info!("Consumer {} detached", id);
        }
        removed
    }

    fn detach_quietly(&mut self, id: ConsumerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Deliver `event` to every consumer, pruning the ones that fail
    pub fn broadcast(&mut self, event: &Event) -> BroadcastReport {
        let threshold = self.failure_threshold;
        let mut report = BroadcastReport::default();

        // retain_mut visits each entry exactly once, so removals cannot
        // disturb the iteration
        self.entries.retain_mut(|entry| match entry.consumer.deliver(event) {
            Ok(()) => {
                report.delivered += 1;
                entry.consecutive_failures = 0;
                if let Event::StateChanged(session) = event {
                    entry.last_known_state = Some(*session);
                }
                true
            }
            Err(e) => {
                report.failed += 1;
                entry.consecutive_failures += 1;
                let keep = !e.is_terminal() && entry.consecutive_failures < threshold;
                if keep {
                    log::debug!(
                        "Delivery of {} to {} failed ({}), {} of {}",
                        event.name(),
                        entry.id,
                        e,
                        entry.consecutive_failures,
                        threshold
                    );
                } else {
                    log::warn!(
                        "Pruning consumer {} ({}): {}",
                        entry.id,
                        entry.consumer.name(),
                        e
                    );
                    report.pruned.push(entry.id);
                }
                keep
            }
        });

        report
    }
}
