//! Broadcast module - fans session events out to consumers
//!
//! This module provides:
//! - `Event`, everything a consumer can be told
//! - `Consumer` trait for anything that receives events
//! - `BroadcastHub` holding the live consumer set
//! - Channel- and log-backed consumers, and a self-renewing `Subscription`

mod consumers;
mod event;
mod hub;

pub use consumers::{ChannelConsumer, LogConsumer, Subscription};
pub use event::Event;
pub use hub::{AttachOutcome, BroadcastHub, BroadcastReport, Consumer, ConsumerId, DeliveryError};
