//! Events handed to application code on every delivery.
//!
//! A [`DeliveryEvent`] lives for exactly one dispatch. The handler flips the
//! acknowledgment flag; the broker reads it once the handler has returned.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::Message;

/// The kinds of notification the broker emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerEvent {
    /// A message was popped from a watched channel.
    MessageReceived,
    /// A message went unacknowledged too many times and was dropped.
    NestingLimit,
}

impl BrokerEvent {
    /// Stable event name, shared with other producers and consumers.
    pub const fn name(&self) -> &'static str {
        match self {
            BrokerEvent::MessageReceived => "redis-broker.message.received",
            BrokerEvent::NestingLimit => "redis-broker.message.nesting-limit",
        }
    }
}

impl std::fmt::Display for BrokerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Notification passed to listeners for a single delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryEvent {
    channel: String,
    message_id: String,
    data: String,
    received_at: DateTime<Utc>,
    acknowledged: bool,
}

impl DeliveryEvent {
    pub fn new(channel: impl Into<String>, message: &Message) -> Self {
        Self {
            channel: channel.into(),
            message_id: message.uuid().to_string(),
            data: message.data().to_string(),
            received_at: Utc::now(),
            acknowledged: false,
        }
    }

    /// Channel the message was popped from.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Payload as pushed by the producer.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Identity of the message; identical across redeliveries.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Mark the message as fully processed. It will not be requeued.
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }
}
