//! Core data model.
//!
//! A message is one unit of work: a stable identity plus an opaque payload.
//! The identity is minted once and survives every requeue, which is what
//! lets the nesting counter follow a message across redeliveries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Suffix of the shadow list holding in-flight copies for a channel.
pub const TEMPORARY_SUFFIX: &str = ".temporary";

/// Name of the temporary channel paired with `channel`.
pub fn temporary_channel(channel: &str) -> String {
    format!("{channel}{TEMPORARY_SUFFIX}")
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A unit of work as stored on a channel.
///
/// Wire form is `{"uuid": "...", "data": "..."}`, fields in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    uuid: String,
    data: String,
}

impl Message {
    /// Wrap `data` in a new message with a freshly minted, time-ordered id.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::now_v7().to_string(),
            data: data.into(),
        }
    }

    /// Rebuild a message with a known identity.
    ///
    /// An empty `uuid` counts as no identity at all and a new one is minted.
    pub fn with_uuid(data: impl Into<String>, uuid: impl Into<String>) -> Self {
        let uuid = uuid.into();
        if uuid.is_empty() {
            return Self::new(data);
        }
        Self {
            uuid,
            data: data.into(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Encode to the wire form.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a raw list entry.
    ///
    /// Anything that is not a JSON object carrying string `uuid` and `data`
    /// fields comes back as [`Decoded::Raw`]; malformed input is never an
    /// error here.
    pub fn decode(raw: &str) -> Decoded {
        match serde_json::from_str::<Message>(raw) {
            Ok(wire) => Decoded::Tracked(Self::with_uuid(wire.data, wire.uuid)),
            Err(_) => Decoded::Raw(raw.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Decode result
// ---------------------------------------------------------------------------

/// Outcome of decoding a payload popped from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Payload already carries a message identity.
    Tracked(Message),
    /// Payload from a producer that pushes plain strings.
    Raw(String),
}

impl Decoded {
    /// Turn the decode result into a message, wrapping raw payloads.
    pub fn into_message(self) -> Message {
        match self {
            Decoded::Tracked(message) => message,
            Decoded::Raw(data) => Message::new(data),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Decoded::Raw(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_channel_appends_suffix() {
        assert_eq!(temporary_channel("jobs"), "jobs.temporary");
    }

    #[test]
    fn empty_uuid_is_replaced() {
        let message = Message::with_uuid("foo", "");
        assert!(!message.uuid().is_empty());
        assert_eq!(message.data(), "foo");
    }

    #[test]
    fn non_string_data_is_raw() {
        let decoded = Message::decode(r#"{"uuid":"abc","data":42}"#);
        assert!(decoded.is_raw());
    }

    #[test]
    fn extra_fields_are_ignored() {
        let decoded = Message::decode(r#"{"uuid":"abc","data":"x","priority":9}"#);
        assert_eq!(decoded, Decoded::Tracked(Message::with_uuid("x", "abc")));
    }
}
