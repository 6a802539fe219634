//! Metric instruments for redq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op, so recording
//! is always safe. All counters carry a `channel` label.

use opentelemetry::metrics::{Counter, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("redq")
}

fn counter(name: &'static str, description: &'static str) -> Counter<u64> {
    meter()
        .u64_counter(name)
        .with_description(description)
        .build()
}

/// Counter: messages popped from a watched channel.
pub fn messages_received() -> Counter<u64> {
    counter("redq.messages.received", "Messages popped from a channel")
}

/// Counter: messages acknowledged by their handler.
pub fn messages_acknowledged() -> Counter<u64> {
    counter(
        "redq.messages.acknowledged",
        "Messages acknowledged by a handler",
    )
}

/// Counter: unacknowledged messages pushed back for redelivery.
pub fn messages_requeued() -> Counter<u64> {
    counter("redq.messages.requeued", "Messages requeued for redelivery")
}

/// Counter: messages dropped at the nesting limit.
pub fn messages_discarded() -> Counter<u64> {
    counter(
        "redq.messages.discarded",
        "Messages discarded at the nesting limit",
    )
}

/// Counter: raw payloads wrapped into tracked messages.
pub fn messages_upgraded() -> Counter<u64> {
    counter(
        "redq.messages.upgraded",
        "Raw payloads wrapped with a message id",
    )
}

/// Counter: in-flight copies moved back to their channel at startup.
pub fn messages_recovered() -> Counter<u64> {
    counter(
        "redq.messages.recovered",
        "In-flight copies recovered from temporary channels",
    )
}
