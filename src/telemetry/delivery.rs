//! Delivery span helpers.
//!
//! One span per received message, covering dispatch through settlement.

use tracing::Span;

/// Start a span for handling one message.
///
/// The `delivery.outcome` field is declared empty and filled by
/// [`record_outcome`].
pub fn start_delivery_span(channel: &str, message_id: &str) -> Span {
    tracing::info_span!(
        "redq.deliver",
        "messaging.destination.name" = channel,
        "messaging.message.id" = message_id,
        "delivery.outcome" = tracing::field::Empty,
    )
}

/// Record how the delivery was settled ("acknowledged", "requeued", "discarded").
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("delivery.outcome", outcome);
}
