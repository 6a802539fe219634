//! Broker: blocking receive loop with crash-safe in-flight copies.
//!
//! Every popped item is first copied to `<channel>.temporary`. The copy is
//! removed only once the handler has returned and the item has either been
//! acknowledged, requeued, or discarded at the nesting limit. A process that
//! dies anywhere in between leaves the copy behind, and the next
//! [`Broker::flush_temporary`] moves it back onto the channel.

use std::num::NonZeroU32;
use std::sync::Arc;

use opentelemetry::KeyValue;
use tracing::{Instrument, debug, info, warn};

use crate::dispatch::{Dispatcher, EventDispatcher};
use crate::error::{Error, Result};
use crate::event::{BrokerEvent, DeliveryEvent};
use crate::model::{Decoded, Message, temporary_channel};
use crate::store::Store;
use crate::telemetry::delivery::{record_outcome, start_delivery_span};
use crate::telemetry::metrics;

/// BRPOP timeout meaning "wait forever".
const BLOCK_FOREVER: u64 = 0;

/// What happened to a message after its handler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handler acknowledged; the message is gone.
    Acknowledged,
    /// Pushed back onto its channel. `attempts` is the nesting counter, when
    /// a limit is configured.
    Requeued { attempts: Option<i64> },
    /// Nesting limit reached; the message was dropped.
    Discarded { attempts: i64 },
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Acknowledged => "acknowledged",
            DeliveryOutcome::Requeued { .. } => "requeued",
            DeliveryOutcome::Discarded { .. } => "discarded",
        }
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A popped message together with the exact string parked in the
/// temporary channel for it.
struct InFlight {
    channel: String,
    message: Message,
    checkpoint: String,
}

/// Reliable consumer over one or more channels.
///
/// Channels are polled in registration order: when several have items, the
/// first registered wins. Handling is strictly sequential.
pub struct Broker<D = EventDispatcher> {
    store: Arc<dyn Store>,
    dispatcher: D,
    channels: Vec<String>,
    nesting_limit: Option<NonZeroU32>,
}

impl Broker<EventDispatcher> {
    /// Create a broker with an empty [`EventDispatcher`]. Register listeners
    /// through [`Broker::dispatcher_mut`].
    pub fn new<I, S>(store: Arc<dyn Store>, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_dispatcher(store, channels, EventDispatcher::new())
    }
}

impl<D: Dispatcher> Broker<D> {
    pub fn with_dispatcher<I, S>(store: Arc<dyn Store>, channels: I, dispatcher: D) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut broker = Self {
            store,
            dispatcher,
            channels: Vec::new(),
            nesting_limit: None,
        };
        for channel in channels {
            broker.add_channel(channel);
        }
        broker
    }

    /// Watch another channel. Returns `false` if it was already watched.
    ///
    /// Takes `&mut self`, so the watch set cannot change while [`Broker::run`]
    /// is borrowing the broker.
    pub fn add_channel(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.channels.contains(&name) {
            return false;
        }
        self.channels.push(name);
        true
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Cap how many times an unacknowledged message is redelivered.
    /// `None` means no cap.
    pub fn set_nesting_limit(&mut self, limit: Option<NonZeroU32>) {
        self.nesting_limit = limit;
    }

    pub fn nesting_limit(&self) -> Option<NonZeroU32> {
        self.nesting_limit
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Wrap `data` in a new message and push it onto `channel`.
    pub async fn queue(&self, data: impl Into<String>, channel: &str) -> Result<Message> {
        let message = Message::new(data);
        self.store.list_push(channel, &message.encode()?).await?;
        debug!(channel, uuid = message.uuid(), "message queued");
        Ok(message)
    }

    /// Recover from a previous crash, then handle messages until a store or
    /// handler error stops the loop. Never returns `Ok`.
    ///
    /// Dropping the returned future at any point is as safe as killing the
    /// process: whatever was in flight is recovered on the next run.
    pub async fn run(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(Error::NoChannels);
        }
        self.flush_temporary().await?;

        info!(channels = ?self.channels, nesting_limit = ?self.nesting_limit, "broker started");

        loop {
            self.receive().await?;
        }
    }

    /// Move every stranded in-flight copy back onto its channel.
    ///
    /// Channels are drained one at a time, in watch order. Must not run
    /// concurrently with [`Broker::receive`] on the same channels.
    pub async fn flush_temporary(&self) -> Result<usize> {
        let mut recovered = 0;
        for channel in &self.channels {
            let temporary = temporary_channel(channel);
            let mut moved = 0usize;
            while self
                .store
                .pop_and_push_elsewhere(&temporary, channel)
                .await?
                .is_some()
            {
                moved += 1;
            }
            if moved > 0 {
                warn!(channel = %channel, moved, "recovered in-flight messages");
                metrics::messages_recovered()
                    .add(moved as u64, &[KeyValue::new("channel", channel.clone())]);
            }
            recovered += moved;
        }
        Ok(recovered)
    }

    /// Block for the next message and handle it to completion.
    pub async fn receive(&self) -> Result<DeliveryOutcome> {
        if self.channels.is_empty() {
            return Err(Error::NoChannels);
        }

        let in_flight = self.listen().await?;
        let span = start_delivery_span(&in_flight.channel, in_flight.message.uuid());

        async {
            let mut event = DeliveryEvent::new(&in_flight.channel, &in_flight.message);
            self.dispatcher
                .dispatch(BrokerEvent::MessageReceived, &mut event)
                .await?;

            let outcome = if event.is_acknowledged() {
                metrics::messages_acknowledged()
                    .add(1, &[KeyValue::new("channel", in_flight.channel.clone())]);
                DeliveryOutcome::Acknowledged
            } else {
                self.reject(&in_flight, &mut event).await?
            };

            self.store
                .list_remove(
                    &temporary_channel(&in_flight.channel),
                    1,
                    &in_flight.checkpoint,
                )
                .await?;

            record_outcome(&span, outcome.as_str());
            debug!(%outcome, "delivery settled");
            Ok(outcome)
        }
        .instrument(span.clone())
        .await
    }

    /// Pop the next item, park a copy in the temporary channel, decode it.
    async fn listen(&self) -> Result<InFlight> {
        let (channel, raw) = loop {
            if let Some(hit) = self
                .store
                .list_pop_blocking(&self.channels, BLOCK_FOREVER)
                .await?
            {
                break hit;
            }
        };

        let temporary = temporary_channel(&channel);
        self.store.list_push(&temporary, &raw).await?;
        metrics::messages_received().add(1, &[KeyValue::new("channel", channel.clone())]);

        let (message, checkpoint) = match Message::decode(&raw) {
            Decoded::Tracked(message) => (message, raw),
            Decoded::Raw(data) => {
                let message = Message::new(data);
                let encoded = message.encode()?;
                // New copy first: a crash between the two leaves a duplicate, never a gap.
                self.store.list_push(&temporary, &encoded).await?;
                self.store.list_remove(&temporary, 1, &raw).await?;
                debug!(channel = %channel, uuid = message.uuid(), "wrapped raw payload");
                metrics::messages_upgraded()
                    .add(1, &[KeyValue::new("channel", channel.clone())]);
                (message, encoded)
            }
        };

        Ok(InFlight {
            channel,
            message,
            checkpoint,
        })
    }

    /// Requeue an unacknowledged message, or drop it at the nesting limit.
    async fn reject(
        &self,
        in_flight: &InFlight,
        event: &mut DeliveryEvent,
    ) -> Result<DeliveryOutcome> {
        let channel = in_flight.channel.as_str();
        let uuid = in_flight.message.uuid();

        let attempts = match self.nesting_limit {
            Some(limit) => {
                let attempts = self.store.increment(uuid).await?;
                if attempts >= i64::from(limit.get()) {
                    warn!(channel, uuid, attempts, "nesting limit reached, discarding message");
                    self.dispatcher
                        .dispatch(BrokerEvent::NestingLimit, event)
                        .await?;
                    self.store.delete(uuid).await?;
                    metrics::messages_discarded()
                        .add(1, &[KeyValue::new("channel", channel.to_string())]);
                    return Ok(DeliveryOutcome::Discarded { attempts });
                }
                Some(attempts)
            }
            None => None,
        };

        self.store
            .list_push(channel, &in_flight.message.encode()?)
            .await?;
        debug!(channel, uuid, ?attempts, "message requeued");
        metrics::messages_requeued().add(1, &[KeyValue::new("channel", channel.to_string())]);
        Ok(DeliveryOutcome::Requeued { attempts })
    }
}

impl<D> std::fmt::Debug for Broker<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("channels", &self.channels)
            .field("nesting_limit", &self.nesting_limit)
            .finish_non_exhaustive()
    }
}
