//! Dispatch sink: how the broker hands events to application code.
//!
//! The broker only needs [`Dispatcher`]. [`EventDispatcher`] is the default
//! sink: a registry of listeners per [`BrokerEvent`], run in the order they
//! were added.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::event::{BrokerEvent, DeliveryEvent};

/// Receives broker notifications.
///
/// `dispatch` is awaited to completion before the broker reads the
/// acknowledgment flag. An error is fatal to the receive loop.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, kind: BrokerEvent, event: &mut DeliveryEvent) -> Result<()>;
}

/// A single event handler.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, event: &mut DeliveryEvent) -> Result<()>;
}

/// Adapts a plain closure into a [`Listener`].
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F> Listener for FnListener<F>
where
    F: Fn(&mut DeliveryEvent) -> Result<()> + Send + Sync,
{
    async fn handle(&self, event: &mut DeliveryEvent) -> Result<()> {
        (self.0)(event)
    }
}

/// Listener registry keyed by event kind.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<BrokerEvent, Vec<Arc<dyn Listener>>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`.
    pub fn add_listener(&mut self, kind: BrokerEvent, listener: impl Listener + 'static) {
        self.listeners
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Register a closure for `kind`.
    pub fn on<F>(&mut self, kind: BrokerEvent, f: F)
    where
        F: Fn(&mut DeliveryEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.add_listener(kind, FnListener(f));
    }

    pub fn has_listeners(&self, kind: BrokerEvent) -> bool {
        self.listeners.get(&kind).is_some_and(|l| !l.is_empty())
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<_, _> = self
            .listeners
            .iter()
            .map(|(kind, l)| (kind.name(), l.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}

#[async_trait]
impl Dispatcher for EventDispatcher {
    async fn dispatch(&self, kind: BrokerEvent, event: &mut DeliveryEvent) -> Result<()> {
        let Some(listeners) = self.listeners.get(&kind) else {
            debug!(event = %kind, channel = event.channel(), "no listener registered");
            return Ok(());
        };
        for listener in listeners {
            listener.handle(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use std::sync::Mutex;

    #[tokio::test]
    async fn listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        for n in 1..=3 {
            let seen = Arc::clone(&seen);
            dispatcher.on(BrokerEvent::MessageReceived, move |_| {
                seen.lock().unwrap().push(n);
                Ok(())
            });
        }

        let mut event = DeliveryEvent::new("jobs", &Message::new("x"));
        dispatcher
            .dispatch(BrokerEvent::MessageReceived, &mut event)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unregistered_kind_is_a_no_op() {
        let dispatcher = EventDispatcher::new();
        let mut event = DeliveryEvent::new("jobs", &Message::new("x"));
        dispatcher
            .dispatch(BrokerEvent::NestingLimit, &mut event)
            .await
            .unwrap();
        assert!(!event.is_acknowledged());
        assert!(!dispatcher.has_listeners(BrokerEvent::NestingLimit));
    }
}
