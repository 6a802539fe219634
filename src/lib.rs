//! # redq
//!
//! Reliable work-queue broker built on Redis list primitives.
//!
//! The broker blocks on one or more named channels, hands every item to
//! application code through a [`event::DeliveryEvent`], and keeps an
//! in-flight copy in `<channel>.temporary` so a crash mid-handling never
//! loses work. Unacknowledged items are requeued until an optional
//! nesting limit discards them.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod store;
pub mod telemetry;

pub use dispatch::{Dispatcher, EventDispatcher, FnListener, Listener};
pub use engine::{Broker, CommandListener, DeliveryOutcome};
pub use error::{Error, Result};
pub use event::{BrokerEvent, DeliveryEvent};
pub use model::{Decoded, Message};
pub use store::{MemoryStore, Store};

#[cfg(feature = "redis")]
pub use store::RedisStore;
