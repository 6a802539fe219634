//! Delivery engine: the broker loop and command-backed listeners.

pub mod broker;
pub mod hook;

pub use broker::{Broker, DeliveryOutcome};
pub use hook::CommandListener;
