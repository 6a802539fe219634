//! Key-value store capabilities the broker depends on.
//!
//! The broker never talks to a store client directly. Everything goes
//! through [`Store`], which mirrors the handful of Redis list and counter
//! commands the delivery protocol needs. Lists are pushed at the head and
//! popped from the tail.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use async_trait::async_trait;

use crate::error::Result;

/// Narrow capability set over a key-value store.
///
/// Errors from any method are connectivity or protocol failures. The broker
/// does not retry them.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomically increment the integer at `key`, starting from 0 when absent.
    /// Returns the new value.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Remove `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Push `value` onto the head of the list at `key`, creating it if needed.
    async fn list_push(&self, key: &str, value: &str) -> Result<()>;

    /// Pop from the tail of the list at `key` without blocking.
    async fn list_pop(&self, key: &str) -> Result<Option<String>>;

    /// Pop from the tail of the first non-empty list in `keys`, checked in
    /// order, waiting until one has an item.
    ///
    /// `timeout_secs == 0` waits forever. Returns `None` only on timeout.
    async fn list_pop_blocking(
        &self,
        keys: &[String],
        timeout_secs: u64,
    ) -> Result<Option<(String, String)>>;

    /// Remove occurrences of `value` from the list at `key`.
    ///
    /// `count > 0` removes up to `count` from the head, `count < 0` up to
    /// `|count|` from the tail, and `0` removes all. Returns how many went.
    async fn list_remove(&self, key: &str, count: i64, value: &str) -> Result<i64>;

    /// Atomically pop the tail of `source` and push it onto the head of
    /// `destination`. Returns the moved value, or `None` if `source` was empty.
    async fn pop_and_push_elsewhere(&self, source: &str, destination: &str)
    -> Result<Option<String>>;
}
