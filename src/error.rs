//! Error types for redq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(String),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("wrong value type held at key {0}")]
    WrongType(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("handler failed on channel {channel}: {reason}")]
    Handler { channel: String, reason: String },

    #[error("broker has no channels to watch")]
    NoChannels,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
