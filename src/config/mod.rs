//! Typed configuration from environment variables and an optional TOML file.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! The Redis URL may carry a password, so it is held as a
//! `secrecy::SecretString` to keep it out of logs.

use std::num::NonZeroU32;
use std::path::Path;

use crate::error::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug)]
pub struct Config {
    pub redis_url: SecretString,
    pub broker: BrokerConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            redis_url: SecretString::from(required_var(&var, "REDIS_URL")?),
            broker: BrokerConfig::from_vars(&var)?,
            otel_endpoint: var("OTEL_ENDPOINT").filter(|s| !s.is_empty()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// What the broker watches and how often it redelivers.
///
/// In a TOML file this is the `[broker]` table:
///
/// ```toml
/// [broker]
/// channels = ["jobs", "mail"]
/// nesting_limit = 5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BrokerConfig {
    /// Channels in priority order.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Maximum deliveries of one unacknowledged message. Absent = unlimited.
    #[serde(default)]
    pub nesting_limit: Option<NonZeroU32>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    broker: BrokerConfig,
}

impl BrokerConfig {
    /// Read `REDQ_CHANNELS` (comma separated) and `REDQ_NESTING_LIMIT`.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let channels = var("REDQ_CHANNELS")
            .map(|list| parse_channels(&list))
            .unwrap_or_default();
        let nesting_limit = match var("REDQ_NESTING_LIMIT").filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.trim().parse::<NonZeroU32>().map_err(|e| {
                Error::Config(format!("REDQ_NESTING_LIMIT must be a positive integer: {e}"))
            })?),
            None => None,
        };
        Ok(Self {
            channels,
            nesting_limit,
        })
    }

    /// Parse the `[broker]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad config file: {e}")))?;
        Ok(file.broker)
    }

    /// Load the `[broker]` table from a TOML file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Layer `overrides` on top of `self`. Non-empty channel lists replace,
    /// a set nesting limit replaces.
    pub fn merge(self, overrides: BrokerConfig) -> Self {
        Self {
            channels: if overrides.channels.is_empty() {
                self.channels
            } else {
                overrides.channels
            },
            nesting_limit: overrides.nesting_limit.or(self.nesting_limit),
        }
    }

    /// A broker needs at least one channel.
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(Error::Config(
                "at least one channel is required (REDQ_CHANNELS, --channel, or [broker].channels)"
                    .to_string(),
            ));
        }
        if let Some(bad) = self.channels.iter().find(|c| c.trim().is_empty()) {
            return Err(Error::Config(format!("invalid channel name {bad:?}")));
        }
        Ok(())
    }
}

fn parse_channels(list: &str) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !channels.iter().any(|c| c == name) {
            channels.push(name.to_string());
        }
    }
    channels
}

fn required_var<F>(var: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Config(format!("required environment variable {name} is not set")))
}
