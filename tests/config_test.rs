use std::collections::HashMap;
use std::num::NonZeroU32;

use redq::config::{BrokerConfig, Config};
use secrecy::ExposeSecret;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn config_loads_required_fields() {
    let config = Config::from_vars(vars(&[
        ("REDIS_URL", "redis://:secret@localhost:6379/0"),
        ("REDQ_CHANNELS", "jobs, mail,jobs"),
        ("REDQ_NESTING_LIMIT", "3"),
    ]))
    .unwrap();

    assert_eq!(
        config.redis_url.expose_secret(),
        "redis://:secret@localhost:6379/0"
    );
    assert_eq!(config.broker.channels, vec!["jobs", "mail"]);
    assert_eq!(config.broker.nesting_limit, NonZeroU32::new(3));
    assert_eq!(config.log_level, "info");
    assert!(config.otel_endpoint.is_none());
}

#[test]
fn config_fails_without_redis_url() {
    assert!(Config::from_vars(vars(&[("REDQ_CHANNELS", "jobs")])).is_err());
}

#[test]
fn redis_url_is_redacted_in_debug_output() {
    let config = Config::from_vars(vars(&[("REDIS_URL", "redis://:hunter2@db:6379")])).unwrap();
    assert!(!format!("{config:?}").contains("hunter2"));
}

#[test]
fn zero_nesting_limit_is_rejected() {
    let result = BrokerConfig::from_vars(vars(&[("REDQ_NESTING_LIMIT", "0")]));
    assert!(result.is_err());
}

#[test]
fn broker_config_from_toml() {
    let config = BrokerConfig::from_toml_str(
        r#"
        [broker]
        channels = ["high", "low"]
        nesting_limit = 5
        "#,
    )
    .unwrap();
    assert_eq!(config.channels, vec!["high", "low"]);
    assert_eq!(config.nesting_limit, NonZeroU32::new(5));
}

#[test]
fn flags_override_file_settings() {
    let file = BrokerConfig {
        channels: vec!["from-file".to_string()],
        nesting_limit: NonZeroU32::new(5),
    };
    let merged = file.clone().merge(BrokerConfig {
        channels: vec!["from-flag".to_string()],
        nesting_limit: None,
    });
    assert_eq!(merged.channels, vec!["from-flag"]);
    assert_eq!(merged.nesting_limit, NonZeroU32::new(5));

    let untouched = file.clone().merge(BrokerConfig::default());
    assert_eq!(untouched, file);
}

#[test]
fn validate_requires_a_channel() {
    assert!(BrokerConfig::default().validate().is_err());
    let ok = BrokerConfig {
        channels: vec!["jobs".to_string()],
        nesting_limit: None,
    };
    assert!(ok.validate().is_ok());
}
