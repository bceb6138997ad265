//! Server configuration.
//!
//! Defaults mirror the fixed bank layout; each value can be overridden from
//! the environment.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use thiserror::Error;

use crate::registry::DEFAULT_ACCOUNT_CAPACITY;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_WINDOWS: usize = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

/// Errors raised while reading configuration overrides.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: '{value}' is not a valid {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// Closed address roster: `subnet.first..=subnet.last` map 1:1 to identities
/// named `{id_prefix}{suffix}`, and `dev_address` maps to the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterConfig {
    pub subnet: [u8; 3],
    pub first_suffix: u8,
    pub last_suffix: u8,
    pub id_prefix: String,
    pub dev_address: Option<IpAddr>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            subnet: [10, 10, 16],
            first_suffix: 200,
            last_suffix: 224,
            id_prefix: "pi".to_string(),
            dev_address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: String,
    pub windows: usize,
    pub queue_capacity: usize,
    pub account_capacity: usize,
    /// Read timeout for an assigned session; `None` lets a stalled peer hold
    /// its window indefinitely.
    pub idle_timeout: Option<Duration>,
    pub roster: RosterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            windows: DEFAULT_WINDOWS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            account_capacity: DEFAULT_ACCOUNT_CAPACITY,
            idle_timeout: None,
            roster: RosterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from the process environment and an optional bind address argument.
    pub fn from_env(addr_arg: Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        if let Some(addr) = addr_arg {
            config.addr = addr;
        }
        Ok(config)
    }

    /// Build from a key lookup, starting from the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("BANK_ADDR") {
            config.addr = addr;
        }
        if let Some(raw) = lookup("BANK_WINDOWS") {
            config.windows = parse_count("BANK_WINDOWS", &raw)?;
        }
        if let Some(raw) = lookup("BANK_QUEUE_CAPACITY") {
            config.queue_capacity = parse_count("BANK_QUEUE_CAPACITY", &raw)?;
        }
        if let Some(raw) = lookup("BANK_ACCOUNT_CAPACITY") {
            config.account_capacity = parse_count("BANK_ACCOUNT_CAPACITY", &raw)?;
        }
        if let Some(raw) = lookup("BANK_IDLE_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "BANK_IDLE_TIMEOUT_SECS",
                value: raw.clone(),
                expected: "number of seconds",
            })?;
            // 0 keeps the wait-forever behavior
            config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse_count(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    let value: usize = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        expected: "positive integer",
    })?;
    if value == 0 {
        return Err(ConfigError::Zero(key));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_bank_layout() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.windows, 5);
        assert_eq!(config.queue_capacity, 20);
        assert_eq!(config.account_capacity, 5);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.roster.subnet, [10, 10, 16]);
        assert_eq!((config.roster.first_suffix, config.roster.last_suffix), (200, 224));
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("BANK_ADDR", "127.0.0.1:9000"),
            ("BANK_WINDOWS", "2"),
            ("BANK_QUEUE_CAPACITY", " 3 "),
            ("BANK_ACCOUNT_CAPACITY", "7"),
            ("BANK_IDLE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9000");
        assert_eq!(config.windows, 2);
        assert_eq!(config.queue_capacity, 3);
        assert_eq!(config.account_capacity, 7);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("BANK_IDLE_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        let result = ServerConfig::from_lookup(lookup_from(&[("BANK_WINDOWS", "five")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "BANK_WINDOWS", .. })
        ));

        let result = ServerConfig::from_lookup(lookup_from(&[("BANK_QUEUE_CAPACITY", "0")]));
        assert_eq!(result, Err(ConfigError::Zero("BANK_QUEUE_CAPACITY")));
    }
}
