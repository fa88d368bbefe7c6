// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! fixed protocol timeouts. Configuration is loaded from the environment at
//! startup by [`BridgeConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for persisted state | `./quasar-data` |
//! | `HOST` | Daemon bind address | `127.0.0.1` |
//! | `PORT` | Daemon bind port | `8787` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `QUASAR_CONNECT_TIMEOUT_SECS` | Connect approval budget | `120` |
//! | `QUASAR_TRANSACTION_TIMEOUT_SECS` | Transaction approval budget | `300` |
//! | `QUASAR_ESCALATE_SIGNING` | Require approval for `signMessage` | `false` |
//! | `QUASAR_CHAIN_ID` | Chain identifier reported to pages | `quasar-1` |
//! | `QUASAR_NETWORK_NAME` | Network display name | `Quasar` |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const CONNECT_TIMEOUT_ENV: &str = "QUASAR_CONNECT_TIMEOUT_SECS";
pub const TRANSACTION_TIMEOUT_ENV: &str = "QUASAR_TRANSACTION_TIMEOUT_SECS";
pub const ESCALATE_SIGNING_ENV: &str = "QUASAR_ESCALATE_SIGNING";
pub const CHAIN_ID_ENV: &str = "QUASAR_CHAIN_ID";
pub const NETWORK_NAME_ENV: &str = "QUASAR_NETWORK_NAME";

pub const DEFAULT_DATA_DIR: &str = "./quasar-data";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
pub const DEFAULT_CHAIN_ID: &str = "quasar-1";
pub const DEFAULT_NETWORK_NAME: &str = "Quasar";

/// How long a page-side call waits for its correlated response.
pub const CLIENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for a connect approval before the pending entry times out.
pub const CONNECT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(120);

/// Budget for a transaction approval before the pending entry times out.
pub const TRANSACTION_APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                value: value.to_string(),
                reason: "expected `json` or `pretty`".to_string(),
            }),
        }
    }
}

/// Escalation policy for the Broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSettings {
    pub connect_timeout: Duration,
    pub transaction_timeout: Duration,
    /// When set, `SIGN_MESSAGE` is escalated like a connect request.
    pub escalate_signing: bool,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_APPROVAL_TIMEOUT,
            transaction_timeout: TRANSACTION_APPROVAL_TIMEOUT,
            escalate_signing: false,
        }
    }
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub broker: BrokerSettings,
    pub chain_id: String,
    pub network_name: String,
}

impl BridgeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(
            lookup(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );

        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    value: host.clone(),
                    reason: e.to_string(),
                })?;

        let log_format = match lookup(LOG_FORMAT_ENV) {
            Some(raw) => LogFormat::parse(&raw)?,
            None => LogFormat::default(),
        };

        let broker = BrokerSettings {
            connect_timeout: seconds(&lookup, CONNECT_TIMEOUT_ENV, CONNECT_APPROVAL_TIMEOUT)?,
            transaction_timeout: seconds(
                &lookup,
                TRANSACTION_TIMEOUT_ENV,
                TRANSACTION_APPROVAL_TIMEOUT,
            )?,
            escalate_signing: flag(&lookup, ESCALATE_SIGNING_ENV)?,
        };

        Ok(Self {
            data_dir,
            bind_addr,
            log_format,
            broker,
            chain_id: lookup(CHAIN_ID_ENV).unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string()),
            network_name: lookup(NETWORK_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_NETWORK_NAME.to_string()),
        })
    }
}

fn seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "timeout must be positive".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(false);
    };
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected a boolean".to_string(),
        }),
    }
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
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = BridgeConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.broker, BrokerSettings::default());
        assert_eq!(config.broker.connect_timeout, Duration::from_secs(120));
        assert_eq!(config.broker.transaction_timeout, Duration::from_secs(300));
        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            (PORT_ENV, "9000"),
            (LOG_FORMAT_ENV, "JSON"),
            (CONNECT_TIMEOUT_ENV, "60"),
            (ESCALATE_SIGNING_ENV, "true"),
            (CHAIN_ID_ENV, "quasar-test"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.broker.connect_timeout, Duration::from_secs(60));
        assert!(config.broker.escalate_signing);
        assert_eq!(config.chain_id, "quasar-test");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(BridgeConfig::from_lookup(lookup_from(&[(PORT_ENV, "http")])).is_err());
        assert!(BridgeConfig::from_lookup(lookup_from(&[(LOG_FORMAT_ENV, "xml")])).is_err());
        assert!(BridgeConfig::from_lookup(lookup_from(&[(CONNECT_TIMEOUT_ENV, "0")])).is_err());
        assert!(BridgeConfig::from_lookup(lookup_from(&[(ESCALATE_SIGNING_ENV, "maybe")])).is_err());
    }
}
