// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the metadata database | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TOKEN_TTL_SECS` | Bearer token lifetime, at most 100 years; unset or `0` disables expiry | unset |
//! | `REQUEST_TIMEOUT_MS` | Storage deadline per request; `0` disables it | `5000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TOKEN_TTL_SECS_ENV: &str = "TOKEN_TTL_SECS";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "REQUEST_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Upper bound for `TOKEN_TTL_SECS` (100 years).
pub const MAX_TOKEN_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Upper bound for `REQUEST_TIMEOUT_MS` (one day).
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 24 * 60 * 60 * 1000;

/// File name of the redb database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "tagstore.redb";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// `None` means tokens never expire.
    pub token_ttl: Option<chrono::Duration>,
    /// `None` means requests have no storage deadline.
    pub request_timeout: Option<Duration>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            token_ttl: None,
            request_timeout: Some(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)),
            log_format: LogFormat::Pretty,
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    var: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
        expected,
    })
}

/// Parse a bounded count; `0` means disabled.
fn optional_amount(
    var: &'static str,
    value: &str,
    max: u64,
    expected: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let amount: u64 = parse_number(var, value, expected)?;
    if amount > max {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            expected,
        });
    }
    Ok((amount > 0).then_some(amount))
}

fn token_ttl(value: &str) -> Result<Option<chrono::Duration>, ConfigError> {
    const EXPECTED: &str = "a whole number of seconds up to 3153600000";
    let Some(secs) = optional_amount(TOKEN_TTL_SECS_ENV, value, MAX_TOKEN_TTL_SECS, EXPECTED)?
    else {
        return Ok(None);
    };
    let ttl = i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| ConfigError::Invalid {
            var: TOKEN_TTL_SECS_ENV,
            value: value.to_string(),
            expected: EXPECTED,
        })?;
    Ok(Some(ttl))
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(dir) = lookup(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup(HOST_ENV) {
            config.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            config.port = parse_number(PORT_ENV, &port, "a port number")?;
        }
        if let Some(ttl) = lookup(TOKEN_TTL_SECS_ENV) {
            config.token_ttl = token_ttl(&ttl)?;
        }
        if let Some(timeout) = lookup(REQUEST_TIMEOUT_MS_ENV) {
            config.request_timeout = optional_amount(
                REQUEST_TIMEOUT_MS_ENV,
                &timeout,
                MAX_REQUEST_TIMEOUT_MS,
                "a whole number of milliseconds up to 86400000",
            )?
            .map(Duration::from_millis);
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: LOG_FORMAT_ENV,
                        value: format,
                        expected: "'json' or 'pretty'",
                    })
                }
            };
        }

        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.database_path(), PathBuf::from("./data/tagstore.redb"));
        assert!(config.token_ttl.is_none());
        assert_eq!(config.request_timeout, Some(Duration::from_millis(5_000)));
    }

    #[test]
    fn values_are_read() {
        let config = load(&[
            ("DATA_DIR", "/var/lib/tagstore"),
            ("PORT", "9000"),
            ("TOKEN_TTL_SECS", "3600"),
            ("REQUEST_TIMEOUT_MS", "0"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.token_ttl, Some(chrono::Duration::hours(1)));
        assert!(config.request_timeout.is_none());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/tagstore/tagstore.redb")
        );
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        assert!(load(&[("TOKEN_TTL_SECS", "0")]).unwrap().token_ttl.is_none());
    }

    #[test]
    fn unparsable_values_are_errors() {
        assert!(matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(load(&[("TOKEN_TTL_SECS", "-5")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn oversized_durations_are_rejected_at_startup() {
        for ttl in ["10000000000000", "10000000000000000", "18446744073709551615"] {
            assert!(matches!(
                load(&[("TOKEN_TTL_SECS", ttl)]),
                Err(ConfigError::Invalid { var: "TOKEN_TTL_SECS", .. })
            ));
        }
        assert!(matches!(
            load(&[("REQUEST_TIMEOUT_MS", "18446744073709551615")]),
            Err(ConfigError::Invalid { var: "REQUEST_TIMEOUT_MS", .. })
        ));
    }

    #[test]
    fn largest_ttl_still_expires() {
        let config = load(&[("TOKEN_TTL_SECS", "3153600000")]).unwrap();
        let ttl = config.token_ttl.unwrap();
        assert_eq!(ttl.num_seconds(), MAX_TOKEN_TTL_SECS as i64);
        assert!(chrono::Utc::now().checked_add_signed(ttl).is_some());
    }
}
