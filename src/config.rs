// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `ledger.redb` | `./data` |
//! | `JWT_SECRET` | HS256 signing secret for access tokens | Required |
//! | `SIGNUP_BONUS` | Amount credited to every new wallet | `100` |
//! | `ASSET_CODE` | Asset code stamped on wallets | `UC` |
//! | `LOCK_TIMEOUT_MS` | Longest wait to start a ledger write, in milliseconds | `5000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::ledger::EngineConfig;
use crate::storage::{DEFAULT_LOCK_TIMEOUT, LEDGER_DB_FILE};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the token signing secret.
///
/// There is no default; startup fails without it.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

pub const SIGNUP_BONUS_ENV: &str = "SIGNUP_BONUS";
pub const ASSET_CODE_ENV: &str = "ASSET_CODE";
pub const LOCK_TIMEOUT_MS_ENV: &str = "LOCK_TIMEOUT_MS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub engine: EngineConfig,
    /// Bound on the wait to start a unit of work.
    pub lock_timeout: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(raw) => parse(PORT_ENV, raw)?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: HOST_ENV,
                value: host,
            })?;

        let jwt_secret = lookup(JWT_SECRET_ENV)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;

        let mut engine = EngineConfig::default();
        if let Some(raw) = lookup(SIGNUP_BONUS_ENV) {
            let bonus: i64 = parse(SIGNUP_BONUS_ENV, raw.clone())?;
            if bonus < 0 {
                return Err(ConfigError::Invalid {
                    name: SIGNUP_BONUS_ENV,
                    value: raw,
                });
            }
            engine.signup_bonus = bonus;
        }
        if let Some(code) = lookup(ASSET_CODE_ENV).filter(|c| !c.is_empty()) {
            engine.asset_code = code;
        }

        let lock_timeout = match lookup(LOCK_TIMEOUT_MS_ENV) {
            Some(raw) => {
                let millis: u64 = parse(LOCK_TIMEOUT_MS_ENV, raw.clone())?;
                if millis == 0 {
                    return Err(ConfigError::Invalid {
                        name: LOCK_TIMEOUT_MS_ENV,
                        value: raw,
                    });
                }
                Duration::from_millis(millis)
            }
            None => DEFAULT_LOCK_TIMEOUT,
        };

        let log_format = match lookup(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(lookup(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            jwt_secret,
            engine,
            lock_timeout,
            log_format,
        })
    }

    /// Full path of the ledger database file.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_DB_FILE)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let cfg = load(&[(JWT_SECRET_ENV, "s3cret")]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.ledger_path(), PathBuf::from("./data/ledger.redb"));
        assert_eq!(cfg.engine.signup_bonus, 100);
        assert_eq!(cfg.engine.asset_code, "UC");
        assert_eq!(cfg.lock_timeout, Duration::from_secs(5));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing(JWT_SECRET_ENV));
        assert!(load(&[(JWT_SECRET_ENV, "")]).is_err());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = load(&[
            (JWT_SECRET_ENV, "s"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9000"),
            (DATA_DIR_ENV, "/var/lib/wallet"),
            (SIGNUP_BONUS_ENV, "0"),
            (ASSET_CODE_ENV, "PTS"),
            (LOCK_TIMEOUT_MS_ENV, "250"),
            (LOG_FORMAT_ENV, "json"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/wallet"));
        assert_eq!(cfg.engine.signup_bonus, 0);
        assert_eq!(cfg.engine.asset_code, "PTS");
        assert_eq!(cfg.lock_timeout, Duration::from_millis(250));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(matches!(
            load(&[(JWT_SECRET_ENV, "s"), (PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
        assert!(matches!(
            load(&[(JWT_SECRET_ENV, "s"), (SIGNUP_BONUS_ENV, "-5")]),
            Err(ConfigError::Invalid { name: SIGNUP_BONUS_ENV, .. })
        ));
        assert!(matches!(
            load(&[(JWT_SECRET_ENV, "s"), (LOCK_TIMEOUT_MS_ENV, "0")]),
            Err(ConfigError::Invalid { name: LOCK_TIMEOUT_MS_ENV, .. })
        ));
    }
}
