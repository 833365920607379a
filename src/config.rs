// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the parsed [`Settings`] struct.
//! Configuration is loaded once from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding the redb database | `./data` |
//! | `PUBLIC_DIR` | Directory for uploaded images, served at `/public` | `./public` |
//! | `JWT_SECRET` | HS256 secret for session tokens | Required |
//! | `JWT_TTL_SECS` | Session token lifetime | `86400` |
//! | `SERVER_SECRET_KEY` | 32-byte hex AES-256-GCM key for codes and wallet keys | Required |
//! | `VERIFICATION_CODE_LENGTH` | Digits in emailed verification codes | `6` |
//! | `CHAIN_RPC_URL` | EVM JSON-RPC endpoint | `http://127.0.0.1:8545` |
//! | `CHAIN_ID` | Network id used to pick the artifact deployment | `1337` |
//! | `CONTRACT_ARTIFACT` | Compiled contract JSON (`abi` + `networks`) | `./contracts/TaswitContract.json` |
//! | `CONTRACT_ADDRESS` | Overrides the artifact deployment address | Optional |
//! | `CHAIN_TIMEOUT_SECS` | Upper bound on one contract call incl. receipt | `60` |
//! | `ADMIN_EMAIL` | Seeded admin account email | Required |
//! | `ADMIN_USERNAME` | Seeded admin user name | `admin` |
//! | `ADMIN_PASSWORD` | Seeded admin password | Required |
//! | `ADMIN_NAME` | Seeded admin display name | `Administrator` |
//! | `MAIL_RELAY_URL` | HTTP mail relay endpoint; log-only mailer when unset | Optional |
//! | `MAIL_RELAY_TOKEN` | Bearer token for the relay | Optional |
//! | `MAIL_FROM` | Sender address | `no-reply@ballot.local` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | Optional |
//! | `RECONCILE_INTERVAL_SECS` | Interval between reconciliation sweeps | `60` |
//! | `RECONCILE_GRACE_SECS` | Age before a pending intent is considered stuck | `300` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::{net::SocketAddr, path::PathBuf, time::Duration};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const PUBLIC_DIR_ENV: &str = "PUBLIC_DIR";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_TTL_ENV: &str = "JWT_TTL_SECS";
pub const SERVER_SECRET_KEY_ENV: &str = "SERVER_SECRET_KEY";
pub const VERIFICATION_CODE_LENGTH_ENV: &str = "VERIFICATION_CODE_LENGTH";
pub const CHAIN_RPC_URL_ENV: &str = "CHAIN_RPC_URL";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const CONTRACT_ARTIFACT_ENV: &str = "CONTRACT_ARTIFACT";
pub const CONTRACT_ADDRESS_ENV: &str = "CONTRACT_ADDRESS";
pub const CHAIN_TIMEOUT_ENV: &str = "CHAIN_TIMEOUT_SECS";
pub const ADMIN_EMAIL_ENV: &str = "ADMIN_EMAIL";
pub const ADMIN_USERNAME_ENV: &str = "ADMIN_USERNAME";
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";
pub const ADMIN_NAME_ENV: &str = "ADMIN_NAME";
pub const MAIL_RELAY_URL_ENV: &str = "MAIL_RELAY_URL";
pub const MAIL_RELAY_TOKEN_ENV: &str = "MAIL_RELAY_TOKEN";
pub const MAIL_FROM_ENV: &str = "MAIL_FROM";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const RECONCILE_INTERVAL_ENV: &str = "RECONCILE_INTERVAL_SECS";
pub const RECONCILE_GRACE_ENV: &str = "RECONCILE_GRACE_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default log filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the redb database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "ballot.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Seed credentials for the single admin account.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub user_name: String,
    pub password: String,
    pub name: String,
}

/// Chain endpoint and contract location.
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub rpc_url: url::Url,
    pub chain_id: u64,
    pub artifact_path: PathBuf,
    pub contract_address: Option<String>,
    pub timeout: Duration,
}

/// Mail relay settings. `relay_url == None` selects the log-only mailer.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub relay_url: Option<url::Url>,
    pub relay_token: Option<String>,
    pub from: String,
}

/// Fully parsed process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub server_secret_key: [u8; 32],
    pub verification_code_length: usize,
    pub chain: ChainSettings,
    pub admin: AdminSeed,
    pub mail: MailSettings,
    pub tls: Option<(PathBuf, PathBuf)>,
    pub reconcile_interval: Duration,
    pub reconcile_grace: Duration,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let host = get(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(get(PORT_ENV), PORT_ENV, 8080)?;
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let server_secret_key = parse_secret_key(&required(SERVER_SECRET_KEY_ENV)?)?;

        let verification_code_length: usize =
            parse_or(get(VERIFICATION_CODE_LENGTH_ENV), VERIFICATION_CODE_LENGTH_ENV, 6)?;
        if !(4..=10).contains(&verification_code_length) {
            return Err(ConfigError::Invalid {
                name: VERIFICATION_CODE_LENGTH_ENV,
                reason: "must be between 4 and 10".to_string(),
            });
        }

        let rpc_url = parse_url(
            get(CHAIN_RPC_URL_ENV).unwrap_or_else(|| "http://127.0.0.1:8545".to_string()),
            CHAIN_RPC_URL_ENV,
        )?;

        let relay_url = get(MAIL_RELAY_URL_ENV)
            .map(|raw| parse_url(raw, MAIL_RELAY_URL_ENV))
            .transpose()?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| "./data".to_string())),
            public_dir: PathBuf::from(
                get(PUBLIC_DIR_ENV).unwrap_or_else(|| "./public".to_string()),
            ),
            jwt_secret: required(JWT_SECRET_ENV)?,
            jwt_ttl: Duration::from_secs(parse_or(get(JWT_TTL_ENV), JWT_TTL_ENV, 86_400)?),
            server_secret_key,
            verification_code_length,
            chain: ChainSettings {
                rpc_url,
                chain_id: parse_or(get(CHAIN_ID_ENV), CHAIN_ID_ENV, 1337)?,
                artifact_path: PathBuf::from(
                    get(CONTRACT_ARTIFACT_ENV)
                        .unwrap_or_else(|| "./contracts/TaswitContract.json".to_string()),
                ),
                contract_address: get(CONTRACT_ADDRESS_ENV),
                timeout: Duration::from_secs(parse_or(get(CHAIN_TIMEOUT_ENV), CHAIN_TIMEOUT_ENV, 60)?),
            },
            admin: AdminSeed {
                email: required(ADMIN_EMAIL_ENV)?,
                user_name: get(ADMIN_USERNAME_ENV).unwrap_or_else(|| "admin".to_string()),
                password: required(ADMIN_PASSWORD_ENV)?,
                name: get(ADMIN_NAME_ENV).unwrap_or_else(|| "Administrator".to_string()),
            },
            mail: MailSettings {
                relay_url,
                relay_token: get(MAIL_RELAY_TOKEN_ENV),
                from: get(MAIL_FROM_ENV).unwrap_or_else(|| "no-reply@ballot.local".to_string()),
            },
            tls,
            reconcile_interval: Duration::from_secs(parse_or(
                get(RECONCILE_INTERVAL_ENV),
                RECONCILE_INTERVAL_ENV,
                60,
            )?),
            reconcile_grace: Duration::from_secs(parse_or(
                get(RECONCILE_GRACE_ENV),
                RECONCILE_GRACE_ENV,
                300,
            )?),
        })
    }

    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_url(raw: String, name: &'static str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|e: url::ParseError| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_secret_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = alloy::hex::decode(raw.trim()).map_err(|e| ConfigError::Invalid {
        name: SERVER_SECRET_KEY_ENV,
        reason: e.to_string(),
    })?;
    bytes.try_into().map_err(|_| ConfigError::Invalid {
        name: SERVER_SECRET_KEY_ENV,
        reason: "expected 32 bytes (64 hex characters)".to_string(),
    })
}
