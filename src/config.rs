// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read once from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `STAGE` | `prod` selects the mainnet asset catalog | `dev` |
//! | `DATA_DIR` | Directory holding the reconciliation database | `/data` |
//! | `CMC_API_KEY` | Space-separated market-data API keys | Required |
//! | `CMC_API_BASE_URL` | Market-data API base URL | `https://pro-api.coinmarketcap.com` |
//! | `FIREBLOCKS_API_BASE_URL` | Custody API base URL | `https://api.fireblocks.io` |
//! | `FIREBLOCKS_SIGNER_API` | API key used for transfers and fee estimates | Required |
//! | `FIREBLOCKS_SIGNER_KEY` | RSA private key (PEM, `\n` escapes ok) | Unless `_PATH` set |
//! | `FIREBLOCKS_SIGNER_KEY_PATH` | File holding the signer private key | Optional |
//! | `FIREBLOCKS_VIEWER_API` | API key used for read-only queries | Required |
//! | `FIREBLOCKS_VIEWER_KEY` | RSA private key (PEM) | Required unless `_PATH` set |
//! | `FIREBLOCKS_VIEWER_KEY_PATH` | File holding the viewer private key | Optional |
//! | `FB_FEE_ACCOUNT` | Vault id collecting service fees | Required |

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::{custody, market_data};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const STAGE_ENV: &str = "STAGE";

/// Environment variable name for the data directory.
///
/// Holds `reconciliation.redb`, which must survive restarts.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const CMC_API_KEY_ENV: &str = "CMC_API_KEY";
pub const CMC_API_BASE_URL_ENV: &str = "CMC_API_BASE_URL";
pub const FIREBLOCKS_API_BASE_URL_ENV: &str = "FIREBLOCKS_API_BASE_URL";
pub const FIREBLOCKS_SIGNER_API_ENV: &str = "FIREBLOCKS_SIGNER_API";
pub const FIREBLOCKS_SIGNER_KEY_ENV: &str = "FIREBLOCKS_SIGNER_KEY";
pub const FIREBLOCKS_VIEWER_API_ENV: &str = "FIREBLOCKS_VIEWER_API";
pub const FIREBLOCKS_VIEWER_KEY_ENV: &str = "FIREBLOCKS_VIEWER_KEY";
pub const FEE_ACCOUNT_ENV: &str = "FB_FEE_ACCOUNT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STAGE: &str = "dev";
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the reconciliation database inside `DATA_DIR`.
pub const RECONCILIATION_DB_FILE: &str = "reconciliation.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// API key plus PEM-encoded private key for one custody credential set.
#[derive(Clone)]
pub struct CustodyCredentials {
    pub api_key: String,
    pub private_key_pem: String,
}

impl std::fmt::Debug for CustodyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyCredentials")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub stage: String,
    pub data_dir: PathBuf,
    pub market_data_keys: Vec<String>,
    pub market_data_base_url: String,
    pub custody_base_url: String,
    pub signer: CustodyCredentials,
    pub viewer: CustodyCredentials,
    pub fee_vault_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default(HOST_ENV, DEFAULT_HOST);
        let port = match env_optional(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV.to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV.to_string(),
                reason: e.to_string(),
            })?;

        let market_data_keys = split_keys(&env_required(CMC_API_KEY_ENV)?);
        if market_data_keys.is_empty() {
            return Err(ConfigError::Missing(CMC_API_KEY_ENV.to_string()));
        }

        Ok(Self {
            bind_addr,
            stage: env_or_default(STAGE_ENV, DEFAULT_STAGE),
            data_dir: PathBuf::from(env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            market_data_keys,
            market_data_base_url: env_or_default(
                CMC_API_BASE_URL_ENV,
                market_data::DEFAULT_API_BASE_URL,
            ),
            custody_base_url: env_or_default(
                FIREBLOCKS_API_BASE_URL_ENV,
                custody::DEFAULT_API_BASE_URL,
            ),
            signer: CustodyCredentials {
                api_key: env_required(FIREBLOCKS_SIGNER_API_ENV)?,
                private_key_pem: load_private_key_pem(FIREBLOCKS_SIGNER_KEY_ENV)?,
            },
            viewer: CustodyCredentials {
                api_key: env_required(FIREBLOCKS_VIEWER_API_ENV)?,
                private_key_pem: load_private_key_pem(FIREBLOCKS_VIEWER_KEY_ENV)?,
            },
            fee_vault_id: env_required(FEE_ACCOUNT_ENV)?,
        })
    }

    pub fn reconciliation_db_path(&self) -> PathBuf {
        self.data_dir.join(RECONCILIATION_DB_FILE)
    }
}

/// Keys are separated by whitespace.
fn split_keys(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

fn env_required(name: &str) -> Result<String, ConfigError> {
    env_optional(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

/// Read a PEM key inline from `name`, or from the file named by `{name}_PATH`.
fn load_private_key_pem(name: &str) -> Result<String, ConfigError> {
    if let Some(pem) = env_optional(name) {
        return Ok(pem.replace("\\n", "\n"));
    }

    let path_var = format!("{name}_PATH");
    let path = env_optional(&path_var).ok_or_else(|| ConfigError::Missing(name.to_string()))?;
    let pem = fs::read_to_string(&path).map_err(|e| ConfigError::Invalid {
        name: path_var.clone(),
        reason: format!("failed to read {path}: {e}"),
    })?;
    let trimmed = pem.trim().to_string();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid {
            name: path_var,
            reason: format!("{path} is empty"),
        });
    }
    Ok(trimmed)
}
