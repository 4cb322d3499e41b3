// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! by the `vault` binary. Configuration is loaded from the environment at
//! startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for persisted session state | `./vault-data` |
//! | `VAULT_APP_ID` | Prefix of session identifiers | `bubble-vault` |
//! | `VAULT_NETWORK` | Network key (`base-goerli`, `local`) | `base-goerli` |
//! | `VAULT_RPC_URL` | RPC endpoint override | Network default |
//! | `VAULT_PROVIDER_URL` | Storage provider override for the network | Provider table |
//! | `VAULT_WALLET_KEY` | Deploying wallet key (hex) | Required unless a PEM path is set |
//! | `VAULT_WALLET_KEY_PATH` | Deploying wallet key (PEM file) | Optional |
//! | `VAULT_CONTRACT_BYTECODE_PATH` | Access-control contract bytecode (hex file) | Required for vault creation |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;

use alloy::{primitives::Bytes, signers::local::PrivateKeySigner};
use url::Url;

use crate::blockchain::{
    contract, network_by_key, signing, ChainError, NetworkConfig, ProviderTable, BASE_GOERLI,
};
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the local data directory.
///
/// Holds `sessions.redb`, the only state that survives a restart.
///
/// # Default
/// `./vault-data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the application id used in session ids.
pub const APP_ID_ENV: &str = "VAULT_APP_ID";

/// Default application id.
pub const DEFAULT_APP_ID: &str = "bubble-vault";

/// Environment variable name selecting the network by key.
pub const NETWORK_ENV: &str = "VAULT_NETWORK";

/// Environment variable name for the RPC endpoint override.
pub const RPC_URL_ENV: &str = "VAULT_RPC_URL";

/// Environment variable name for the storage provider override.
///
/// Replaces the provider table entry for the configured network only.
pub const PROVIDER_URL_ENV: &str = "VAULT_PROVIDER_URL";

/// Environment variable name for the deploying wallet key as hex.
///
/// The wallet pays for deployment and its address names the session.
/// It never signs object-store requests; the session key does.
pub const WALLET_KEY_ENV: &str = "VAULT_WALLET_KEY";

/// Environment variable name for a PEM file holding the deploying wallet key.
pub const WALLET_KEY_PATH_ENV: &str = "VAULT_WALLET_KEY_PATH";

/// Environment variable name for the access-control contract bytecode file.
pub const CONTRACT_BYTECODE_PATH_ENV: &str = "VAULT_CONTRACT_BYTECODE_PATH";

/// Environment variable name for the log output format.
///
/// # Values
/// - `json`: one JSON object per line
/// - anything else: human-readable output
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("missing wallet key: set {WALLET_KEY_ENV} or {WALLET_KEY_PATH_ENV}")]
    MissingWalletKey,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Where the deploying wallet key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum WalletKeySource {
    Hex(String),
    PemFile(PathBuf),
}

impl std::fmt::Debug for WalletKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletKeySource::Hex(_) => f.write_str("Hex([REDACTED])"),
            WalletKeySource::PemFile(path) => f.debug_tuple("PemFile").field(path).finish(),
        }
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub app_id: String,
    pub network: NetworkConfig,
    pub rpc_url: Option<String>,
    pub provider_url: Option<Url>,
    pub wallet_key: Option<WalletKeySource>,
    pub contract_bytecode_path: Option<PathBuf>,
}

impl VaultConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let network = match get(NETWORK_ENV) {
            Some(key) => network_by_key(&key).ok_or(ConfigError::UnknownNetwork(key))?,
            None => BASE_GOERLI,
        };

        let provider_url = get(PROVIDER_URL_ENV)
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
                    name: PROVIDER_URL_ENV,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        // A hex key wins over a PEM path when both are set
        let wallet_key = get(WALLET_KEY_ENV)
            .map(WalletKeySource::Hex)
            .or_else(|| get(WALLET_KEY_PATH_ENV).map(|p| WalletKeySource::PemFile(p.into())));

        Ok(Self {
            data_dir: get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()).into(),
            app_id: get(APP_ID_ENV).unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            network,
            rpc_url: get(RPC_URL_ENV),
            provider_url,
            wallet_key,
            contract_bytecode_path: get(CONTRACT_BYTECODE_PATH_ENV).map(PathBuf::from),
        })
    }

    /// Builtin provider table with this network's override applied.
    pub fn provider_table(&self) -> ProviderTable {
        let table = ProviderTable::builtin();
        match &self.provider_url {
            Some(url) => table.with_endpoint(self.network.chain_id, url.clone()),
            None => table,
        }
    }

    /// Signer for the deploying wallet.
    pub fn wallet_signer(&self) -> Result<PrivateKeySigner, ConfigError> {
        match self.wallet_key.as_ref().ok_or(ConfigError::MissingWalletKey)? {
            WalletKeySource::Hex(hex) => Ok(signing::signer_from_hex(hex)?),
            WalletKeySource::PemFile(path) => {
                let pem = std::fs::read(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                Ok(signing::signer_from_pem(&pem)?)
            }
        }
    }

    /// Contract creation bytecode, or empty when none is configured.
    pub fn contract_bytecode(&self) -> Result<Bytes, ConfigError> {
        let Some(path) = &self.contract_bytecode_path else {
            return Ok(Bytes::new());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(contract::parse_bytecode(&raw)?)
    }
}
