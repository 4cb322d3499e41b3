// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network constants and the chain → storage provider table.

use std::collections::HashMap;

use alloy::primitives::Address;
use url::Url;

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Short name used in configuration (e.g. `base-goerli`)
    pub key: &'static str,
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Vault storage provider hosting scopes for this chain, if any
    pub provider_url: Option<&'static str>,
}

/// Base Goerli testnet, served by the public vault provider.
pub const BASE_GOERLI: NetworkConfig = NetworkConfig {
    key: "base-goerli",
    name: "Base Goerli Testnet",
    chain_id: 84531,
    rpc_url: "https://goerli.base.org",
    provider_url: Some("https://vault.bubbleprotocol.com/v2/base-goerli"),
};

/// Local development chain (anvil / hardhat). No default provider.
pub const LOCAL_DEVNET: NetworkConfig = NetworkConfig {
    key: "local",
    name: "Local Devnet",
    chain_id: 31337,
    rpc_url: "http://127.0.0.1:8545",
    provider_url: None,
};

/// Every network this build knows about.
pub const KNOWN_NETWORKS: &[NetworkConfig] = &[BASE_GOERLI, LOCAL_DEVNET];

/// Look up a network by its configuration key.
pub fn network_by_key(raw: &str) -> Option<NetworkConfig> {
    let value = raw.trim().to_ascii_lowercase();
    KNOWN_NETWORKS.iter().find(|n| n.key == value).cloned()
}

/// Result of deploying an access-control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedRecord {
    pub record_address: Address,
    pub chain_id: u64,
}

/// Static mapping from chain id to the storage provider endpoint.
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    endpoints: HashMap<u64, Url>,
}

impl ProviderTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded from [`KNOWN_NETWORKS`].
    pub fn builtin() -> Self {
        let endpoints = KNOWN_NETWORKS
            .iter()
            .filter_map(|n| Some((n.chain_id, Url::parse(n.provider_url?).ok()?)))
            .collect();
        Self { endpoints }
    }

    /// Add or replace the endpoint for a chain.
    pub fn with_endpoint(mut self, chain_id: u64, endpoint: Url) -> Self {
        self.endpoints.insert(chain_id, endpoint);
        self
    }

    pub fn resolve(&self, chain_id: u64) -> Option<&Url> {
        self.endpoints.get(&chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_serves_base_goerli_only() {
        let table = ProviderTable::builtin();
        assert_eq!(
            table.resolve(BASE_GOERLI.chain_id).map(Url::as_str),
            Some("https://vault.bubbleprotocol.com/v2/base-goerli")
        );
        assert!(table.resolve(LOCAL_DEVNET.chain_id).is_none());
    }

    #[test]
    fn override_replaces_endpoint() {
        let custom = Url::parse("http://localhost:8131/").unwrap();
        let table = ProviderTable::builtin().with_endpoint(BASE_GOERLI.chain_id, custom.clone());
        assert_eq!(table.resolve(BASE_GOERLI.chain_id), Some(&custom));
    }

    #[test]
    fn network_lookup_is_case_insensitive() {
        assert_eq!(network_by_key(" Base-Goerli "), Some(BASE_GOERLI));
        assert_eq!(network_by_key("local"), Some(LOCAL_DEVNET));
        assert!(network_by_key("mainnet").is_none());
    }
}
