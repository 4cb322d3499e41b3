// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access-control chain client.

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes},
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use url::Url;

use super::contract::{deploy_code, IVaultAccessControl};
use super::types::{DeployedRecord, NetworkConfig};

/// On-chain access-control capability used by the session coordinator.
#[async_trait]
pub trait AccessControlChain: Send + Sync {
    /// Deploy a record owned by `owner` (the session key's address).
    async fn deploy_access_record(&self, owner: Address) -> Result<DeployedRecord, ChainError>;

    /// Terminate a previously deployed record.
    async fn revoke_access_record(&self, record: Address) -> Result<(), ChainError>;
}

/// Alloy-backed implementation talking to an EVM JSON-RPC endpoint.
pub struct AlloyAccessControl {
    network: NetworkConfig,
    rpc_url: Url,
    wallet: EthereumWallet,
    bytecode: Bytes,
}

impl AlloyAccessControl {
    /// Create a client. `rpc_url` overrides the network's default endpoint.
    pub fn new(
        network: NetworkConfig,
        rpc_url: Option<&str>,
        wallet: EthereumWallet,
        bytecode: Bytes,
    ) -> Result<Self, ChainError> {
        let rpc_url: Url = rpc_url
            .unwrap_or(network.rpc_url)
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        Ok(Self {
            network,
            rpc_url,
            wallet,
            bytecode,
        })
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn provider(&self) -> impl Provider {
        ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .connect_http(self.rpc_url.clone())
    }
}

#[async_trait]
impl AccessControlChain for AlloyAccessControl {
    async fn deploy_access_record(&self, owner: Address) -> Result<DeployedRecord, ChainError> {
        if self.bytecode.is_empty() {
            return Err(ChainError::ContractError(
                "no access-control bytecode configured".to_string(),
            ));
        }

        let provider = self.provider();
        let reported = provider
            .get_chain_id()
            .await
            .map_err(|e| ChainError::RpcError(format!("Chain id query failed: {e}")))?;
        check_chain_id(&self.network, reported)?;

        let tx = TransactionRequest::default().with_deploy_code(deploy_code(&self.bytecode, owner));

        let receipt = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::RpcError(format!("Deploy failed: {e}")))?
            .get_receipt()
            .await
            .map_err(|e| ChainError::RpcError(format!("Deploy receipt failed: {e}")))?;

        if !receipt.status() {
            return Err(ChainError::TransactionFailed(format!(
                "deployment {} reverted",
                receipt.transaction_hash
            )));
        }

        let record_address = receipt
            .contract_address
            .ok_or_else(|| ChainError::ContractError("receipt has no contract address".to_string()))?;

        tracing::info!(
            network = %self.network.name,
            owner = %owner,
            record = %record_address,
            "Access-control record deployed"
        );

        Ok(DeployedRecord {
            record_address,
            chain_id: reported,
        })
    }

    async fn revoke_access_record(&self, record: Address) -> Result<(), ChainError> {
        let provider = self.provider();
        let contract = IVaultAccessControl::new(record, provider);

        let receipt = contract
            .terminate()
            .send()
            .await
            .map_err(|e| ChainError::ContractError(format!("terminate failed: {e}")))?
            .get_receipt()
            .await
            .map_err(|e| ChainError::RpcError(format!("terminate receipt failed: {e}")))?;

        if !receipt.status() {
            return Err(ChainError::TransactionFailed(format!(
                "terminate {} reverted",
                receipt.transaction_hash
            )));
        }

        tracing::info!(
            network = %self.network.name,
            record = %record,
            "Access-control record terminated"
        );
        Ok(())
    }
}

/// The endpoint must serve the configured network, since its chain id ends up
/// in the persisted locator.
fn check_chain_id(network: &NetworkConfig, reported: u64) -> Result<(), ChainError> {
    if reported != network.chain_id {
        return Err(ChainError::ChainMismatch {
            network: network.name.to_string(),
            expected: network.chain_id,
            actual: reported,
        });
    }
    Ok(())
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC endpoint serves chain {actual}, but {network} is chain {expected}")]
    ChainMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::{signer_from_hex, wallet_from_signer};
    use crate::blockchain::types::{BASE_GOERLI, LOCAL_DEVNET};

    fn wallet() -> EthereumWallet {
        wallet_from_signer(
            signer_from_hex("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
                .unwrap(),
        )
    }

    #[test]
    fn uses_network_rpc_by_default() {
        let client =
            AlloyAccessControl::new(BASE_GOERLI, None, wallet(), Bytes::from_static(&[0x60]))
                .unwrap();
        assert_eq!(client.rpc_url.as_str(), "https://goerli.base.org/");
        assert_eq!(client.network().chain_id, 84531);
    }

    #[test]
    fn rpc_override_must_parse() {
        let err = AlloyAccessControl::new(
            LOCAL_DEVNET,
            Some("not a url"),
            wallet(),
            Bytes::from_static(&[0x60]),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ChainError::InvalidRpcUrl(_)));
    }

    #[test]
    fn endpoint_must_serve_configured_chain() {
        assert!(check_chain_id(&BASE_GOERLI, 84531).is_ok());
        let err = check_chain_id(&BASE_GOERLI, 31337).unwrap_err();
        assert!(matches!(
            err,
            ChainError::ChainMismatch {
                expected: 84531,
                actual: 31337,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn deploy_without_bytecode_fails_before_rpc() {
        let client = AlloyAccessControl::new(LOCAL_DEVNET, None, wallet(), Bytes::new()).unwrap();
        let err = client
            .deploy_access_record(Address::repeat_byte(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::ContractError(_)));
    }
}
