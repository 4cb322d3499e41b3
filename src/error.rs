// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::blockchain::ChainError;
use crate::identity::IdentityError;
use crate::object_store::ObjectStoreError;
use crate::storage::SessionStoreError;

/// Errors surfaced by the session coordinator and the vault index.
///
/// Nothing in this crate retries; every collaborator failure is handed back
/// to the caller as one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// A vault operation was invoked before the session reached `Ready`,
    /// or after the vault was torn down.
    #[error("vault not initialised")]
    NotInitialized,

    /// Local durable storage for the session record is unavailable.
    #[error("identity persistence failed: {0}")]
    IdentityPersistence(#[from] SessionStoreError),

    /// Persisted key material could not be turned back into an identity.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Deploying or revoking the access-control record failed.
    #[error("chain operation failed: {0}")]
    ChainOperation(#[from] ChainError),

    /// A remote object-store call failed.
    #[error("storage operation failed: {0}")]
    StorageOperation(#[from] ObjectStoreError),

    /// The name index could not be serialized.
    #[error("index encoding failed: {0}")]
    IndexEncoding(#[from] serde_json::Error),

    /// The record was deployed on a chain with no known storage provider.
    #[error("no storage provider configured for chain {0}")]
    UnsupportedChain(u64),

    /// A rename targeted a name that is already in the vault.
    #[error("file already exists: {0}")]
    AlreadyExists(String),
}

impl VaultError {
    /// True when the object store reported the key as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::StorageOperation(ObjectStoreError::NotFound(_)))
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_collaborator_errors() {
        let err: VaultError = ObjectStoreError::NotFound("0xabc".to_string()).into();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "storage operation failed: object not found: 0xabc"
        );

        let err: VaultError = ChainError::RpcError("timeout".to_string()).into();
        assert!(matches!(err, VaultError::ChainOperation(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn messages_are_stable() {
        assert_eq!(VaultError::NotInitialized.to_string(), "vault not initialised");
        assert_eq!(
            VaultError::UnsupportedChain(5).to_string(),
            "no storage provider configured for chain 5"
        );
        assert_eq!(
            VaultError::AlreadyExists("a.txt".to_string()).to_string(),
            "file already exists: a.txt"
        );
    }
}
