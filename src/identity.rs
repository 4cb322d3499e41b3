// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session identity: the secp256k1 key that owns the access-control record
//! and signs every object-store request.
//!
//! The key is generated once per session and persisted as hex. It is distinct
//! from the user's wallet, which only pays for deployment.

use std::fmt;
use std::sync::Arc;

use alloy::{
    primitives::{Address, Signature},
    signers::{local::PrivateKeySigner, SignerSync},
};

use crate::blockchain::signing;

/// A signing identity.
pub trait Identity: Send + Sync + fmt::Debug {
    /// Public address derived from the key.
    fn address(&self) -> Address;

    /// Private key material in the form it is persisted (hex, no `0x`).
    fn key_material(&self) -> String;

    /// EIP-191 personal-message signature.
    fn sign_message(&self, message: &[u8]) -> Result<Signature, IdentityError>;
}

/// Creates and restores identities.
pub trait IdentityProvider: Send + Sync {
    fn generate(&self) -> Result<Arc<dyn Identity>, IdentityError>;

    fn restore(&self, key_material: &str) -> Result<Arc<dyn Identity>, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Local secp256k1 key held in memory.
#[derive(Clone)]
pub struct SessionKey {
    signer: PrivateKeySigner,
}

impl SessionKey {
    /// Fresh random key.
    pub fn generate() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Restore from hex key material (a leading `0x` is accepted).
    pub fn from_hex(key_hex: &str) -> Result<Self, IdentityError> {
        let signer = signing::signer_from_hex(key_hex)
            .map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
        Ok(Self { signer })
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl Identity for SessionKey {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn key_material(&self) -> String {
        alloy::hex::encode(self.signer.to_bytes())
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature, IdentityError> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| IdentityError::Signing(e.to_string()))
    }
}

/// Provider producing [`SessionKey`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalKeyProvider;

impl IdentityProvider for LocalKeyProvider {
    fn generate(&self) -> Result<Arc<dyn Identity>, IdentityError> {
        let key = SessionKey::generate();
        tracing::debug!(address = %key.address(), "Generated session key");
        Ok(Arc::new(key))
    }

    fn restore(&self, key_material: &str) -> Result<Arc<dyn Identity>, IdentityError> {
        Ok(Arc::new(SessionKey::from_hex(key_material)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_material_round_trips_to_same_address() {
        let key = SessionKey::generate();
        let restored = SessionKey::from_hex(&key.key_material()).unwrap();
        assert_eq!(key.address(), restored.address());
        assert_eq!(key.key_material().len(), 64);
    }

    #[test]
    fn generated_keys_are_distinct() {
        let provider = LocalKeyProvider;
        let a = provider.generate().unwrap();
        let b = provider.generate().unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn signature_recovers_to_signer() {
        let key = SessionKey::generate();
        let signature = key.sign_message(b"packet").unwrap();
        let recovered = signature.recover_address_from_msg(b"packet").unwrap();
        assert_eq!(recovered, key.address());
    }

    #[test]
    fn restore_rejects_bad_material() {
        let err = LocalKeyProvider.restore("xyz").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidKey(_)));
    }

    #[test]
    fn debug_output_hides_key() {
        let key = SessionKey::generate();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&key.key_material()));
    }
}
