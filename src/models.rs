// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Data Models
//!
//! Shared types passed between the session coordinator, the vault index and
//! the external collaborators.
//!
//! ## Content Keys
//!
//! The object store only understands opaque 32-byte identifiers. A
//! [`ContentKey`] is derived from a file's *display name*, so the same name
//! always lands on the same remote object. The name index itself lives under
//! a reserved key hashed from a different domain tag, which keeps it apart
//! from every file key by construction.
//!
//! ## Locators
//!
//! A [`VaultLocator`] is filled in progressively while a vault is bootstrapped
//! and is what gets persisted. Once every coordinate is known it is turned into
//! a [`ResolvedLocator`], which has no setters and is what the vault is bound to.

use std::fmt;
use std::sync::LazyLock;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// MIME type given to objects that have no entry in the name index.
pub const GENERIC_MIME_TYPE: &str = "application/octet-stream";

/// Domain tag for keys derived from file names.
const FILE_KEY_DOMAIN: &[u8] = b"relational-vault:file\0";

/// Domain tag for the reserved index key.
const INDEX_KEY_DOMAIN: &[u8] = b"relational-vault:index\0";

static RESERVED_INDEX_KEY: LazyLock<ContentKey> =
    LazyLock::new(|| ContentKey::digest(&[INDEX_KEY_DOMAIN]));

static ROOT_KEY: LazyLock<ContentKey> =
    LazyLock::new(|| ContentKey(format!("0x{}", "0".repeat(64))));

// =============================================================================
// Content Key
// =============================================================================

/// Identifier of an object in the remote store.
///
/// Always `0x`-prefixed lowercase hex. Keys produced by
/// [`ContentKey::for_name`] are SHA-256 digests. Keys taken from a store
/// listing or a persisted index go through [`ContentKey::from_raw`], which
/// lower-cases them, so equality never depends on how a provider spells hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentKey(String);

impl ContentKey {
    /// Deterministic key for a display name.
    pub fn for_name(name: &str) -> Self {
        Self::digest(&[FILE_KEY_DOMAIN, name.as_bytes()])
    }

    /// Key under which the serialized name index is stored.
    pub fn reserved_index() -> &'static ContentKey {
        &RESERVED_INDEX_KEY
    }

    /// Directory marker passed to the store when listing the whole scope.
    pub fn root() -> &'static ContentKey {
        &ROOT_KEY
    }

    /// Normalize a key as reported by the store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let mut raw = raw.into();
        raw.make_ascii_lowercase();
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_reserved(&self) -> bool {
        self == &*RESERVED_INDEX_KEY
    }

    fn digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(format!("0x{}", alloy::hex::encode(hasher.finalize())))
    }
}

impl From<String> for ContentKey {
    fn from(raw: String) -> Self {
        Self::from_raw(raw)
    }
}

impl From<ContentKey> for String {
    fn from(key: ContentKey) -> Self {
        key.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Locators
// =============================================================================

/// Coordinates of a vault's remote scope, as persisted between runs.
///
/// `record_address` is absent until the access-control record is deployed;
/// `provider_endpoint` is absent until resolved from the provider table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultLocator {
    pub chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_endpoint: Option<Url>,
}

impl VaultLocator {
    /// Locator for a freshly deployed record whose provider is not resolved yet.
    pub fn deployed(chain_id: u64, record_address: Address) -> Self {
        Self {
            chain_id,
            record_address: Some(record_address),
            provider_endpoint: None,
        }
    }

    /// The immutable form, if every coordinate is known.
    pub fn resolved(&self) -> Option<ResolvedLocator> {
        Some(ResolvedLocator::new(
            self.chain_id,
            self.record_address?,
            self.provider_endpoint.clone()?,
        ))
    }
}

/// Fully resolved vault coordinates. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedLocator {
    chain_id: u64,
    record_address: Address,
    provider_endpoint: Url,
}

impl ResolvedLocator {
    pub fn new(chain_id: u64, record_address: Address, provider_endpoint: Url) -> Self {
        Self {
            chain_id,
            record_address,
            provider_endpoint,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn record_address(&self) -> Address {
        self.record_address
    }

    pub fn provider_endpoint(&self) -> &Url {
        &self.provider_endpoint
    }
}

impl From<&ResolvedLocator> for VaultLocator {
    fn from(resolved: &ResolvedLocator) -> Self {
        Self {
            chain_id: resolved.chain_id,
            record_address: Some(resolved.record_address),
            provider_endpoint: Some(resolved.provider_endpoint.clone()),
        }
    }
}

impl fmt::Display for ResolvedLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}",
            self.chain_id, self.record_address, self.provider_endpoint
        )
    }
}

// =============================================================================
// Index and Listing
// =============================================================================

/// One durable name mapping, as stored in the reserved index object.
///
/// Wire format: `{"hash": "0x…", "name": "report.pdf", "mimetype": "application/pdf"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(rename = "hash")]
    pub content_key: ContentKey,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
}

impl IndexEntry {
    pub fn new(display_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            content_key: ContentKey::for_name(&display_name),
            display_name,
            mime_type: mime_type.into(),
        }
    }

    /// Entry for a stored object the index knows nothing about.
    pub fn fallback(content_key: ContentKey) -> Self {
        Self {
            display_name: content_key.as_str().to_string(),
            content_key,
            mime_type: GENERIC_MIME_TYPE.to_string(),
        }
    }
}

/// A file as shown in the vault listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub content_key: ContentKey,
    pub display_name: String,
    pub mime_type: String,
    pub byte_length: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

// =============================================================================
// Session State
// =============================================================================

/// Session-level vault status. Recomputed on every `initialize()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultState {
    /// No vault context is open.
    Closed,
    /// No access-control record has been deployed yet; creation is needed.
    New,
    /// Bootstrap or resume is in progress.
    Initializing,
    /// The locator is resolved and the index has loaded.
    Ready,
    /// A post-deployment step failed.
    Failed,
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VaultState::Closed => "closed",
            VaultState::New => "new",
            VaultState::Initializing => "initializing",
            VaultState::Ready => "ready",
            VaultState::Failed => "failed",
        };
        f.write_str(label)
    }
}
