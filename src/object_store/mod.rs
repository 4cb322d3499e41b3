// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Object Store Boundary
//!
//! The remote store is a content-addressed key/value scope identified by a
//! [`ResolvedLocator`]. It knows nothing about file names; the vault index
//! layers names on top.
//!
//! ## Contract
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `create_scope` | ok, including when the scope already exists |
//! | `list_keys(root)` | `{key, byte_length, created_at, modified_at}` per object |
//! | `read_key` | bytes, or [`ObjectStoreError::NotFound`] |
//! | `write_key` | ok (overwrites) |
//! | `delete_key` | ok, or [`ObjectStoreError::NotFound`] |
//! | `terminate_scope` | ok |
//!
//! Payload encryption is the store's own concern and is not modelled here.

pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::identity::Identity;
use crate::models::{ContentKey, ResolvedLocator};

pub use http::{HttpConnector, HttpObjectStore};
pub use memory::{InMemoryObjectStore, MemoryConnector};

/// Raw metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub key: ContentKey,
    pub byte_length: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Errors reported by an object store.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("scope does not exist")]
    ScopeNotFound,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("provider rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("request signing failed: {0}")]
    Signing(String),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// A single vault scope in the remote store.
#[async_trait]
pub trait EncryptedObjectStore: Send + Sync {
    async fn create_scope(&self) -> ObjectStoreResult<()>;

    async fn list_keys(&self, root: &ContentKey) -> ObjectStoreResult<Vec<ObjectMetadata>>;

    async fn read_key(&self, key: &ContentKey) -> ObjectStoreResult<Vec<u8>>;

    async fn write_key(&self, key: &ContentKey, bytes: &[u8]) -> ObjectStoreResult<()>;

    async fn delete_key(&self, key: &ContentKey) -> ObjectStoreResult<()>;

    async fn terminate_scope(&self) -> ObjectStoreResult<()>;
}

/// Opens a store handle for a resolved locator, signing as `identity`.
pub trait StoreConnector: Send + Sync {
    fn connect(
        &self,
        locator: &ResolvedLocator,
        identity: Arc<dyn Identity>,
    ) -> ObjectStoreResult<Arc<dyn EncryptedObjectStore>>;
}
