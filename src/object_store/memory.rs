// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process object store.
//!
//! Behaves like a provider scope: nothing can be read or written until
//! `create_scope` has run, and `terminate_scope` drops every object.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    EncryptedObjectStore, ObjectMetadata, ObjectStoreError, ObjectStoreResult, StoreConnector,
};
use crate::identity::Identity;
use crate::models::{ContentKey, ResolvedLocator};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

/// Scope contents; `None` while the scope does not exist.
type Scope = Option<BTreeMap<ContentKey, StoredObject>>;

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    scope: Mutex<Scope>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scope currently exists.
    pub fn is_active(&self) -> bool {
        self.lock().map(|scope| scope.is_some()).unwrap_or(false)
    }

    /// Number of stored objects, including the index object.
    pub fn object_count(&self) -> usize {
        self.lock()
            .ok()
            .and_then(|scope| scope.as_ref().map(BTreeMap::len))
            .unwrap_or(0)
    }

    /// Store an object directly, bypassing the vault index.
    pub fn insert_raw(&self, key: ContentKey, bytes: Vec<u8>) -> ObjectStoreResult<()> {
        let mut scope = self.lock()?;
        let objects = scope.as_mut().ok_or(ObjectStoreError::ScopeNotFound)?;
        put(objects, key, bytes);
        Ok(())
    }

    fn lock(&self) -> ObjectStoreResult<MutexGuard<'_, Scope>> {
        self.scope
            .lock()
            .map_err(|_| ObjectStoreError::Transport("store lock poisoned".to_string()))
    }
}

fn put(objects: &mut BTreeMap<ContentKey, StoredObject>, key: ContentKey, bytes: Vec<u8>) {
    let now = Utc::now();
    let created_at = objects.get(&key).map_or(now, |existing| existing.created_at);
    objects.insert(
        key,
        StoredObject {
            bytes,
            created_at,
            modified_at: now,
        },
    );
}

#[async_trait]
impl EncryptedObjectStore for InMemoryObjectStore {
    async fn create_scope(&self) -> ObjectStoreResult<()> {
        let mut scope = self.lock()?;
        if scope.is_none() {
            *scope = Some(BTreeMap::new());
        }
        Ok(())
    }

    async fn list_keys(&self, _root: &ContentKey) -> ObjectStoreResult<Vec<ObjectMetadata>> {
        let scope = self.lock()?;
        let objects = scope.as_ref().ok_or(ObjectStoreError::ScopeNotFound)?;
        Ok(objects
            .iter()
            .map(|(key, object)| ObjectMetadata {
                key: key.clone(),
                byte_length: object.bytes.len() as u64,
                created_at: object.created_at,
                modified_at: object.modified_at,
            })
            .collect())
    }

    async fn read_key(&self, key: &ContentKey) -> ObjectStoreResult<Vec<u8>> {
        let scope = self.lock()?;
        let objects = scope.as_ref().ok_or(ObjectStoreError::ScopeNotFound)?;
        objects
            .get(key)
            .map(|object| object.bytes.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn write_key(&self, key: &ContentKey, bytes: &[u8]) -> ObjectStoreResult<()> {
        let mut scope = self.lock()?;
        let objects = scope.as_mut().ok_or(ObjectStoreError::ScopeNotFound)?;
        put(objects, key.clone(), bytes.to_vec());
        Ok(())
    }

    async fn delete_key(&self, key: &ContentKey) -> ObjectStoreResult<()> {
        let mut scope = self.lock()?;
        let objects = scope.as_mut().ok_or(ObjectStoreError::ScopeNotFound)?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn terminate_scope(&self) -> ObjectStoreResult<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// Hands out one shared [`InMemoryObjectStore`] per locator, so a resumed
/// session sees what an earlier one wrote.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    scopes: Mutex<HashMap<ResolvedLocator, Arc<InMemoryObjectStore>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store behind a locator, creating an empty (inactive) one if needed.
    pub fn store_for(&self, locator: &ResolvedLocator) -> ObjectStoreResult<Arc<InMemoryObjectStore>> {
        let mut scopes = self
            .scopes
            .lock()
            .map_err(|_| ObjectStoreError::Transport("connector lock poisoned".to_string()))?;
        Ok(scopes.entry(locator.clone()).or_default().clone())
    }
}

impl StoreConnector for MemoryConnector {
    fn connect(
        &self,
        locator: &ResolvedLocator,
        _identity: Arc<dyn Identity>,
    ) -> ObjectStoreResult<Arc<dyn EncryptedObjectStore>> {
        let store: Arc<dyn EncryptedObjectStore> = self.store_for(locator)?;
        Ok(store)
    }
}
