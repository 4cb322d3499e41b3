// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Index
//!
//! Maps human file names onto the content keys the remote store understands,
//! and keeps the visible listing consistent with that store.
//!
//! ## Remote Layout
//!
//! ```text
//! <reserved index key>   JSON array of {hash, name, mimetype}
//! ContentKey(name)       payload bytes, one object per file name
//! ```
//!
//! ## Ordering
//!
//! | Operation | Remote steps |
//! |-----------|--------------|
//! | write (new name) | persist index → write payload |
//! | write (existing name) | write payload (overwrites) |
//! | delete | delete payload → persist index |
//! | rename | read → write under new name → delete old |
//! | delete all | terminate scope |
//!
//! The in-memory listing only changes after every remote step succeeded.
//! A failed index persist rolls the in-memory index back.
//!
//! ## Concurrency
//!
//! Mutating operations take `&mut self`, so one instance cannot interleave
//! its own writes. Two instances bound to the same scope can: each persists
//! the index it knows, and the last writer drops the other's names. Callers
//! must keep a single writer per vault.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::error::{VaultError, VaultResult};
use crate::models::{ContentKey, FileRecord, IndexEntry, ResolvedLocator};
use crate::object_store::{EncryptedObjectStore, ObjectMetadata, ObjectStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unloaded,
    Loaded,
    Terminated,
}

/// Name index and file listing for one vault scope.
pub struct VaultIndex {
    store: Arc<dyn EncryptedObjectStore>,
    locator: ResolvedLocator,
    entries: Vec<IndexEntry>,
    listing: watch::Sender<Arc<[FileRecord]>>,
    lifecycle: Lifecycle,
}

impl VaultIndex {
    /// Bind an index to a scope. Nothing is read until [`VaultIndex::load`].
    pub fn new(store: Arc<dyn EncryptedObjectStore>, locator: ResolvedLocator) -> Self {
        let empty: Arc<[FileRecord]> = Arc::from(Vec::new());
        let (listing, _) = watch::channel(empty);
        Self {
            store,
            locator,
            entries: Vec::new(),
            listing,
            lifecycle: Lifecycle::Unloaded,
        }
    }

    pub fn locator(&self) -> &ResolvedLocator {
        &self.locator
    }

    /// Current listing snapshot, sorted by display name.
    pub fn files(&self) -> Arc<[FileRecord]> {
        self.listing.borrow().clone()
    }

    /// Find a listed file by display name.
    pub fn find(&self, display_name: &str) -> Option<FileRecord> {
        self.listing
            .borrow()
            .iter()
            .find(|record| record.display_name == display_name)
            .cloned()
    }

    /// Receive a new snapshot after every listing change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<[FileRecord]>> {
        self.listing.subscribe()
    }

    pub fn is_loaded(&self) -> bool {
        self.lifecycle == Lifecycle::Loaded
    }

    pub fn is_terminated(&self) -> bool {
        self.lifecycle == Lifecycle::Terminated
    }

    /// Read the index and reconcile it with the raw key listing.
    ///
    /// A missing or unparsable index is treated as empty; objects without a
    /// name are listed under their raw key.
    pub async fn load(&mut self) -> VaultResult<Arc<[FileRecord]>> {
        if self.is_terminated() {
            return Err(VaultError::NotInitialized);
        }

        let entries = self.read_index().await?;
        let objects = self.store.list_keys(ContentKey::root()).await?;
        let listing = reconcile(&entries, objects);

        tracing::debug!(
            vault = %self.locator,
            named = entries.len(),
            listed = listing.len(),
            "Vault index loaded"
        );

        self.entries = entries;
        self.lifecycle = Lifecycle::Loaded;
        Ok(self.publish(listing))
    }

    /// Store `bytes` under `display_name`, replacing any earlier content.
    ///
    /// The MIME type is only recorded the first time a name is written.
    pub async fn write_file(
        &mut self,
        display_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> VaultResult<FileRecord> {
        self.ensure_loaded()?;
        let key = ContentKey::for_name(display_name);

        if self.entry(&key).is_none() {
            self.entries.push(IndexEntry::new(display_name, mime_type));
            if let Err(e) = self.persist_index().await {
                self.entries.pop();
                return Err(e);
            }
        }

        self.store.write_key(&key, bytes).await?;

        let now = Utc::now();
        let current = self.files();
        let previous = current.iter().find(|r| r.content_key == key);
        let record = FileRecord {
            content_key: key.clone(),
            display_name: display_name.to_string(),
            mime_type: self
                .entry(&key)
                .map_or_else(|| mime_type.to_string(), |e| e.mime_type.clone()),
            byte_length: bytes.len() as u64,
            created_at: previous.map_or(now, |r| r.created_at),
            modified_at: now,
        };

        let mut listing: Vec<FileRecord> = current
            .iter()
            .filter(|r| r.content_key != key)
            .cloned()
            .collect();
        listing.push(record.clone());
        sort_listing(&mut listing);
        self.publish(listing);

        tracing::info!(key = %key, bytes = bytes.len(), "File written");
        Ok(record)
    }

    /// Raw payload bytes for a listed file.
    pub async fn read_file(&self, record: &FileRecord) -> VaultResult<Vec<u8>> {
        self.ensure_loaded()?;
        tracing::debug!(key = %record.content_key, "Reading file");
        Ok(self.store.read_key(&record.content_key).await?)
    }

    /// Remove a file's payload and its name.
    ///
    /// A payload that is already gone counts as deleted. If the payload is
    /// deleted but the index cannot be persisted, the name stays listed with
    /// no content behind it; reads fail with not-found until the delete is
    /// retried.
    pub async fn delete_file(&mut self, record: &FileRecord) -> VaultResult<()> {
        self.ensure_loaded()?;
        let key = &record.content_key;

        match self.store.delete_key(key).await {
            Ok(()) => {}
            Err(ObjectStoreError::NotFound(_)) => {
                tracing::debug!(key = %key, "Payload already absent");
            }
            Err(e) => return Err(e.into()),
        }

        if self.entry(key).is_some() {
            let previous = self.entries.clone();
            self.entries.retain(|e| &e.content_key != key);
            if let Err(e) = self.persist_index().await {
                self.entries = previous;
                return Err(e);
            }
        }

        let listing: Vec<FileRecord> = self
            .files()
            .iter()
            .filter(|r| &r.content_key != key)
            .cloned()
            .collect();
        self.publish(listing);

        tracing::info!(key = %key, "File deleted");
        Ok(())
    }

    /// Move a file to a new name. Renaming to the current name is a no-op.
    pub async fn rename_file(&mut self, record: &FileRecord, new_name: &str) -> VaultResult<FileRecord> {
        self.ensure_loaded()?;
        if record.display_name == new_name {
            return Ok(record.clone());
        }

        let new_key = ContentKey::for_name(new_name);
        let taken = self.entry(&new_key).is_some()
            || self.files().iter().any(|r| r.content_key == new_key);
        if taken {
            return Err(VaultError::AlreadyExists(new_name.to_string()));
        }

        let bytes = self.read_file(record).await?;
        let renamed = self.write_file(new_name, &record.mime_type, &bytes).await?;
        self.delete_file(record).await?;

        tracing::info!(from = %record.content_key, to = %renamed.content_key, "File renamed");
        Ok(renamed)
    }

    /// Terminate the remote scope and forget everything.
    ///
    /// Local state is cleared even when termination fails. The instance is
    /// unusable afterwards.
    pub async fn delete_all(&mut self) -> VaultResult<()> {
        if self.is_terminated() {
            return Err(VaultError::NotInitialized);
        }

        let result = self.store.terminate_scope().await;

        self.entries.clear();
        self.lifecycle = Lifecycle::Terminated;
        self.publish(Vec::new());

        match &result {
            Ok(()) => tracing::info!(vault = %self.locator, "Vault scope terminated"),
            Err(e) => tracing::warn!(vault = %self.locator, error = %e, "Scope termination failed"),
        }
        result.map_err(VaultError::from)
    }

    fn ensure_loaded(&self) -> VaultResult<()> {
        match self.lifecycle {
            Lifecycle::Loaded => Ok(()),
            Lifecycle::Unloaded | Lifecycle::Terminated => Err(VaultError::NotInitialized),
        }
    }

    fn entry(&self, key: &ContentKey) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| &e.content_key == key)
    }

    async fn read_index(&self) -> VaultResult<Vec<IndexEntry>> {
        let bytes = match self.store.read_key(ContentKey::reserved_index()).await {
            Ok(bytes) => bytes,
            Err(ObjectStoreError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(
                    vault = %self.locator,
                    error = %e,
                    "Index unreadable, listing raw keys only"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn persist_index(&self) -> VaultResult<()> {
        let bytes = serde_json::to_vec(&self.entries)?;
        self.store
            .write_key(ContentKey::reserved_index(), &bytes)
            .await?;
        Ok(())
    }

    fn publish(&self, listing: Vec<FileRecord>) -> Arc<[FileRecord]> {
        let snapshot: Arc<[FileRecord]> = Arc::from(listing);
        self.listing.send_replace(snapshot.clone());
        snapshot
    }
}

/// Merge raw store metadata with known names.
fn reconcile(entries: &[IndexEntry], objects: Vec<ObjectMetadata>) -> Vec<FileRecord> {
    let mut listing: Vec<FileRecord> = objects
        .into_iter()
        .filter(|object| !object.key.is_reserved())
        .map(|object| {
            let entry = entries
                .iter()
                .find(|e| e.content_key == object.key)
                .cloned()
                .unwrap_or_else(|| IndexEntry::fallback(object.key.clone()));
            FileRecord {
                content_key: object.key,
                display_name: entry.display_name,
                mime_type: entry.mime_type,
                byte_length: object.byte_length,
                created_at: object.created_at,
                modified_at: object.modified_at,
            }
        })
        .collect();
    sort_listing(&mut listing);
    listing
}

fn sort_listing(listing: &mut [FileRecord]) {
    listing.sort_by(|a, b| a.display_name.cmp(&b.display_name));
}
