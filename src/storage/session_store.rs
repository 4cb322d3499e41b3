// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable session record storage.
//!
//! ## Table Layout
//!
//! - `sessions`: session_id → JSON-encoded [`PersistedSessionRecord`]
//!
//! Records are stored as the exact bytes produced by
//! [`PersistedSessionRecord::encode`], so an unchanged record stays
//! bit-identical across saves.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use redb::{Database, ReadableDatabase, TableDefinition};

use super::record::PersistedSessionRecord;

/// Primary table: session_id → serialized record.
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported record version: {0}")]
    UnsupportedVersion(u64),

    #[error("corrupt session record: {0}")]
    Corrupt(String),

    #[error("session store lock poisoned")]
    Poisoned,
}

pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// Local durable key/value storage keyed by session identifier.
pub trait PersistedSessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> SessionStoreResult<Option<PersistedSessionRecord>>;

    fn save(&self, session_id: &str, record: &PersistedSessionRecord) -> SessionStoreResult<()>;
}

// =============================================================================
// RedbSessionStore
// =============================================================================

/// Embedded ACID session store.
pub struct RedbSessionStore {
    db: Database,
}

impl RedbSessionStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> SessionStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Stored bytes for a session, exactly as written.
    pub fn raw(&self, session_id: &str) -> SessionStoreResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        Ok(table.get(session_id)?.map(|value| value.value().to_vec()))
    }
}

impl PersistedSessionStore for RedbSessionStore {
    fn load(&self, session_id: &str) -> SessionStoreResult<Option<PersistedSessionRecord>> {
        match self.raw(session_id)? {
            Some(bytes) => PersistedSessionRecord::decode(&bytes),
            None => Ok(None),
        }
    }

    fn save(&self, session_id: &str, record: &PersistedSessionRecord) -> SessionStoreResult<()> {
        let bytes = record.encode()?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            table.insert(session_id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// MemorySessionStore
// =============================================================================

/// Volatile session store. Counts writes so callers can observe persistence
/// points.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<usize>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw bytes, e.g. a record in an older layout.
    pub fn insert_raw(&self, session_id: &str, bytes: Vec<u8>) -> SessionStoreResult<()> {
        self.records
            .lock()
            .map_err(|_| SessionStoreError::Poisoned)?
            .insert(session_id.to_string(), bytes);
        Ok(())
    }

    pub fn raw(&self, session_id: &str) -> Option<Vec<u8>> {
        self.records.lock().ok()?.get(session_id).cloned()
    }

    /// Number of `save` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }

    fn bump(&self) -> SessionStoreResult<()> {
        *self.writes.lock().map_err(|_| SessionStoreError::Poisoned)? += 1;
        Ok(())
    }
}

impl PersistedSessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> SessionStoreResult<Option<PersistedSessionRecord>> {
        match self.raw(session_id) {
            Some(bytes) => PersistedSessionRecord::decode(&bytes),
            None => Ok(None),
        }
    }

    fn save(&self, session_id: &str, record: &PersistedSessionRecord) -> SessionStoreResult<()> {
        let bytes = record.encode()?;
        self.insert_raw(session_id, bytes)?;
        self.bump()
    }
}
