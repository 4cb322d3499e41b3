// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Local Session Storage
//!
//! Persists the one piece of state that must survive a restart: the session
//! key and how far vault creation got.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   sessions.redb    # session_id → versioned JSON record
//! ```
//!
//! ## Write Points
//!
//! The coordinator reads the record once when a session is opened and writes
//! it only at these points:
//!
//! 1. right after a session key is generated
//! 2. right after the access-control record is deployed
//! 3. right after the remote scope is created
//! 4. when the vault is terminated (locator cleared)

pub mod paths;
pub mod record;
pub mod session_store;

pub use paths::StoragePaths;
pub use record::{PersistedSessionRecord, CURRENT_RECORD_VERSION};
pub use session_store::{
    MemorySessionStore, PersistedSessionStore, RedbSessionStore, SessionStoreError,
    SessionStoreResult,
};
