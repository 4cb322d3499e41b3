// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for local session storage.

use std::path::{Path, PathBuf};

/// Default base directory for persisted session state.
pub const DATA_ROOT: &str = "./vault-data";

/// Storage path utilities.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all local data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Embedded database holding one record per session.
    pub fn sessions_db(&self) -> PathBuf {
        self.root.join("sessions.redb")
    }
}
