// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Versioned persisted session record.
//!
//! ## Schema
//!
//! ```text
//! { "version": 1,
//!   "identity_key": "<hex private key>",
//!   "locator": { "chain_id": 84531, "record_address": "0x…", "provider_endpoint": "https://…" } }
//! ```
//!
//! `locator` and both of its optional fields are omitted until known.
//!
//! ## Legacy Records
//!
//! Records written before versioning look like
//! `{"key": "<hex>", "bubbleId": {"chain": 84531, "contract": "0x…", "provider": "https://…"}}`
//! and are migrated on read. A legacy record without a key carries no
//! progress and reads as absent.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use url::Url;

use super::session_store::{SessionStoreError, SessionStoreResult};
use crate::models::VaultLocator;

/// Schema version written by this build.
pub const CURRENT_RECORD_VERSION: u32 = 1;

/// The only session state that survives a restart.
///
/// The identity key is mandatory, so a record can never point at a deployed
/// contract without the key that controls it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSessionRecord {
    pub version: u32,
    pub identity_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<VaultLocator>,
}

impl PersistedSessionRecord {
    pub fn new(identity_key: impl Into<String>, locator: Option<VaultLocator>) -> Self {
        Self {
            version: CURRENT_RECORD_VERSION,
            identity_key: identity_key.into(),
            locator,
        }
    }

    pub fn encode(&self) -> SessionStoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode stored bytes, migrating older layouts.
    pub fn decode(bytes: &[u8]) -> SessionStoreResult<Option<Self>> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        migrate(value)
    }
}

#[derive(Debug, Deserialize)]
struct LegacyRecord {
    #[serde(default)]
    key: Option<String>,
    #[serde(default, rename = "bubbleId")]
    bubble_id: Option<LegacyBubbleId>,
}

#[derive(Debug, Deserialize)]
struct LegacyBubbleId {
    chain: u64,
    #[serde(default)]
    contract: Option<Address>,
    #[serde(default)]
    provider: Option<Url>,
}

/// Bring any known record layout up to [`CURRENT_RECORD_VERSION`].
pub fn migrate(value: serde_json::Value) -> SessionStoreResult<Option<PersistedSessionRecord>> {
    match value.get("version").map(serde_json::Value::as_u64) {
        Some(Some(v)) if v == u64::from(CURRENT_RECORD_VERSION) => {
            Ok(Some(serde_json::from_value(value)?))
        }
        Some(Some(v)) => Err(SessionStoreError::UnsupportedVersion(v)),
        Some(None) => Err(SessionStoreError::Corrupt(
            "record version is not a number".to_string(),
        )),
        None => migrate_legacy(serde_json::from_value(value)?),
    }
}

fn migrate_legacy(legacy: LegacyRecord) -> SessionStoreResult<Option<PersistedSessionRecord>> {
    let locator = legacy.bubble_id.map(|bubble| VaultLocator {
        chain_id: bubble.chain,
        record_address: bubble.contract,
        provider_endpoint: bubble.provider,
    });

    let Some(key) = legacy.key else {
        if locator.as_ref().is_some_and(|l| l.record_address.is_some()) {
            return Err(SessionStoreError::Corrupt(
                "legacy record references a contract without its key".to_string(),
            ));
        }
        return Ok(None);
    };

    let key = key.trim_start_matches("0x").to_string();
    tracing::info!("Migrated legacy session record to version {CURRENT_RECORD_VERSION}");
    Ok(Some(PersistedSessionRecord::new(key, locator)))
}
