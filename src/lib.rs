// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Vault - Private File Vault
//!
//! Stores a user's files in a remote, encrypted, content-addressed store
//! whose access rights are anchored by a per-user access-control record on
//! chain.
//!
//! ## Modules
//!
//! - `session` - Bootstrap/resume state machine producing a ready vault
//! - `vault` - Name index over content keys and the visible file listing
//! - `blockchain` - Access-control record deployment and revocation (alloy)
//! - `object_store` - Remote store boundary, JSON-RPC client, in-memory store
//! - `storage` - Persisted session records (redb)
//! - `identity` - Session signing keys

pub mod blockchain;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod object_store;
pub mod session;
pub mod storage;
pub mod vault;

#[cfg(test)]
mod testing;
