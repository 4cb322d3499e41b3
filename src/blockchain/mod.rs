// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for the vault's access-control record.
//!
//! This module provides functionality for:
//! - Deploying the per-vault access-control contract
//! - Terminating (revoking) it when the vault is deleted
//! - Resolving which storage provider serves a given chain
//! - Parsing wallet key material

pub mod client;
pub mod contract;
pub mod signing;
pub mod types;

pub use client::{AccessControlChain, AlloyAccessControl, ChainError};
pub use types::*;
