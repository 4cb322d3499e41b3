// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Failure-injecting collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::blockchain::{AccessControlChain, ChainError, DeployedRecord, BASE_GOERLI};
use crate::identity::Identity;
use crate::models::{ContentKey, ResolvedLocator};
use crate::object_store::{
    EncryptedObjectStore, InMemoryObjectStore, ObjectMetadata, ObjectStoreError,
    ObjectStoreResult, StoreConnector,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    List,
    Read,
    Write,
    Delete,
    Terminate,
}

/// In-memory store whose calls can be made to fail on demand.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: InMemoryObjectStore,
    failing: Mutex<Vec<(StoreOp, Option<ContentKey>)>>,
    calls: Mutex<HashMap<StoreOp, usize>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inner(&self) -> &InMemoryObjectStore {
        &self.inner
    }

    /// Fail every call of `op`.
    pub fn fail(&self, op: StoreOp) {
        self.failing.lock().unwrap().push((op, None));
    }

    /// Fail calls of `op` that target `key` only.
    pub fn fail_key(&self, op: StoreOp, key: &ContentKey) {
        self.failing.lock().unwrap().push((op, Some(key.clone())));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    fn check(&self, op: StoreOp, key: Option<&ContentKey>) -> ObjectStoreResult<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        let failing = self.failing.lock().unwrap();
        let hit = failing.iter().any(|(failing_op, failing_key)| {
            *failing_op == op && (failing_key.is_none() || failing_key.as_ref() == key)
        });
        if hit {
            return Err(ObjectStoreError::Transport(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl EncryptedObjectStore for FlakyStore {
    async fn create_scope(&self) -> ObjectStoreResult<()> {
        self.check(StoreOp::Create, None)?;
        self.inner.create_scope().await
    }

    async fn list_keys(&self, root: &ContentKey) -> ObjectStoreResult<Vec<ObjectMetadata>> {
        self.check(StoreOp::List, None)?;
        self.inner.list_keys(root).await
    }

    async fn read_key(&self, key: &ContentKey) -> ObjectStoreResult<Vec<u8>> {
        self.check(StoreOp::Read, Some(key))?;
        self.inner.read_key(key).await
    }

    async fn write_key(&self, key: &ContentKey, bytes: &[u8]) -> ObjectStoreResult<()> {
        self.check(StoreOp::Write, Some(key))?;
        self.inner.write_key(key, bytes).await
    }

    async fn delete_key(&self, key: &ContentKey) -> ObjectStoreResult<()> {
        self.check(StoreOp::Delete, Some(key))?;
        self.inner.delete_key(key).await
    }

    async fn terminate_scope(&self) -> ObjectStoreResult<()> {
        self.check(StoreOp::Terminate, None)?;
        self.inner.terminate_scope().await
    }
}

/// Hands the same [`FlakyStore`] out for every locator.
#[derive(Debug)]
pub struct FlakyConnector {
    store: Arc<FlakyStore>,
}

impl FlakyConnector {
    pub fn new(store: Arc<FlakyStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

impl StoreConnector for FlakyConnector {
    fn connect(
        &self,
        _locator: &ResolvedLocator,
        _identity: Arc<dyn Identity>,
    ) -> ObjectStoreResult<Arc<dyn EncryptedObjectStore>> {
        let store: Arc<dyn EncryptedObjectStore> = self.store.clone();
        Ok(store)
    }
}

/// Chain double that hands out sequential record addresses.
#[derive(Debug)]
pub struct ScriptedChain {
    chain_id: u64,
    fail_deploy: AtomicBool,
    fail_revoke: AtomicBool,
    deployments: Mutex<Vec<(Address, Address)>>,
    revoked: Mutex<Vec<Address>>,
}

impl ScriptedChain {
    /// Deploys on Base Goerli, which the builtin provider table serves.
    pub fn new() -> Arc<Self> {
        Self::on_chain(BASE_GOERLI.chain_id)
    }

    pub fn on_chain(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            fail_deploy: AtomicBool::new(false),
            fail_revoke: AtomicBool::new(false),
            deployments: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_deploy(&self, fail: bool) {
        self.fail_deploy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_revoke(&self, fail: bool) {
        self.fail_revoke.store(fail, Ordering::SeqCst);
    }

    /// `(owner, record)` pairs in deployment order.
    pub fn deployments(&self) -> Vec<(Address, Address)> {
        self.deployments.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<Address> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccessControlChain for ScriptedChain {
    async fn deploy_access_record(&self, owner: Address) -> Result<DeployedRecord, ChainError> {
        if self.fail_deploy.load(Ordering::SeqCst) {
            return Err(ChainError::TransactionFailed("scripted deploy failure".to_string()));
        }
        let mut deployments = self.deployments.lock().unwrap();
        let record_address = Address::with_last_byte(deployments.len() as u8 + 1);
        deployments.push((owner, record_address));
        Ok(DeployedRecord {
            record_address,
            chain_id: self.chain_id,
        })
    }

    async fn revoke_access_record(&self, record: Address) -> Result<(), ChainError> {
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(ChainError::RpcError("scripted revoke failure".to_string()));
        }
        self.revoked.lock().unwrap().push(record);
        Ok(())
    }
}
