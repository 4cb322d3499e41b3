// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Coordinator
//!
//! Drives a session from whatever progress was persisted to a loaded
//! [`VaultIndex`].
//!
//! ## States
//!
//! ```text
//! Closed ─┐
//!         ├─ initialize() ─> Initializing ─┬─> Ready
//! New ────┘                                ├─> New      (no record deployed yet)
//!                                          └─> Failed   (record deployed, later step failed)
//! ```
//!
//! ## Bootstrap Steps
//!
//! 1. Restore the session key, or generate one and persist it at once.
//! 2. Deploy the access-control record if none is known; persist its address.
//! 3. Resolve the provider endpoint, create the remote scope, persist the
//!    completed locator.
//! 4. On resume (locator already complete) skip straight to binding.
//! 5. Load the index.
//!
//! Every step is idempotent, so recovery is simply calling
//! [`SessionCoordinator::initialize`] again. Nothing is retried internally.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::watch;

use crate::blockchain::{AccessControlChain, DeployedRecord, ProviderTable};
use crate::error::{VaultError, VaultResult};
use crate::identity::{Identity, IdentityProvider};
use crate::models::{FileRecord, ResolvedLocator, VaultLocator, VaultState};
use crate::object_store::{EncryptedObjectStore, StoreConnector};
use crate::storage::{PersistedSessionRecord, PersistedSessionStore};
use crate::vault::VaultIndex;

/// Session identifier for an application and a connected account.
pub fn session_id(app_id: &str, account: Address) -> String {
    format!("{app_id}-{}", alloy::hex::encode(account.as_slice()))
}

/// Collaborators injected into a coordinator.
#[derive(Clone)]
pub struct SessionDeps {
    pub identities: Arc<dyn IdentityProvider>,
    pub chain: Arc<dyn AccessControlChain>,
    pub connector: Arc<dyn StoreConnector>,
    pub sessions: Arc<dyn PersistedSessionStore>,
    pub providers: ProviderTable,
}

pub struct SessionCoordinator {
    session_id: String,
    deps: SessionDeps,
    record: Option<PersistedSessionRecord>,
    identity: Option<Arc<dyn Identity>>,
    vault: Option<VaultIndex>,
    state: watch::Sender<VaultState>,
}

impl SessionCoordinator {
    /// Open a session, reading its persisted record once.
    pub fn open(session_id: impl Into<String>, deps: SessionDeps) -> VaultResult<Self> {
        let session_id = session_id.into();
        let record = deps.sessions.load(&session_id)?;

        let coordinator = Self {
            session_id,
            deps,
            record,
            identity: None,
            vault: None,
            state: watch::channel(VaultState::Closed).0,
        };
        coordinator.state.send_replace(coordinator.resting_state());

        tracing::debug!(
            session_id = %coordinator.session_id,
            state = %coordinator.state(),
            "Session opened"
        );
        Ok(coordinator)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> VaultState {
        *self.state.borrow()
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<VaultState> {
        self.state.subscribe()
    }

    /// True until an access-control record has been deployed.
    pub fn is_new(&self) -> bool {
        self.locator().and_then(|l| l.record_address).is_none()
    }

    /// Locator as persisted so far.
    pub fn locator(&self) -> Option<&VaultLocator> {
        self.record.as_ref()?.locator.as_ref()
    }

    /// Address of the session key, once restored or generated.
    pub fn identity_address(&self) -> Option<Address> {
        self.identity.as_ref().map(|identity| identity.address())
    }

    /// Bring the vault to `Ready`. Safe to call repeatedly.
    pub async fn initialize(&mut self) -> VaultResult<VaultState> {
        if self.state() == VaultState::Ready && self.vault.is_some() {
            return Ok(VaultState::Ready);
        }

        self.set_state(VaultState::Initializing);
        match self.advance().await {
            Ok(vault) => {
                tracing::info!(
                    session_id = %self.session_id,
                    vault = %vault.locator(),
                    files = vault.files().len(),
                    "Vault ready"
                );
                self.vault = Some(vault);
                self.set_state(VaultState::Ready);
                Ok(VaultState::Ready)
            }
            Err(e) => {
                self.vault = None;
                let state = if self.is_new() {
                    VaultState::New
                } else {
                    VaultState::Failed
                };
                tracing::warn!(
                    session_id = %self.session_id,
                    state = %state,
                    error = %e,
                    "Vault initialisation failed"
                );
                self.set_state(state);
                Err(e)
            }
        }
    }

    async fn advance(&mut self) -> VaultResult<VaultIndex> {
        let identity = self.ensure_identity()?;
        let deployed = self.ensure_deployed(identity.address()).await?;

        let persisted_endpoint = self.locator().and_then(|l| l.provider_endpoint.clone());
        let mut vault = match persisted_endpoint {
            Some(endpoint) => {
                let locator =
                    ResolvedLocator::new(deployed.chain_id, deployed.record_address, endpoint);
                tracing::debug!(session_id = %self.session_id, vault = %locator, "Resuming vault");
                let store = self.deps.connector.connect(&locator, identity)?;
                VaultIndex::new(store, locator)
            }
            None => {
                let endpoint = self
                    .deps
                    .providers
                    .resolve(deployed.chain_id)
                    .cloned()
                    .ok_or(VaultError::UnsupportedChain(deployed.chain_id))?;
                let locator =
                    ResolvedLocator::new(deployed.chain_id, deployed.record_address, endpoint);
                let store = self.deps.connector.connect(&locator, identity)?;
                let vault = VaultIndex::new(store.clone(), locator.clone());

                store.create_scope().await?;
                self.persist_locator(Some(VaultLocator::from(&locator)))?;
                tracing::info!(session_id = %self.session_id, vault = %locator, "Vault scope created");
                vault
            }
        };

        vault.load().await?;
        Ok(vault)
    }

    fn ensure_identity(&mut self) -> VaultResult<Arc<dyn Identity>> {
        if let Some(identity) = &self.identity {
            return Ok(identity.clone());
        }

        let persisted_key = self.record.as_ref().map(|r| r.identity_key.clone());
        let identity = match persisted_key {
            Some(key) => self.deps.identities.restore(&key)?,
            None => {
                let identity = self.deps.identities.generate()?;
                let record = PersistedSessionRecord::new(identity.key_material(), None);
                self.deps.sessions.save(&self.session_id, &record)?;
                self.record = Some(record);
                tracing::info!(
                    session_id = %self.session_id,
                    address = %identity.address(),
                    "Session key generated"
                );
                identity
            }
        };

        self.identity = Some(identity.clone());
        Ok(identity)
    }

    async fn ensure_deployed(&mut self, owner: Address) -> VaultResult<DeployedRecord> {
        if let Some(locator) = self.locator() {
            if let Some(record_address) = locator.record_address {
                return Ok(DeployedRecord {
                    record_address,
                    chain_id: locator.chain_id,
                });
            }
        }

        let deployed = self.deps.chain.deploy_access_record(owner).await?;
        self.persist_locator(Some(VaultLocator::deployed(
            deployed.chain_id,
            deployed.record_address,
        )))?;
        tracing::info!(
            session_id = %self.session_id,
            record = %deployed.record_address,
            chain_id = deployed.chain_id,
            "Record address persisted"
        );
        Ok(deployed)
    }

    fn persist_locator(&mut self, locator: Option<VaultLocator>) -> VaultResult<()> {
        let Some(current) = &self.record else {
            return Err(VaultError::NotInitialized);
        };
        let updated = PersistedSessionRecord::new(current.identity_key.clone(), locator);
        self.deps.sessions.save(&self.session_id, &updated)?;
        self.record = Some(updated);
        Ok(())
    }

    /// Revoke the access-control record and tear the vault down.
    ///
    /// The record is revoked before the locator is forgotten. The session
    /// key is kept, so the next `initialize()` deploys a new record for it.
    pub async fn terminate_vault(&mut self) -> VaultResult<()> {
        let Some(record_address) = self.locator().and_then(|l| l.record_address) else {
            return Err(VaultError::NotInitialized);
        };
        let resolved = self.locator().and_then(VaultLocator::resolved);

        self.deps.chain.revoke_access_record(record_address).await?;
        tracing::info!(session_id = %self.session_id, record = %record_address, "Access record revoked");

        self.persist_locator(None)?;

        let result = match self.vault.take() {
            Some(mut vault) => vault.delete_all().await,
            None => self.terminate_unbound(resolved).await,
        };

        self.set_state(VaultState::New);
        result
    }

    /// Terminate a scope that was never bound to an index this session.
    async fn terminate_unbound(&mut self, locator: Option<ResolvedLocator>) -> VaultResult<()> {
        let Some(locator) = locator else {
            return Ok(());
        };
        let identity = self.ensure_identity()?;
        let store = self.deps.connector.connect(&locator, identity)?;
        store.terminate_scope().await?;
        tracing::info!(session_id = %self.session_id, vault = %locator, "Vault scope terminated");
        Ok(())
    }

    /// Drop the bound vault and session key.
    pub fn close(&mut self) {
        self.vault = None;
        self.identity = None;
        self.set_state(VaultState::Closed);
        tracing::debug!(session_id = %self.session_id, "Session closed");
    }

    /// The bound vault; only available while `Ready`.
    pub fn vault(&self) -> VaultResult<&VaultIndex> {
        let state = self.state();
        match &self.vault {
            Some(vault) if state == VaultState::Ready => Ok(vault),
            _ => Err(VaultError::NotInitialized),
        }
    }

    pub fn vault_mut(&mut self) -> VaultResult<&mut VaultIndex> {
        let state = self.state();
        match &mut self.vault {
            Some(vault) if state == VaultState::Ready => Ok(vault),
            _ => Err(VaultError::NotInitialized),
        }
    }

    pub fn files(&self) -> VaultResult<Arc<[FileRecord]>> {
        Ok(self.vault()?.files())
    }

    pub async fn write_file(
        &mut self,
        display_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> VaultResult<FileRecord> {
        self.vault_mut()?
            .write_file(display_name, mime_type, bytes)
            .await
    }

    pub async fn read_file(&self, record: &FileRecord) -> VaultResult<Vec<u8>> {
        self.vault()?.read_file(record).await
    }

    pub async fn delete_file(&mut self, record: &FileRecord) -> VaultResult<()> {
        self.vault_mut()?.delete_file(record).await
    }

    pub async fn rename_file(&mut self, record: &FileRecord, new_name: &str) -> VaultResult<FileRecord> {
        self.vault_mut()?.rename_file(record, new_name).await
    }

    fn resting_state(&self) -> VaultState {
        if self.is_new() {
            VaultState::New
        } else {
            VaultState::Closed
        }
    }

    fn set_state(&self, state: VaultState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(session_id = %self.session_id, from = %previous, to = %state, "Session state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalKeyProvider;
    use crate::object_store::MemoryConnector;
    use crate::storage::{MemorySessionStore, RedbSessionStore};
    use crate::testing::{FlakyConnector, FlakyStore, ScriptedChain, StoreOp};

    const SESSION: &str = "bubble-vault-test";

    struct Harness {
        chain: Arc<ScriptedChain>,
        store: Arc<FlakyStore>,
        sessions: Arc<MemorySessionStore>,
        deps: SessionDeps,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_providers(ProviderTable::builtin())
        }

        fn with_providers(providers: ProviderTable) -> Self {
            let chain = ScriptedChain::new();
            let store = FlakyStore::new();
            let sessions = Arc::new(MemorySessionStore::new());
            let deps = SessionDeps {
                identities: Arc::new(LocalKeyProvider),
                chain: chain.clone(),
                connector: FlakyConnector::new(store.clone()),
                sessions: sessions.clone(),
                providers,
            };
            Self {
                chain,
                store,
                sessions,
                deps,
            }
        }

        fn open(&self) -> SessionCoordinator {
            SessionCoordinator::open(SESSION, self.deps.clone()).unwrap()
        }

        fn record(&self) -> PersistedSessionRecord {
            self.sessions.load(SESSION).unwrap().unwrap()
        }
    }

    #[test]
    fn session_id_uses_lowercase_account_without_prefix() {
        let account: Address = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01".parse().unwrap();
        assert_eq!(
            session_id("bubble-vault", account),
            "bubble-vault-abcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[tokio::test]
    async fn fresh_session_becomes_ready() {
        let h = Harness::new();
        let mut session = h.open();
        assert_eq!(session.state(), VaultState::New);
        assert!(session.is_new());

        assert_eq!(session.initialize().await.unwrap(), VaultState::Ready);
        assert!(!session.is_new());
        assert!(session.files().unwrap().is_empty());

        let locator = h.record().locator.unwrap();
        assert!(locator.record_address.is_some());
        assert_eq!(
            locator.provider_endpoint.unwrap().as_str(),
            "https://vault.bubbleprotocol.com/v2/base-goerli"
        );

        // key, deployment, completed locator
        assert_eq!(h.sessions.writes(), 3);
        let owner = session.identity_address().unwrap();
        assert_eq!(h.chain.deployments()[0].0, owner);
        assert!(h.store.inner().is_active());
    }

    #[tokio::test]
    async fn repeated_initialize_is_stable() {
        let h = Harness::new();
        let mut session = h.open();
        session.initialize().await.unwrap();
        let bytes = h.sessions.raw(SESSION).unwrap();
        let writes = h.sessions.writes();

        assert_eq!(session.initialize().await.unwrap(), VaultState::Ready);
        assert_eq!(session.initialize().await.unwrap(), VaultState::Ready);
        assert_eq!(h.sessions.raw(SESSION).unwrap(), bytes);
        assert_eq!(h.sessions.writes(), writes);
        assert_eq!(h.chain.deployments().len(), 1);
    }

    #[tokio::test]
    async fn resumed_session_skips_creation() {
        let h = Harness::new();
        let mut first = h.open();
        first.initialize().await.unwrap();
        first.write_file("a.txt", "text/plain", b"a").await.unwrap();
        let bytes = h.sessions.raw(SESSION).unwrap();
        let creates = h.store.calls(StoreOp::Create);
        drop(first);

        let mut resumed = h.open();
        assert_eq!(resumed.state(), VaultState::Closed);
        assert_eq!(resumed.initialize().await.unwrap(), VaultState::Ready);

        assert_eq!(h.store.calls(StoreOp::Create), creates);
        assert_eq!(h.chain.deployments().len(), 1);
        assert_eq!(h.sessions.raw(SESSION).unwrap(), bytes);
        assert_eq!(resumed.files().unwrap()[0].display_name, "a.txt");
    }

    #[tokio::test]
    async fn deploy_failure_stays_new_and_keeps_key() {
        let h = Harness::new();
        h.chain.fail_deploy(true);
        let mut session = h.open();

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, VaultError::ChainOperation(_)));
        assert_eq!(session.state(), VaultState::New);

        let key = h.record().identity_key;
        assert!(h.record().locator.is_none());

        h.chain.fail_deploy(false);
        assert_eq!(session.initialize().await.unwrap(), VaultState::Ready);
        assert_eq!(h.record().identity_key, key);
    }

    #[tokio::test]
    async fn key_survives_restart_after_deploy_failure() {
        let h = Harness::new();
        h.chain.fail_deploy(true);
        let mut session = h.open();
        session.initialize().await.unwrap_err();
        let owner = session.identity_address().unwrap();
        drop(session);

        h.chain.fail_deploy(false);
        let mut session = h.open();
        assert_eq!(session.state(), VaultState::New);
        session.initialize().await.unwrap();
        assert_eq!(h.chain.deployments()[0].0, owner);
    }

    #[tokio::test]
    async fn scope_failure_is_failed_then_recovers() {
        let h = Harness::new();
        h.store.fail(StoreOp::Create);
        let mut session = h.open();

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, VaultError::StorageOperation(_)));
        assert_eq!(session.state(), VaultState::Failed);
        assert!(!session.is_new());

        let locator = h.record().locator.unwrap();
        assert!(locator.record_address.is_some());
        assert!(locator.provider_endpoint.is_none());

        h.store.heal();
        assert_eq!(session.initialize().await.unwrap(), VaultState::Ready);
        assert_eq!(h.chain.deployments().len(), 1);
        assert!(h.record().locator.unwrap().provider_endpoint.is_some());
    }

    #[tokio::test]
    async fn load_failure_on_resume_is_failed() {
        let h = Harness::new();
        h.open().initialize().await.unwrap();

        h.store.fail(StoreOp::List);
        let mut session = h.open();
        assert!(session.initialize().await.is_err());
        assert_eq!(session.state(), VaultState::Failed);
        assert!(matches!(session.files(), Err(VaultError::NotInitialized)));
    }

    #[tokio::test]
    async fn unknown_chain_is_reported() {
        let h = Harness::with_providers(ProviderTable::new());
        let mut session = h.open();

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedChain(84531)));
        assert_eq!(session.state(), VaultState::Failed);
    }

    #[tokio::test]
    async fn vault_operations_require_ready() {
        let h = Harness::new();
        let mut session = h.open();

        let err = session.write_file("a.txt", "text/plain", b"a").await.unwrap_err();
        assert!(matches!(err, VaultError::NotInitialized));
        assert!(matches!(session.vault(), Err(VaultError::NotInitialized)));
        assert!(matches!(
            session.terminate_vault().await,
            Err(VaultError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn terminate_revokes_then_restarts_creation() {
        let h = Harness::new();
        let mut session = h.open();
        session.initialize().await.unwrap();
        session.write_file("a.txt", "text/plain", b"a").await.unwrap();
        let key = h.record().identity_key;
        let first_record = session.locator().unwrap().record_address.unwrap();

        session.terminate_vault().await.unwrap();
        assert_eq!(session.state(), VaultState::New);
        assert!(session.is_new());
        assert_eq!(h.chain.revoked(), vec![first_record]);
        assert!(!h.store.inner().is_active());
        assert!(matches!(session.files(), Err(VaultError::NotInitialized)));

        let record = h.record();
        assert_eq!(record.identity_key, key);
        assert!(record.locator.is_none());

        session.initialize().await.unwrap();
        let second_record = session.locator().unwrap().record_address.unwrap();
        assert_ne!(first_record, second_record);
        assert!(session.files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_revoke_keeps_locator() {
        let h = Harness::new();
        let mut session = h.open();
        session.initialize().await.unwrap();
        h.chain.fail_revoke(true);

        let err = session.terminate_vault().await.unwrap_err();
        assert!(matches!(err, VaultError::ChainOperation(_)));
        assert!(h.record().locator.unwrap().record_address.is_some());
        assert_eq!(session.state(), VaultState::Ready);
        assert!(h.store.inner().is_active());
    }

    #[tokio::test]
    async fn terminate_from_failed_state_still_clears_scope() {
        let h = Harness::new();
        h.open().initialize().await.unwrap();

        h.store.fail(StoreOp::List);
        let mut session = h.open();
        session.initialize().await.unwrap_err();
        h.store.heal();

        session.terminate_vault().await.unwrap();
        assert!(!h.store.inner().is_active());
        assert_eq!(session.state(), VaultState::New);
    }

    #[tokio::test]
    async fn close_returns_to_closed() {
        let h = Harness::new();
        let mut session = h.open();
        let mut states = session.subscribe();
        session.initialize().await.unwrap();
        assert_eq!(*states.borrow_and_update(), VaultState::Ready);

        session.close();
        assert_eq!(session.state(), VaultState::Closed);
        assert!(states.has_changed().unwrap());
        assert!(matches!(session.vault(), Err(VaultError::NotInitialized)));

        assert_eq!(session.initialize().await.unwrap(), VaultState::Ready);
        assert_eq!(h.chain.deployments().len(), 1);
    }

    #[tokio::test]
    async fn redb_backed_session_resumes_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.redb");
        let connector = Arc::new(MemoryConnector::new());
        let chain = ScriptedChain::new();

        let deps = |sessions: Arc<RedbSessionStore>| SessionDeps {
            identities: Arc::new(LocalKeyProvider),
            chain: chain.clone(),
            connector: connector.clone(),
            sessions,
            providers: ProviderTable::builtin(),
        };

        {
            let sessions = Arc::new(RedbSessionStore::open(&path).unwrap());
            let mut session = SessionCoordinator::open(SESSION, deps(sessions)).unwrap();
            session.initialize().await.unwrap();
            session.write_file("report.pdf", "application/pdf", b"%PDF").await.unwrap();
        }

        let sessions = Arc::new(RedbSessionStore::open(&path).unwrap());
        let before = sessions.raw(SESSION).unwrap();
        let mut session = SessionCoordinator::open(SESSION, deps(sessions.clone())).unwrap();
        session.initialize().await.unwrap();

        let files = session.files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(session.read_file(&files[0]).await.unwrap(), b"%PDF");
        assert_eq!(sessions.raw(SESSION).unwrap(), before);
        assert_eq!(chain.deployments().len(), 1);
    }
}
