use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use verinym_core::Did;
use verinym_crypto::sign;

use crate::api::{LedgerApi, PoolApi};
use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::genesis::read_genesis;
use crate::handles::{PoolHandle, WalletHandle};
use crate::ledger::{LedgerReply, LedgerRequest};
use crate::wallet::Wallet;

use super::did::signing_key_for_did;
use super::ledger::LocalLedger;
use super::{LifecycleEvent, LocalBackend, OpenPool};

/// Wallet key a write is signed with.
struct WalletSigner<'a> {
    wallet: &'a Wallet,
    submitter: &'a Did,
}

impl LocalBackend {
    fn open_pool(&self, pool: PoolHandle) -> SdkResult<(OpenPool, Arc<Mutex<LocalLedger>>)> {
        let open = self
            .pools
            .get(&pool)
            .map(|p| p.value().clone())
            .ok_or_else(|| SdkError::invalid_handle(pool))?;
        let ledger = self
            .ledgers
            .get(&open.name)
            .map(|l| Arc::clone(l.value()))
            .ok_or_else(|| {
                SdkError::invalid_state(format!("ledger of pool {} is gone", open.name))
            })?;
        Ok((open, ledger))
    }

    fn submit_to_pool(
        &self,
        pool: PoolHandle,
        mut request: LedgerRequest,
        signer: Option<WalletSigner<'_>>,
    ) -> SdkResult<LedgerReply> {
        let (open, ledger) = self.open_pool(pool)?;
        request.protocol_version = self.current_protocol_version();
        if let Some(signer) = signer {
            let key = signing_key_for_did(signer.wallet, signer.submitter)?;
            request.signature = Some(sign(&request.signing_payload()?, &key).to_bs58());
        }
        let now = chrono::Utc::now().timestamp();
        let mut ledger = ledger
            .lock()
            .map_err(|_| SdkError::invalid_state("ledger lock poisoned"))?;
        ledger.submit(&request, open.protocol_version, now)
    }
}

#[async_trait]
impl PoolApi for LocalBackend {
    async fn set_protocol_version(&self, version: u32) -> SdkResult<()> {
        if !matches!(version, 1 | 2) {
            return Err(SdkError::new(
                ErrorCode::PoolIncompatibleProtocolVersion,
                format!("unsupported protocol version {}", version),
            ));
        }
        self.protocol_version.store(version, Ordering::SeqCst);
        tracing::debug!(version, "protocol version set");
        Ok(())
    }

    async fn create_pool_ledger_config(&self, name: &str, genesis_path: &Path) -> SdkResult<()> {
        if name.is_empty() {
            return Err(SdkError::invalid_structure("pool name is empty"));
        }
        if self.pool_configs.contains_key(name) {
            return Err(SdkError::new(
                ErrorCode::PoolLedgerConfigAlreadyExists,
                format!("pool config {} already exists", name),
            ));
        }
        if !tokio::fs::try_exists(genesis_path).await.unwrap_or(false) {
            return Err(SdkError::io(format!(
                "genesis file {} does not exist",
                genesis_path.display()
            )));
        }
        self.pool_configs
            .insert(name.to_string(), genesis_path.to_path_buf());
        self.record(LifecycleEvent::PoolConfigCreated, name);
        Ok(())
    }

    async fn open_pool_ledger(&self, name: &str) -> SdkResult<PoolHandle> {
        let genesis_path = self
            .pool_configs
            .get(name)
            .map(|p| p.value().clone())
            .ok_or_else(|| {
                SdkError::new(
                    ErrorCode::PoolLedgerNotCreated,
                    format!("no pool config named {}", name),
                )
            })?;
        if !self.ledgers.contains_key(name) {
            let txns = read_genesis(&genesis_path).await?;
            tracing::info!(pool = name, nodes = txns.len(), "ledger seeded from genesis");
            self.ledgers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(LocalLedger::from_genesis(&txns))));
        }
        let handle = PoolHandle(self.handles.next());
        self.pools.insert(
            handle,
            OpenPool {
                name: name.to_string(),
                protocol_version: self.current_protocol_version(),
            },
        );
        self.record(LifecycleEvent::PoolOpened, name);
        Ok(handle)
    }

    async fn close_pool_ledger(&self, pool: PoolHandle) -> SdkResult<()> {
        let (_, open) = self
            .pools
            .remove(&pool)
            .ok_or_else(|| SdkError::invalid_handle(pool))?;
        self.record(LifecycleEvent::PoolClosed, &open.name);
        Ok(())
    }

    async fn delete_pool_ledger_config(&self, name: &str) -> SdkResult<()> {
        if self.pools.iter().any(|p| p.value().name == name) {
            return Err(SdkError::invalid_state(format!(
                "pool {} is still open",
                name
            )));
        }
        self.pool_configs.remove(name).ok_or_else(|| {
            SdkError::new(
                ErrorCode::PoolLedgerNotCreated,
                format!("no pool config named {}", name),
            )
        })?;
        self.ledgers.remove(name);
        self.record(LifecycleEvent::PoolConfigDeleted, name);
        Ok(())
    }
}

#[async_trait]
impl LedgerApi for LocalBackend {
    async fn sign_and_submit_request(
        &self,
        pool: PoolHandle,
        wallet: WalletHandle,
        submitter: &Did,
        request: LedgerRequest,
    ) -> SdkResult<LedgerReply> {
        if request.identifier != *submitter {
            return Err(SdkError::invalid_structure(format!(
                "request built for {} but submitted by {}",
                request.identifier, submitter
            )));
        }
        let wallet = self.wallet(wallet)?;
        self.submit_to_pool(
            pool,
            request,
            Some(WalletSigner {
                wallet: &wallet,
                submitter,
            }),
        )
    }

    async fn submit_request(
        &self,
        pool: PoolHandle,
        request: LedgerRequest,
    ) -> SdkResult<LedgerReply> {
        self.submit_to_pool(pool, request, None)
    }
}
