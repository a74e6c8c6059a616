//! In-process implementation of every SDK capability.
//!
//! Pools run against a ledger held in memory and seeded from the genesis
//! file; wallets go through the storage registry; anoncreds use the
//! signature-based engine in [`anoncreds`].

mod anoncreds;
mod blob;
mod crypto;
mod did;
mod ledger;
mod pool;
mod verifier;
mod wallet;

use dashmap::DashMap;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::blob_storage::TailsStorageConfig;
use crate::error::{SdkError, SdkResult};
use crate::handles::{
    BlobReaderHandle, BlobWriterHandle, HandleAllocator, PoolHandle, SearchHandle, WalletHandle,
};
use crate::proof::RequestedCredential;
use crate::storage::StorageRegistry;
use crate::wallet::Wallet;

use self::ledger::LocalLedger;

pub const DEFAULT_PROTOCOL_VERSION: u32 = 2;

/// Resource lifecycle transitions, recorded in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    PoolConfigCreated,
    PoolOpened,
    PoolClosed,
    PoolConfigDeleted,
    WalletCreated,
    WalletOpened,
    WalletClosed,
    WalletDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub event: LifecycleEvent,
    /// Pool config name or wallet id.
    pub name: String,
}

#[derive(Debug, Clone)]
struct OpenPool {
    name: String,
    protocol_version: u32,
}

#[derive(Debug)]
struct CredentialSearch {
    wallet: WalletHandle,
    candidates: BTreeMap<String, VecDeque<RequestedCredential>>,
}

/// Backend that keeps the ledger, wallets and tails handles in process.
pub struct LocalBackend {
    protocol_version: AtomicU32,
    handles: HandleAllocator,
    pool_configs: DashMap<String, PathBuf>,
    ledgers: DashMap<String, Arc<Mutex<LocalLedger>>>,
    pools: DashMap<PoolHandle, OpenPool>,
    storage: StorageRegistry,
    wallets: DashMap<WalletHandle, Arc<Wallet>>,
    searches: DashMap<SearchHandle, CredentialSearch>,
    blob_writers: DashMap<BlobWriterHandle, TailsStorageConfig>,
    blob_readers: DashMap<BlobReaderHandle, TailsStorageConfig>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::with_storage(StorageRegistry::new())
    }

    /// Backend whose wallets resolve drivers through `storage`.
    pub fn with_storage(storage: StorageRegistry) -> Self {
        Self {
            protocol_version: AtomicU32::new(DEFAULT_PROTOCOL_VERSION),
            handles: HandleAllocator::new(),
            pool_configs: DashMap::new(),
            ledgers: DashMap::new(),
            pools: DashMap::new(),
            storage,
            wallets: DashMap::new(),
            searches: DashMap::new(),
            blob_writers: DashMap::new(),
            blob_readers: DashMap::new(),
            journal: Mutex::new(Vec::new()),
        }
    }

    pub fn storage(&self) -> &StorageRegistry {
        &self.storage
    }

    /// Lifecycle events so far, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal
            .lock()
            .map(|j| j.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: LifecycleEvent, name: &str) {
        tracing::debug!(?event, name, "lifecycle");
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(JournalEntry {
                event,
                name: name.to_string(),
            });
        }
    }

    fn current_protocol_version(&self) -> u32 {
        self.protocol_version.load(Ordering::SeqCst)
    }

    fn wallet(&self, handle: WalletHandle) -> SdkResult<Arc<Wallet>> {
        self.wallets
            .get(&handle)
            .map(|w| Arc::clone(w.value()))
            .ok_or_else(|| SdkError::invalid_handle(handle))
    }

    fn tails_reader(&self, handle: BlobReaderHandle) -> SdkResult<TailsStorageConfig> {
        self.blob_readers
            .get(&handle)
            .map(|c| c.value().clone())
            .ok_or_else(|| SdkError::invalid_handle(handle))
    }

    fn tails_writer(&self, handle: BlobWriterHandle) -> SdkResult<TailsStorageConfig> {
        self.blob_writers
            .get(&handle)
            .map(|c| c.value().clone())
            .ok_or_else(|| SdkError::invalid_handle(handle))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("protocol_version", &self.current_protocol_version())
            .field("pools", &self.pools.len())
            .field("wallets", &self.wallets.len())
            .finish_non_exhaustive()
    }
}
