//! Wallet storage drivers.
//!
//! A driver owns wallet lifecycles for one `storage_type`; an opened wallet
//! is a [`WalletStorage`] holding opaque, already-sealed record values.
//! Drivers are looked up by name in a [`StorageRegistry`].

use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::rocksdb_storage::RocksDbStorageDriver;

pub const DEFAULT_STORAGE_TYPE: &str = "default";

pub const CATEGORY_DID: &str = "did";
pub const CATEGORY_KEY: &str = "key";
pub const CATEGORY_THEIR_DID: &str = "their_did";
pub const CATEGORY_MASTER_SECRET: &str = "master_secret";
pub const CATEGORY_CRED_DEF: &str = "cred_def";
pub const CATEGORY_REV_REG: &str = "rev_reg";
pub const CATEGORY_CREDENTIAL: &str = "credential";

/// Every record category a wallet holds.
pub const CATEGORIES: &[&str] = &[
    CATEGORY_DID,
    CATEGORY_KEY,
    CATEGORY_THEIR_DID,
    CATEGORY_MASTER_SECRET,
    CATEGORY_CRED_DEF,
    CATEGORY_REV_REG,
    CATEGORY_CREDENTIAL,
];

/// Creates, opens and deletes wallets of one storage type.
pub trait WalletStorageDriver: Send + Sync {
    fn storage_type(&self) -> &str;

    /// Create an empty wallet carrying `metadata`.
    fn create(
        &self,
        id: &str,
        config: Option<&Value>,
        credentials: Option<&Value>,
        metadata: &[u8],
    ) -> SdkResult<()>;

    fn open(
        &self,
        id: &str,
        config: Option<&Value>,
        credentials: Option<&Value>,
    ) -> SdkResult<Box<dyn WalletStorage>>;

    fn delete(&self, id: &str, config: Option<&Value>, credentials: Option<&Value>)
        -> SdkResult<()>;
}

/// Record store of one open wallet. `list` returns records in id order.
pub trait WalletStorage: Send + Sync {
    fn metadata(&self) -> SdkResult<Vec<u8>>;
    fn add(&self, category: &str, id: &str, value: &[u8]) -> SdkResult<()>;
    fn get(&self, category: &str, id: &str) -> SdkResult<Vec<u8>>;
    fn update(&self, category: &str, id: &str, value: &[u8]) -> SdkResult<()>;
    fn delete(&self, category: &str, id: &str) -> SdkResult<()>;
    fn list(&self, category: &str) -> SdkResult<Vec<(String, Vec<u8>)>>;
}

pub(crate) fn item_not_found(category: &str, id: &str) -> SdkError {
    SdkError::new(
        ErrorCode::WalletItemNotFound,
        format!("no {} record {}", category, id),
    )
}

pub(crate) fn item_exists(category: &str, id: &str) -> SdkError {
    SdkError::new(
        ErrorCode::WalletItemAlreadyExists,
        format!("{} record {} already exists", category, id),
    )
}

#[derive(Debug, Default)]
struct InMemoryWallet {
    metadata: Vec<u8>,
    records: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

/// Process-local driver registered as `default`.
#[derive(Default)]
pub struct InMemoryStorageDriver {
    wallets: DashMap<String, Arc<InMemoryWallet>>,
}

impl InMemoryStorageDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletStorageDriver for InMemoryStorageDriver {
    fn storage_type(&self) -> &str {
        DEFAULT_STORAGE_TYPE
    }

    fn create(
        &self,
        id: &str,
        _config: Option<&Value>,
        _credentials: Option<&Value>,
        metadata: &[u8],
    ) -> SdkResult<()> {
        match self.wallets.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SdkError::new(
                ErrorCode::WalletAlreadyExists,
                format!("wallet {} already exists", id),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(InMemoryWallet {
                    metadata: metadata.to_vec(),
                    records: Mutex::new(BTreeMap::new()),
                }));
                Ok(())
            }
        }
    }

    fn open(
        &self,
        id: &str,
        _config: Option<&Value>,
        _credentials: Option<&Value>,
    ) -> SdkResult<Box<dyn WalletStorage>> {
        let wallet = self
            .wallets
            .get(id)
            .map(|w| Arc::clone(w.value()))
            .ok_or_else(|| {
                SdkError::new(ErrorCode::WalletNotFound, format!("wallet {} not found", id))
            })?;
        Ok(Box::new(InMemoryStore { wallet }))
    }

    fn delete(
        &self,
        id: &str,
        _config: Option<&Value>,
        _credentials: Option<&Value>,
    ) -> SdkResult<()> {
        self.wallets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SdkError::new(ErrorCode::WalletNotFound, format!("wallet {} not found", id)))
    }
}

struct InMemoryStore {
    wallet: Arc<InMemoryWallet>,
}

impl InMemoryStore {
    fn records(
        &self,
    ) -> SdkResult<std::sync::MutexGuard<'_, BTreeMap<(String, String), Vec<u8>>>> {
        self.wallet
            .records
            .lock()
            .map_err(|_| SdkError::invalid_state("wallet record lock poisoned"))
    }
}

impl WalletStorage for InMemoryStore {
    fn metadata(&self) -> SdkResult<Vec<u8>> {
        Ok(self.wallet.metadata.clone())
    }

    fn add(&self, category: &str, id: &str, value: &[u8]) -> SdkResult<()> {
        let mut records = self.records()?;
        let key = (category.to_string(), id.to_string());
        if records.contains_key(&key) {
            return Err(item_exists(category, id));
        }
        records.insert(key, value.to_vec());
        Ok(())
    }

    fn get(&self, category: &str, id: &str) -> SdkResult<Vec<u8>> {
        self.records()?
            .get(&(category.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| item_not_found(category, id))
    }

    fn update(&self, category: &str, id: &str, value: &[u8]) -> SdkResult<()> {
        let mut records = self.records()?;
        match records.get_mut(&(category.to_string(), id.to_string())) {
            Some(slot) => {
                *slot = value.to_vec();
                Ok(())
            }
            None => Err(item_not_found(category, id)),
        }
    }

    fn delete(&self, category: &str, id: &str) -> SdkResult<()> {
        self.records()?
            .remove(&(category.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| item_not_found(category, id))
    }

    fn list(&self, category: &str) -> SdkResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .records()?
            .iter()
            .filter(|((cat, _), _)| cat == category)
            .map(|((_, id), value)| (id.clone(), value.clone()))
            .collect())
    }
}

/// Named storage drivers. `default` and `rocksdb` are always present.
pub struct StorageRegistry {
    drivers: DashMap<String, Arc<dyn WalletStorageDriver>>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        let registry = Self {
            drivers: DashMap::new(),
        };
        registry.register(Arc::new(InMemoryStorageDriver::new()));
        registry.register(Arc::new(RocksDbStorageDriver::new()));
        registry
    }

    /// Add or replace the driver for its storage type.
    pub fn register(&self, driver: Arc<dyn WalletStorageDriver>) {
        tracing::debug!(storage_type = driver.storage_type(), "wallet storage driver registered");
        self.drivers.insert(driver.storage_type().to_string(), driver);
    }

    /// Driver for `storage_type`, or the default driver when `None`.
    pub fn get(&self, storage_type: Option<&str>) -> SdkResult<Arc<dyn WalletStorageDriver>> {
        let name = storage_type.unwrap_or(DEFAULT_STORAGE_TYPE);
        self.drivers
            .get(name)
            .map(|d| Arc::clone(d.value()))
            .ok_or_else(|| {
                SdkError::new(
                    ErrorCode::WalletStorageTypeUnknown,
                    format!("no wallet storage driver named {}", name),
                )
            })
    }

    /// Native plug-in drivers cannot be loaded; only built-in types resolve.
    pub fn register_plugin(
        &self,
        storage_type: &str,
        library: &PathBuf,
        entrypoint: &str,
    ) -> SdkResult<()> {
        if self.drivers.contains_key(storage_type) {
            tracing::warn!(
                storage_type,
                library = %library.display(),
                entrypoint,
                "plug-in library ignored, built-in driver of that name is used"
            );
            return Ok(());
        }
        let mut known: Vec<String> = self.drivers.iter().map(|d| d.key().clone()).collect();
        known.sort();
        Err(SdkError::new(
            ErrorCode::WalletStorageTypeUnknown,
            format!(
                "cannot load storage plug-in {} from {} (entrypoint {}); built-in types: {}",
                storage_type,
                library.display(),
                entrypoint,
                known.join(", ")
            ),
        ))
    }

    pub fn storage_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.iter().map(|d| d.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
