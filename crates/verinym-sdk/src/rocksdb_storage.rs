//! RocksDB wallet driver: one database directory per wallet under
//! `storage_config.path`, one column family per record category.

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::storage::{item_exists, item_not_found, WalletStorage, WalletStorageDriver, CATEGORIES};

pub const ROCKSDB_STORAGE_TYPE: &str = "rocksdb";

const CF_METADATA: &str = "metadata";
const METADATA_KEY: &[u8] = b"wallet";

fn db_error(err: rocksdb::Error) -> SdkError {
    SdkError::io(format!("rocksdb: {}", err))
}

#[derive(Debug, Default)]
pub struct RocksDbStorageDriver;

impl RocksDbStorageDriver {
    pub fn new() -> Self {
        Self
    }

    fn wallet_path(id: &str, config: Option<&Value>) -> SdkResult<PathBuf> {
        let base = config
            .and_then(|c| c.get("path"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SdkError::invalid_structure("rocksdb storage_config requires a \"path\"")
            })?;
        if id.is_empty() || id.contains(['/', '\\']) || id == ".." {
            return Err(SdkError::invalid_structure(format!("invalid wallet id {:?}", id)));
        }
        Ok(Path::new(base).join(id))
    }

    fn open_db(path: &Path, create: bool) -> SdkResult<DB> {
        let mut opts = Options::default();
        opts.create_if_missing(create);
        opts.create_missing_column_families(true);

        let cf_descriptors = std::iter::once(CF_METADATA)
            .chain(CATEGORIES.iter().copied())
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        DB::open_cf_descriptors(&opts, path, cf_descriptors).map_err(db_error)
    }
}

impl WalletStorageDriver for RocksDbStorageDriver {
    fn storage_type(&self) -> &str {
        ROCKSDB_STORAGE_TYPE
    }

    fn create(
        &self,
        id: &str,
        config: Option<&Value>,
        _credentials: Option<&Value>,
        metadata: &[u8],
    ) -> SdkResult<()> {
        let path = Self::wallet_path(id, config)?;
        if path.exists() {
            return Err(SdkError::new(
                ErrorCode::WalletAlreadyExists,
                format!("wallet {} already exists at {}", id, path.display()),
            ));
        }
        std::fs::create_dir_all(&path)?;
        let db = Self::open_db(&path, true)?;
        let cf = db
            .cf_handle(CF_METADATA)
            .ok_or_else(|| SdkError::invalid_state("metadata column family missing"))?;
        db.put_cf(&cf, METADATA_KEY, metadata).map_err(db_error)?;
        tracing::debug!(wallet = id, path = %path.display(), "rocksdb wallet created");
        Ok(())
    }

    fn open(
        &self,
        id: &str,
        config: Option<&Value>,
        _credentials: Option<&Value>,
    ) -> SdkResult<Box<dyn WalletStorage>> {
        let path = Self::wallet_path(id, config)?;
        if !path.exists() {
            return Err(SdkError::new(
                ErrorCode::WalletNotFound,
                format!("wallet {} not found at {}", id, path.display()),
            ));
        }
        let db = Self::open_db(&path, false)?;
        Ok(Box::new(RocksDbStore { db }))
    }

    fn delete(
        &self,
        id: &str,
        config: Option<&Value>,
        _credentials: Option<&Value>,
    ) -> SdkResult<()> {
        let path = Self::wallet_path(id, config)?;
        if !path.exists() {
            return Err(SdkError::new(
                ErrorCode::WalletNotFound,
                format!("wallet {} not found at {}", id, path.display()),
            ));
        }
        std::fs::remove_dir_all(&path)?;
        Ok(())
    }
}

struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    fn cf(&self, category: &str) -> SdkResult<&rocksdb::ColumnFamily> {
        self.db.cf_handle(category).ok_or_else(|| {
            SdkError::invalid_structure(format!("unknown record category {}", category))
        })
    }
}

impl WalletStorage for RocksDbStore {
    fn metadata(&self) -> SdkResult<Vec<u8>> {
        let cf = self.cf(CF_METADATA)?;
        self.db
            .get_cf(&cf, METADATA_KEY)
            .map_err(db_error)?
            .ok_or_else(|| SdkError::invalid_state("wallet metadata missing"))
    }

    fn add(&self, category: &str, id: &str, value: &[u8]) -> SdkResult<()> {
        let cf = self.cf(category)?;
        if self.db.get_cf(&cf, id.as_bytes()).map_err(db_error)?.is_some() {
            return Err(item_exists(category, id));
        }
        self.db.put_cf(&cf, id.as_bytes(), value).map_err(db_error)
    }

    fn get(&self, category: &str, id: &str) -> SdkResult<Vec<u8>> {
        let cf = self.cf(category)?;
        self.db
            .get_cf(&cf, id.as_bytes())
            .map_err(db_error)?
            .ok_or_else(|| item_not_found(category, id))
    }

    fn update(&self, category: &str, id: &str, value: &[u8]) -> SdkResult<()> {
        let cf = self.cf(category)?;
        if self.db.get_cf(&cf, id.as_bytes()).map_err(db_error)?.is_none() {
            return Err(item_not_found(category, id));
        }
        self.db.put_cf(&cf, id.as_bytes(), value).map_err(db_error)
    }

    fn delete(&self, category: &str, id: &str) -> SdkResult<()> {
        let cf = self.cf(category)?;
        if self.db.get_cf(&cf, id.as_bytes()).map_err(db_error)?.is_none() {
            return Err(item_not_found(category, id));
        }
        self.db.delete_cf(&cf, id.as_bytes()).map_err(db_error)
    }

    fn list(&self, category: &str) -> SdkResult<Vec<(String, Vec<u8>)>> {
        let cf = self.cf(category)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(db_error)?;
            let id = String::from_utf8(key.to_vec())
                .map_err(|_| SdkError::invalid_state("non-utf8 record id"))?;
            out.push((id, value.to_vec()));
        }
        Ok(out)
    }
}
