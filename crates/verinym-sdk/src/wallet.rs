//! Passphrase-protected wallets over a storage driver.
//!
//! Record values are JSON sealed with ChaCha20-Poly1305 under a key derived
//! from the wallet passphrase; the category and record id are bound in as
//! associated data.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use zeroize::Zeroizing;

use verinym_crypto::{derive_key, hash_passphrase, verify_passphrase};

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::storage::{WalletStorage, WalletStorageDriver};

const NONCE_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// Where a wallet lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_config: Option<Value>,
}

impl WalletConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            storage_type: None,
            storage_config: None,
        }
    }

    pub fn with_storage(mut self, storage_type: Option<String>, storage_config: Option<Value>) -> Self {
        self.storage_type = storage_type;
        self.storage_config = storage_config;
        self
    }
}

/// What unlocks a wallet.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletCredentials {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_credentials: Option<Value>,
}

impl WalletCredentials {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            storage_credentials: None,
        }
    }

    pub fn with_storage_credentials(mut self, storage_credentials: Option<Value>) -> Self {
        self.storage_credentials = storage_credentials;
        self
    }
}

impl fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("key", &"<redacted>")
            .field("storage_credentials", &self.storage_credentials.is_some())
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct WalletMetadata {
    salt: String,
    verifier: String,
}

/// An open wallet.
pub struct Wallet {
    id: String,
    storage: Box<dyn WalletStorage>,
    key: Zeroizing<[u8; 32]>,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Wallet {
    pub fn create(
        driver: &dyn WalletStorageDriver,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<()> {
        if config.id.is_empty() {
            return Err(SdkError::invalid_structure("wallet id is empty"));
        }
        if credentials.key.is_empty() {
            return Err(SdkError::invalid_structure("wallet key is empty"));
        }
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let metadata = WalletMetadata {
            salt: hex::encode(salt),
            verifier: hash_passphrase(credentials.key.as_bytes())?,
        };
        driver.create(
            &config.id,
            config.storage_config.as_ref(),
            credentials.storage_credentials.as_ref(),
            &serde_json::to_vec(&metadata)?,
        )
    }

    pub fn open(
        driver: &dyn WalletStorageDriver,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<Self> {
        let storage = driver.open(
            &config.id,
            config.storage_config.as_ref(),
            credentials.storage_credentials.as_ref(),
        )?;
        let metadata: WalletMetadata = serde_json::from_slice(&storage.metadata()?)
            .map_err(|e| SdkError::invalid_state(format!("corrupt wallet metadata: {}", e)))?;
        if !verify_passphrase(credentials.key.as_bytes(), &metadata.verifier)? {
            return Err(SdkError::new(
                ErrorCode::WalletAccessFailed,
                format!("invalid key for wallet {}", config.id),
            ));
        }
        let salt = hex::decode(&metadata.salt)
            .map_err(|e| SdkError::invalid_state(format!("corrupt wallet salt: {}", e)))?;
        let key = Zeroizing::new(derive_key(credentials.key.as_bytes(), &salt)?);
        Ok(Self {
            id: config.id.clone(),
            storage,
            key,
        })
    }

    /// Delete a wallet after checking its key.
    pub fn delete(
        driver: &dyn WalletStorageDriver,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<()> {
        drop(Self::open(driver, config, credentials)?);
        driver.delete(
            &config.id,
            config.storage_config.as_ref(),
            credentials.storage_credentials.as_ref(),
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn cipher(&self) -> SdkResult<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.key[..])
            .map_err(|e| SdkError::invalid_state(format!("cipher init failed: {}", e)))
    }

    fn seal(&self, category: &str, id: &str, plaintext: &[u8]) -> SdkResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let aad = format!("{}/{}", category, id);
        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| SdkError::invalid_state("record encryption failed"))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn unseal(&self, category: &str, id: &str, sealed: &[u8]) -> SdkResult<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(SdkError::invalid_state(format!("truncated {} record {}", category, id)));
        }
        let aad = format!("{}/{}", category, id);
        self.cipher()?
            .decrypt(
                Nonce::from_slice(&sealed[..NONCE_LEN]),
                Payload {
                    msg: &sealed[NONCE_LEN..],
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| {
                SdkError::new(
                    ErrorCode::WalletAccessFailed,
                    format!("cannot unseal {} record {}", category, id),
                )
            })
    }

    pub fn add<T: Serialize>(&self, category: &str, id: &str, value: &T) -> SdkResult<()> {
        let sealed = self.seal(category, id, &serde_json::to_vec(value)?)?;
        self.storage.add(category, id, &sealed)
    }

    pub fn get<T: DeserializeOwned>(&self, category: &str, id: &str) -> SdkResult<T> {
        let sealed = self.storage.get(category, id)?;
        Ok(serde_json::from_slice(&self.unseal(category, id, &sealed)?)?)
    }

    /// Like [`Wallet::get`], with a missing record mapped to `None`.
    pub fn find<T: DeserializeOwned>(&self, category: &str, id: &str) -> SdkResult<Option<T>> {
        match self.get(category, id) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code == ErrorCode::WalletItemNotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn update<T: Serialize>(&self, category: &str, id: &str, value: &T) -> SdkResult<()> {
        let sealed = self.seal(category, id, &serde_json::to_vec(value)?)?;
        self.storage.update(category, id, &sealed)
    }

    pub fn upsert<T: Serialize>(&self, category: &str, id: &str, value: &T) -> SdkResult<()> {
        match self.update(category, id, value) {
            Err(e) if e.code == ErrorCode::WalletItemNotFound => self.add(category, id, value),
            other => other,
        }
    }

    pub fn delete_record(&self, category: &str, id: &str) -> SdkResult<()> {
        self.storage.delete(category, id)
    }

    pub fn list<T: DeserializeOwned>(&self, category: &str) -> SdkResult<Vec<(String, T)>> {
        self.storage
            .list(category)?
            .into_iter()
            .map(|(id, sealed)| {
                let plain = self.unseal(category, &id, &sealed)?;
                Ok((id, serde_json::from_slice(&plain)?))
            })
            .collect()
    }
}
