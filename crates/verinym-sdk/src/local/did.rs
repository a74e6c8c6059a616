use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use verinym_core::{Did, Verkey};
use verinym_crypto::KeyPair;

use crate::api::{DidApi, LedgerApi};
use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::handles::{PoolHandle, WalletHandle};
use crate::ledger::{build_get_nym_request, parse_get_nym_response};
use crate::storage::{CATEGORY_DID, CATEGORY_KEY, CATEGORY_THEIR_DID};
use crate::wallet::Wallet;

use super::LocalBackend;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DidRecord {
    did: Did,
    verkey: Verkey,
}

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    verkey: Verkey,
    secret: String,
}

/// Key pair stored under `verkey`.
pub(super) fn signing_key(wallet: &Wallet, verkey: &Verkey) -> SdkResult<KeyPair> {
    let record: KeyRecord = wallet.get(CATEGORY_KEY, verkey.as_str())?;
    let secret = Zeroizing::new(
        hex::decode(&record.secret)
            .map_err(|e| SdkError::invalid_state(format!("corrupt key record: {}", e)))?,
    );
    Ok(KeyPair::from_bytes(&secret)?)
}

/// Key pair behind one of the wallet's own DIDs.
pub(super) fn signing_key_for_did(wallet: &Wallet, did: &Did) -> SdkResult<KeyPair> {
    let record: DidRecord = wallet.get(CATEGORY_DID, did.as_str())?;
    signing_key(wallet, &record.verkey)
}

fn store_key(wallet: &Wallet, key: &KeyPair) -> SdkResult<()> {
    let secret = Zeroizing::new(key.secret_bytes());
    wallet.upsert(
        CATEGORY_KEY,
        key.verkey().as_str(),
        &KeyRecord {
            verkey: key.verkey(),
            secret: hex::encode(&secret[..]),
        },
    )
}

#[async_trait]
impl DidApi for LocalBackend {
    async fn create_and_store_my_did(
        &self,
        wallet: WalletHandle,
        seed: Option<&str>,
    ) -> SdkResult<(Did, Verkey)> {
        let wallet = self.wallet(wallet)?;
        let key = match seed {
            Some(seed) => KeyPair::from_seed_str(seed)?,
            None => KeyPair::generate(),
        };
        let did = key.did();
        if let Some(existing) = wallet.find::<DidRecord>(CATEGORY_DID, did.as_str())? {
            tracing::debug!(%did, "did already in wallet");
            return Ok((existing.did, existing.verkey));
        }
        store_key(&wallet, &key)?;
        wallet.add(
            CATEGORY_DID,
            did.as_str(),
            &DidRecord {
                did: did.clone(),
                verkey: key.verkey(),
            },
        )?;
        tracing::debug!(%did, wallet = wallet.id(), "did created");
        Ok((did, key.verkey()))
    }

    async fn key_for_did(
        &self,
        pool: PoolHandle,
        wallet: WalletHandle,
        did: &Did,
    ) -> SdkResult<Verkey> {
        let wallet = self.wallet(wallet)?;
        for category in [CATEGORY_DID, CATEGORY_THEIR_DID] {
            if let Some(record) = wallet.find::<DidRecord>(category, did.as_str())? {
                return Ok(record.verkey);
            }
        }
        let reply = self
            .submit_request(pool, build_get_nym_request(did, did)?)
            .await?;
        let verkey = parse_get_nym_response(&reply)?.verkey.ok_or_else(|| {
            SdkError::new(ErrorCode::LedgerNotFound, format!("{} has no verkey on the ledger", did))
        })?;
        wallet.upsert(
            CATEGORY_THEIR_DID,
            did.as_str(),
            &DidRecord {
                did: did.clone(),
                verkey: verkey.clone(),
            },
        )?;
        Ok(verkey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::WalletApi;
    use crate::wallet::{WalletConfig, WalletCredentials};

    async fn open_wallet(backend: &LocalBackend) -> WalletHandle {
        let config = WalletConfig::new(format!("did-{}", uuid::Uuid::now_v7()));
        let creds = WalletCredentials::new("key");
        backend.create_wallet(&config, &creds).await.unwrap();
        backend.open_wallet(&config, &creds).await.unwrap()
    }

    #[tokio::test]
    async fn test_seeded_did_is_stable() {
        let backend = LocalBackend::new();
        let wallet = open_wallet(&backend).await;
        let seed = "000000000000000000000000Steward1";
        let first = backend.create_and_store_my_did(wallet, Some(seed)).await.unwrap();
        let again = backend.create_and_store_my_did(wallet, Some(seed)).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first.0, KeyPair::from_seed_str(seed).unwrap().did());
    }

    #[tokio::test]
    async fn test_random_dids_differ_and_keys_are_stored() {
        let backend = LocalBackend::new();
        let handle = open_wallet(&backend).await;
        let (a, a_vk) = backend.create_and_store_my_did(handle, None).await.unwrap();
        let (b, _) = backend.create_and_store_my_did(handle, None).await.unwrap();
        assert_ne!(a, b);
        let wallet = backend.wallet(handle).unwrap();
        assert_eq!(signing_key_for_did(&wallet, &a).unwrap().verkey(), a_vk);
    }

    #[tokio::test]
    async fn test_bad_seed_rejected() {
        let backend = LocalBackend::new();
        let wallet = open_wallet(&backend).await;
        let err = backend
            .create_and_store_my_did(wallet, Some("short"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CommonInvalidStructure);
    }

    #[tokio::test]
    async fn test_key_for_own_did_needs_no_pool() {
        let backend = LocalBackend::new();
        let wallet = open_wallet(&backend).await;
        let (did, vk) = backend.create_and_store_my_did(wallet, None).await.unwrap();
        let found = backend.key_for_did(PoolHandle(-1), wallet, &did).await.unwrap();
        assert_eq!(found, vk);
    }
}
