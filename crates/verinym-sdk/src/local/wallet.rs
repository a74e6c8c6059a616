use async_trait::async_trait;
use std::sync::Arc;

use crate::api::WalletApi;
use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::handles::WalletHandle;
use crate::wallet::{Wallet, WalletConfig, WalletCredentials};

use super::{LifecycleEvent, LocalBackend};

/// Run passphrase hashing off the async executor.
async fn blocking<T, F>(f: F) -> SdkResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> SdkResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SdkError::invalid_state(format!("wallet task failed: {}", e)))?
}

impl LocalBackend {
    fn is_open(&self, id: &str) -> bool {
        self.wallets.iter().any(|w| w.value().id() == id)
    }
}

#[async_trait]
impl WalletApi for LocalBackend {
    async fn create_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<()> {
        let driver = self.storage.get(config.storage_type.as_deref())?;
        let (config_owned, creds) = (config.clone(), credentials.clone());
        blocking(move || Wallet::create(driver.as_ref(), &config_owned, &creds)).await?;
        self.record(LifecycleEvent::WalletCreated, &config.id);
        Ok(())
    }

    async fn open_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<WalletHandle> {
        if self.is_open(&config.id) {
            return Err(SdkError::new(
                ErrorCode::WalletAlreadyOpened,
                format!("wallet {} is already open", config.id),
            ));
        }
        let driver = self.storage.get(config.storage_type.as_deref())?;
        let (config_owned, creds) = (config.clone(), credentials.clone());
        let wallet = blocking(move || Wallet::open(driver.as_ref(), &config_owned, &creds)).await?;
        let handle = WalletHandle(self.handles.next());
        self.wallets.insert(handle, Arc::new(wallet));
        self.record(LifecycleEvent::WalletOpened, &config.id);
        Ok(handle)
    }

    async fn close_wallet(&self, wallet: WalletHandle) -> SdkResult<()> {
        let (_, closed) = self
            .wallets
            .remove(&wallet)
            .ok_or_else(|| SdkError::invalid_handle(wallet))?;
        self.searches.retain(|_, s| s.wallet != wallet);
        self.record(LifecycleEvent::WalletClosed, closed.id());
        Ok(())
    }

    async fn delete_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<()> {
        if self.is_open(&config.id) {
            return Err(SdkError::invalid_state(format!(
                "wallet {} is open; close it first",
                config.id
            )));
        }
        let driver = self.storage.get(config.storage_type.as_deref())?;
        let (config_owned, creds) = (config.clone(), credentials.clone());
        blocking(move || Wallet::delete(driver.as_ref(), &config_owned, &creds)).await?;
        self.record(LifecycleEvent::WalletDeleted, &config.id);
        Ok(())
    }
}
