//! Pool session and the stack of resources opened during a run.
//!
//! Every pool or wallet that was successfully opened is pushed on the
//! stack; `close` unwinds it newest first, so teardown mirrors creation and
//! never touches something that was not opened.

use verinym_core::config::PoolConfig;
use verinym_sdk::{IdentitySdk, PoolHandle, WalletConfig, WalletCredentials, WalletHandle};

use crate::error::{ignore_already_exists, ScenarioError, ScenarioResult};

/// A resource the session must release.
#[derive(Debug, Clone)]
pub enum Resource {
    Pool {
        name: String,
        handle: PoolHandle,
    },
    Wallet {
        owner: String,
        config: WalletConfig,
        credentials: WalletCredentials,
        handle: WalletHandle,
    },
}

impl Resource {
    pub fn label(&self) -> String {
        match self {
            Self::Pool { name, .. } => format!("pool {}", name),
            Self::Wallet { config, .. } => format!("wallet {}", config.id),
        }
    }
}

/// An open pool ledger plus everything opened on top of it.
#[derive(Debug)]
pub struct PoolSession {
    name: String,
    handle: PoolHandle,
    resources: Vec<Resource>,
}

impl PoolSession {
    /// Set the protocol version, create the pool config (reusing one left by
    /// an earlier run) and open it.
    pub async fn open(sdk: &dyn IdentitySdk, config: &PoolConfig) -> ScenarioResult<Self> {
        tracing::info!(pool = %config.name, "open pool ledger");
        sdk.set_protocol_version(config.protocol_version).await?;
        ignore_already_exists(
            sdk.create_pool_ledger_config(&config.name, &config.genesis_path)
                .await
                .map_err(ScenarioError::from),
            &config.name,
        )?;
        let handle = sdk.open_pool_ledger(&config.name).await?;
        Ok(Self {
            name: config.name.clone(),
            handle,
            resources: vec![Resource::Pool {
                name: config.name.clone(),
                handle,
            }],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> PoolHandle {
        self.handle
    }

    /// Resources still held, oldest first.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub(crate) fn track_wallet(
        &mut self,
        owner: &str,
        config: &WalletConfig,
        credentials: &WalletCredentials,
        handle: WalletHandle,
    ) {
        self.resources.push(Resource::Wallet {
            owner: owner.to_string(),
            config: config.clone(),
            credentials: credentials.clone(),
            handle,
        });
    }

    /// Release everything newest first. Keeps unwinding after a failure and
    /// reports the first error.
    pub async fn close(mut self, sdk: &dyn IdentitySdk) -> ScenarioResult<()> {
        let mut first_error = None;
        while let Some(resource) = self.resources.pop() {
            let label = resource.label();
            if let Err(err) = release(sdk, resource).await {
                tracing::warn!(resource = %label, error = %err, "teardown step failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn release(sdk: &dyn IdentitySdk, resource: Resource) -> ScenarioResult<()> {
    match resource {
        Resource::Wallet {
            owner,
            config,
            credentials,
            handle,
        } => {
            tracing::info!(actor = %owner, wallet = %config.id, "close and delete wallet");
            sdk.close_wallet(handle).await?;
            sdk.delete_wallet(&config, &credentials).await?;
        }
        Resource::Pool { name, handle } => {
            tracing::info!(pool = %name, "close and delete pool ledger");
            sdk.close_pool_ledger(handle).await?;
            sdk.delete_pool_ledger_config(&name).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use verinym_core::Role;
    use verinym_crypto::KeyPair;
    use verinym_sdk::{write_genesis, GenesisTxn, LifecycleEvent, LocalBackend, PoolApi};

    async fn pool_config(name: &str) -> PoolConfig {
        let dir = std::env::temp_dir().join(format!("verinym-session-{}", uuid::Uuid::now_v7()));
        let path = dir.join("pool.txn");
        let steward = KeyPair::from_seed_str("000000000000000000000000Steward1").unwrap();
        write_genesis(
            &path,
            &[GenesisTxn {
                dest: steward.did(),
                verkey: steward.verkey(),
                role: Some(Role::Steward),
                alias: None,
            }],
        )
        .await
        .unwrap();
        PoolConfig {
            name: name.to_string(),
            genesis_path: path,
            protocol_version: 2,
        }
    }

    #[tokio::test]
    async fn test_close_unwinds_in_reverse_order() {
        let backend = LocalBackend::new();
        let config = pool_config("session-pool").await;
        let mut session = PoolSession::open(&backend, &config).await.unwrap();

        let mut first = Actor::new("First", session.handle(), "first_wallet", "first_key");
        let mut second = Actor::new("Second", session.handle(), "second_wallet", "second_key");
        first.ensure_wallet(&backend, &mut session).await.unwrap();
        second.ensure_wallet(&backend, &mut session).await.unwrap();
        // Already open: not tracked twice.
        first.ensure_wallet(&backend, &mut session).await.unwrap();
        assert_eq!(session.resources().len(), 3);

        session.close(&backend).await.unwrap();
        let teardown: Vec<(LifecycleEvent, String)> = backend
            .journal()
            .into_iter()
            .skip_while(|e| e.event != LifecycleEvent::WalletClosed)
            .map(|e| (e.event, e.name))
            .collect();
        assert_eq!(
            teardown,
            vec![
                (LifecycleEvent::WalletClosed, "second_wallet".to_string()),
                (LifecycleEvent::WalletDeleted, "second_wallet".to_string()),
                (LifecycleEvent::WalletClosed, "first_wallet".to_string()),
                (LifecycleEvent::WalletDeleted, "first_wallet".to_string()),
                (LifecycleEvent::PoolClosed, "session-pool".to_string()),
                (LifecycleEvent::PoolConfigDeleted, "session-pool".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_open_reuses_existing_pool_config() {
        let backend = LocalBackend::new();
        let config = pool_config("reused-pool").await;
        backend
            .create_pool_ledger_config(&config.name, &config.genesis_path)
            .await
            .unwrap();
        let session = PoolSession::open(&backend, &config).await.unwrap();
        assert_eq!(session.name(), "reused-pool");
        session.close(&backend).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_rejects_bad_protocol_version() {
        let backend = LocalBackend::new();
        let mut config = pool_config("bad-version").await;
        config.protocol_version = 7;
        assert!(PoolSession::open(&backend, &config).await.is_err());
    }
}
