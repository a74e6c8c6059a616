//! Participants of a scenario and the artifacts they accumulate.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use verinym_core::{Did, Role, Verkey, WalletStorageConfig};
use verinym_sdk::{IdentitySdk, PoolHandle, WalletConfig, WalletCredentials, WalletHandle};

use crate::error::{ignore_already_exists, ScenarioError, ScenarioResult};
use crate::session::PoolSession;

/// Keys two actors use with each other, as seen from one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairwise {
    pub my_did: Did,
    pub my_verkey: Verkey,
    pub their_did: Did,
    pub their_verkey: Verkey,
}

/// One artifact an actor produced or received.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub purpose: String,
    pub value: serde_json::Value,
}

/// Append-only record of offers, requests, credentials and proofs.
///
/// Repeated exchanges append under the same purpose, so the n-th transcript
/// offer is `nth("transcript_cred_offer", n)`.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLog {
    entries: Vec<Artifact>,
}

impl ArtifactLog {
    pub fn record<T: Serialize>(&mut self, purpose: &str, value: &T) -> ScenarioResult<()> {
        self.entries.push(Artifact {
            purpose: purpose.to_string(),
            value: serde_json::to_value(value)?,
        });
        Ok(())
    }

    /// How many artifacts were recorded under `purpose`.
    pub fn count(&self, purpose: &str) -> usize {
        self.entries.iter().filter(|a| a.purpose == purpose).count()
    }

    pub fn nth<T: DeserializeOwned>(&self, purpose: &str, index: usize) -> ScenarioResult<T> {
        let artifact = self
            .entries
            .iter()
            .filter(|a| a.purpose == purpose)
            .nth(index)
            .ok_or_else(|| {
                ScenarioError::Protocol(format!("no {} artifact at index {}", purpose, index))
            })?;
        Ok(serde_json::from_value(artifact.value.clone())?)
    }

    pub fn latest<T: DeserializeOwned>(&self, purpose: &str) -> ScenarioResult<T> {
        let artifact = self
            .entries
            .iter()
            .rev()
            .find(|a| a.purpose == purpose)
            .ok_or_else(|| ScenarioError::Protocol(format!("no {} artifact", purpose)))?;
        Ok(serde_json::from_value(artifact.value.clone())?)
    }

    pub fn entries(&self) -> &[Artifact] {
        &self.entries
    }
}

/// A participant: wallet, public identity and pairwise relationships.
#[derive(Debug, Clone)]
pub struct Actor {
    name: String,
    pool: PoolHandle,
    wallet_config: WalletConfig,
    wallet_credentials: WalletCredentials,
    wallet: Option<WalletHandle>,
    seed: Option<String>,
    role: Option<Role>,
    did: Option<Did>,
    verkey: Option<Verkey>,
    master_secret_id: Option<String>,
    connections: BTreeMap<String, Pairwise>,
    pub artifacts: ArtifactLog,
}

impl Actor {
    /// Actor whose wallet is `<wallet_id>` unlocked by `<wallet_key>`.
    pub fn new(
        name: impl Into<String>,
        pool: PoolHandle,
        wallet_id: impl Into<String>,
        wallet_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pool,
            wallet_config: WalletConfig::new(wallet_id),
            wallet_credentials: WalletCredentials::new(wallet_key),
            wallet: None,
            seed: None,
            role: None,
            did: None,
            verkey: None,
            master_secret_id: None,
            connections: BTreeMap::new(),
            artifacts: ArtifactLog::default(),
        }
    }

    /// Derive the public DID from a fixed seed.
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Role requested when the actor's verinym is written.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Place the wallet on a configured storage driver.
    pub fn with_storage(mut self, storage: &WalletStorageConfig) -> ScenarioResult<Self> {
        let parse = |label: &str, raw: &Option<String>| -> ScenarioResult<Option<serde_json::Value>> {
            raw.as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()
                .map_err(|e| ScenarioError::Protocol(format!("{} is not JSON: {}", label, e)))
        };
        let config = parse("storage_config", &storage.storage_config)?;
        let creds = parse("storage_credentials", &storage.storage_credentials)?;
        self.wallet_config = self
            .wallet_config
            .with_storage(storage.storage_type.clone(), config);
        self.wallet_credentials = self.wallet_credentials.with_storage_credentials(creds);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> PoolHandle {
        self.pool
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn wallet_config(&self) -> &WalletConfig {
        &self.wallet_config
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn wallet(&self) -> ScenarioResult<WalletHandle> {
        self.wallet
            .ok_or_else(|| ScenarioError::Protocol(format!("{} has no open wallet", self.name)))
    }

    /// The actor's public DID.
    pub fn did(&self) -> ScenarioResult<&Did> {
        self.did
            .as_ref()
            .ok_or_else(|| ScenarioError::Protocol(format!("{} has no public DID", self.name)))
    }

    pub fn verkey(&self) -> ScenarioResult<&Verkey> {
        self.verkey
            .as_ref()
            .ok_or_else(|| ScenarioError::Protocol(format!("{} has no public verkey", self.name)))
    }

    pub(crate) fn set_identity(&mut self, did: Did, verkey: Verkey) {
        self.did = Some(did);
        self.verkey = Some(verkey);
    }

    pub fn connection(&self, counterparty: &str) -> ScenarioResult<&Pairwise> {
        self.connections.get(counterparty).ok_or_else(|| {
            ScenarioError::Protocol(format!("{} has no connection with {}", self.name, counterparty))
        })
    }

    pub(crate) fn add_connection(&mut self, counterparty: &str, pairwise: Pairwise) {
        self.connections.insert(counterparty.to_string(), pairwise);
    }

    /// Create the wallet unless an earlier run left it, then open it. The
    /// open wallet is tracked by `session` for teardown.
    pub async fn ensure_wallet(
        &mut self,
        sdk: &dyn IdentitySdk,
        session: &mut PoolSession,
    ) -> ScenarioResult<WalletHandle> {
        if let Some(handle) = self.wallet {
            return Ok(handle);
        }
        tracing::info!(actor = %self.name, wallet = %self.wallet_config.id, "create wallet");
        ignore_already_exists(
            sdk.create_wallet(&self.wallet_config, &self.wallet_credentials)
                .await
                .map_err(ScenarioError::from),
            &self.wallet_config.id,
        )?;
        let handle = sdk
            .open_wallet(&self.wallet_config, &self.wallet_credentials)
            .await?;
        session.track_wallet(&self.name, &self.wallet_config, &self.wallet_credentials, handle);
        self.wallet = Some(handle);
        Ok(handle)
    }

    /// Create the actor's public DID, from its seed when one is set.
    pub async fn create_did(&mut self, sdk: &dyn IdentitySdk) -> ScenarioResult<Did> {
        let (did, verkey) = sdk
            .create_and_store_my_did(self.wallet()?, self.seed.as_deref())
            .await?;
        tracing::info!(actor = %self.name, did = %did, "public DID created");
        self.set_identity(did.clone(), verkey);
        Ok(did)
    }

    /// Master secret id, created on first use.
    pub async fn master_secret(&mut self, sdk: &dyn IdentitySdk) -> ScenarioResult<String> {
        if let Some(id) = &self.master_secret_id {
            return Ok(id.clone());
        }
        let wanted = format!("{}_master_secret", self.wallet_config.id);
        let id = match sdk
            .prover_create_master_secret(self.wallet()?, Some(&wanted))
            .await
        {
            Ok(id) => id,
            Err(err) if err.code.is_already_exists() => {
                tracing::warn!(actor = %self.name, master_secret = %wanted, "master secret exists, reusing");
                wanted
            }
            Err(err) => return Err(err.into()),
        };
        self.master_secret_id = Some(id.clone());
        Ok(id)
    }
}
