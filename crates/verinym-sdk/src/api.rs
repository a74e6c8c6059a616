//! Capability traits of the identity SDK.
//!
//! Each trait covers one concern of the external library. The scenario
//! layer only talks to `dyn IdentitySdk`, so any backend implementing all
//! of them can drive the walkthrough.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use verinym_core::{Did, Verkey};

use crate::blob_storage::TailsStorageConfig;
use crate::credential::{
    Credential, CredentialOffer, CredentialRequest, CredentialRequestMetadata, CredentialValues,
    RevocationState, RevocationStates,
};
use crate::error::SdkResult;
use crate::handles::{BlobReaderHandle, BlobWriterHandle, PoolHandle, SearchHandle, WalletHandle};
use crate::ledger::{LedgerReply, LedgerRequest};
use crate::proof::{Proof, ProofRequest, RequestedCredential, RequestedCredentials};
use crate::types::{
    CredDefId, CredRevId, CredentialDefinition, CredentialDefinitionConfig, RevRegId,
    RevocationRegistry, RevocationRegistryConfig, RevocationRegistryDefinition,
    RevocationRegistryDelta, Schema, SchemaId,
};
use crate::wallet::{WalletConfig, WalletCredentials};

pub type Schemas = BTreeMap<SchemaId, Schema>;
pub type CredentialDefinitions = BTreeMap<CredDefId, CredentialDefinition>;
pub type RevocationRegistryDefinitions = BTreeMap<RevRegId, RevocationRegistryDefinition>;
/// Registry states by registry id, then by ledger timestamp.
pub type RevocationRegistries = BTreeMap<RevRegId, BTreeMap<i64, RevocationRegistry>>;

#[async_trait]
pub trait PoolApi: Send + Sync {
    /// Set the wire protocol version for requests built from now on (1 or 2).
    async fn set_protocol_version(&self, version: u32) -> SdkResult<()>;

    async fn create_pool_ledger_config(&self, name: &str, genesis_path: &Path) -> SdkResult<()>;

    async fn open_pool_ledger(&self, name: &str) -> SdkResult<PoolHandle>;

    async fn close_pool_ledger(&self, pool: PoolHandle) -> SdkResult<()>;

    async fn delete_pool_ledger_config(&self, name: &str) -> SdkResult<()>;
}

#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Sign with the submitter's wallet key and submit a write.
    async fn sign_and_submit_request(
        &self,
        pool: PoolHandle,
        wallet: WalletHandle,
        submitter: &Did,
        request: LedgerRequest,
    ) -> SdkResult<LedgerReply>;

    /// Submit an unsigned read.
    async fn submit_request(&self, pool: PoolHandle, request: LedgerRequest)
        -> SdkResult<LedgerReply>;
}

#[async_trait]
pub trait WalletApi: Send + Sync {
    async fn create_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<()>;

    async fn open_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<WalletHandle>;

    async fn close_wallet(&self, wallet: WalletHandle) -> SdkResult<()>;

    async fn delete_wallet(
        &self,
        config: &WalletConfig,
        credentials: &WalletCredentials,
    ) -> SdkResult<()>;
}

#[async_trait]
pub trait DidApi: Send + Sync {
    /// Generate a DID and key, from `seed` when given, and store both.
    async fn create_and_store_my_did(
        &self,
        wallet: WalletHandle,
        seed: Option<&str>,
    ) -> SdkResult<(Did, Verkey)>;

    /// Verkey for `did`: the wallet's own or cached records first, the
    /// ledger otherwise.
    async fn key_for_did(&self, pool: PoolHandle, wallet: WalletHandle, did: &Did)
        -> SdkResult<Verkey>;
}

#[async_trait]
pub trait CryptoApi: Send + Sync {
    async fn auth_crypt(
        &self,
        wallet: WalletHandle,
        sender_vk: &Verkey,
        recipient_vk: &Verkey,
        message: &[u8],
    ) -> SdkResult<Vec<u8>>;

    /// Returns the sender's verkey with the plaintext.
    async fn auth_decrypt(
        &self,
        wallet: WalletHandle,
        recipient_vk: &Verkey,
        message: &[u8],
    ) -> SdkResult<(Verkey, Vec<u8>)>;

    async fn anon_crypt(&self, recipient_vk: &Verkey, message: &[u8]) -> SdkResult<Vec<u8>>;

    async fn anon_decrypt(
        &self,
        wallet: WalletHandle,
        recipient_vk: &Verkey,
        message: &[u8],
    ) -> SdkResult<Vec<u8>>;
}

#[async_trait]
pub trait AnoncredsApi: Send + Sync {
    async fn issuer_create_schema(
        &self,
        issuer_did: &Did,
        name: &str,
        version: &str,
        attrs: &[String],
    ) -> SdkResult<(SchemaId, Schema)>;

    /// `schema` must carry its ledger sequence number.
    async fn issuer_create_and_store_credential_def(
        &self,
        wallet: WalletHandle,
        issuer_did: &Did,
        schema: &Schema,
        tag: &str,
        config: &CredentialDefinitionConfig,
    ) -> SdkResult<(CredDefId, CredentialDefinition)>;

    async fn issuer_create_and_store_revoc_reg(
        &self,
        wallet: WalletHandle,
        issuer_did: &Did,
        tag: &str,
        cred_def_id: &str,
        config: &RevocationRegistryConfig,
        tails_writer: BlobWriterHandle,
    ) -> SdkResult<(RevRegId, RevocationRegistryDefinition, RevocationRegistryDelta)>;

    async fn issuer_create_credential_offer(
        &self,
        wallet: WalletHandle,
        cred_def_id: &str,
    ) -> SdkResult<CredentialOffer>;

    /// Sign a credential. With a registry, also returns the assigned
    /// revocation id and, for on-demand registries, the delta to publish.
    async fn issuer_create_credential(
        &self,
        wallet: WalletHandle,
        offer: &CredentialOffer,
        request: &CredentialRequest,
        values: &CredentialValues,
        rev_reg_id: Option<&str>,
        tails_reader: Option<BlobReaderHandle>,
    ) -> SdkResult<(Credential, Option<CredRevId>, Option<RevocationRegistryDelta>)>;

    async fn issuer_revoke_credential(
        &self,
        wallet: WalletHandle,
        tails_reader: BlobReaderHandle,
        rev_reg_id: &str,
        cred_rev_id: CredRevId,
    ) -> SdkResult<RevocationRegistryDelta>;

    async fn prover_create_master_secret(
        &self,
        wallet: WalletHandle,
        master_secret_id: Option<&str>,
    ) -> SdkResult<String>;

    async fn prover_create_credential_req(
        &self,
        wallet: WalletHandle,
        prover_did: &Did,
        offer: &CredentialOffer,
        cred_def: &CredentialDefinition,
        master_secret_id: &str,
    ) -> SdkResult<(CredentialRequest, CredentialRequestMetadata)>;

    /// Check and store a credential; returns its referent.
    async fn prover_store_credential(
        &self,
        wallet: WalletHandle,
        cred_id: Option<&str>,
        metadata: &CredentialRequestMetadata,
        credential: &Credential,
        cred_def: &CredentialDefinition,
        rev_reg_def: Option<&RevocationRegistryDefinition>,
    ) -> SdkResult<String>;

    async fn prover_search_credentials_for_proof_req(
        &self,
        wallet: WalletHandle,
        proof_request: &ProofRequest,
    ) -> SdkResult<SearchHandle>;

    /// Next `count` candidates for `referent`.
    async fn prover_fetch_credentials_for_proof_req(
        &self,
        search: SearchHandle,
        referent: &str,
        count: usize,
    ) -> SdkResult<Vec<RequestedCredential>>;

    async fn prover_close_credentials_search_for_proof_req(
        &self,
        search: SearchHandle,
    ) -> SdkResult<()>;

    #[allow(clippy::too_many_arguments)]
    async fn prover_create_proof(
        &self,
        wallet: WalletHandle,
        proof_request: &ProofRequest,
        requested_credentials: &RequestedCredentials,
        master_secret_id: &str,
        schemas: &Schemas,
        cred_defs: &CredentialDefinitions,
        rev_states: &RevocationStates,
    ) -> SdkResult<Proof>;

    /// `Ok(false)` for any structural or cryptographic mismatch.
    async fn verifier_verify_proof(
        &self,
        proof_request: &ProofRequest,
        proof: &Proof,
        schemas: &Schemas,
        cred_defs: &CredentialDefinitions,
        rev_reg_defs: &RevocationRegistryDefinitions,
        rev_regs: &RevocationRegistries,
    ) -> SdkResult<bool>;

    /// Witness for `cred_rev_id` against a cumulative delta.
    async fn create_revocation_state(
        &self,
        tails_reader: BlobReaderHandle,
        rev_reg_def: &RevocationRegistryDefinition,
        delta: &RevocationRegistryDelta,
        timestamp: i64,
        cred_rev_id: CredRevId,
    ) -> SdkResult<RevocationState>;

    async fn generate_nonce(&self) -> SdkResult<String>;
}

#[async_trait]
pub trait BlobStorageApi: Send + Sync {
    async fn open_blob_storage_writer(
        &self,
        storage_type: &str,
        config: &TailsStorageConfig,
    ) -> SdkResult<BlobWriterHandle>;

    async fn open_blob_storage_reader(
        &self,
        storage_type: &str,
        config: &TailsStorageConfig,
    ) -> SdkResult<BlobReaderHandle>;
}

/// Everything the walkthrough needs from a backend.
pub trait IdentitySdk:
    PoolApi + LedgerApi + WalletApi + DidApi + CryptoApi + AnoncredsApi + BlobStorageApi
{
}

impl<T> IdentitySdk for T where
    T: PoolApi + LedgerApi + WalletApi + DidApi + CryptoApi + AnoncredsApi + BlobStorageApi
{
}
