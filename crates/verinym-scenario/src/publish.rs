//! Ledger writes and reads used by the walkthrough, plus the
//! create-then-publish helpers for schemas, credential definitions and
//! revocation registries.
//!
//! Nothing here retries: a rejected submission ends the scenario.

use std::path::Path;

use verinym_core::{Did, Role, Verkey};
use verinym_sdk::ledger::{
    build_cred_def_request, build_get_cred_def_request, build_get_revoc_reg_def_request,
    build_get_revoc_reg_delta_request, build_get_revoc_reg_request, build_get_schema_request,
    build_nym_request, build_revoc_reg_def_request, build_revoc_reg_entry_request,
    build_schema_request, parse_get_cred_def_response, parse_get_revoc_reg_def_response,
    parse_get_revoc_reg_delta_response, parse_get_revoc_reg_response, parse_get_schema_response,
};
use verinym_sdk::types::REVOC_DEF_TYPE_CL_ACCUM;
use verinym_sdk::{
    BlobReaderHandle, CredDefId, CredentialDefinition, CredentialDefinitionConfig, IdentitySdk,
    LedgerReply, PoolHandle, RevRegId, RevocationRegistry, RevocationRegistryConfig,
    RevocationRegistryDefinition, RevocationRegistryDelta, Schema, SchemaId, TailsStorageConfig,
    DEFAULT_BLOB_STORAGE_TYPE,
};

use crate::actor::Actor;
use crate::error::ScenarioResult;

/// Register `dest` on the ledger, signed by the actor's public DID.
pub async fn send_nym(
    sdk: &dyn IdentitySdk,
    submitter: &Actor,
    dest: &Did,
    verkey: &Verkey,
    role: Option<Role>,
) -> ScenarioResult<LedgerReply> {
    let did = submitter.did()?;
    let request = build_nym_request(did, dest, Some(verkey), None, role)?;
    let reply = sdk
        .sign_and_submit_request(submitter.pool(), submitter.wallet()?, did, request)
        .await?;
    tracing::info!(actor = %submitter.name(), dest = %dest, role = ?role, "NYM written");
    Ok(reply)
}

pub async fn send_schema(
    sdk: &dyn IdentitySdk,
    submitter: &Actor,
    schema: &Schema,
) -> ScenarioResult<LedgerReply> {
    let did = submitter.did()?;
    let request = build_schema_request(did, schema)?;
    let reply = sdk
        .sign_and_submit_request(submitter.pool(), submitter.wallet()?, did, request)
        .await?;
    tracing::info!(actor = %submitter.name(), schema_id = %schema.id, "schema published");
    Ok(reply)
}

pub async fn send_cred_def(
    sdk: &dyn IdentitySdk,
    submitter: &Actor,
    cred_def: &CredentialDefinition,
) -> ScenarioResult<LedgerReply> {
    let did = submitter.did()?;
    let request = build_cred_def_request(did, cred_def)?;
    let reply = sdk
        .sign_and_submit_request(submitter.pool(), submitter.wallet()?, did, request)
        .await?;
    tracing::info!(actor = %submitter.name(), cred_def_id = %cred_def.id, "credential definition published");
    Ok(reply)
}

pub async fn send_revoc_reg_def(
    sdk: &dyn IdentitySdk,
    submitter: &Actor,
    def: &RevocationRegistryDefinition,
) -> ScenarioResult<LedgerReply> {
    let did = submitter.did()?;
    let request = build_revoc_reg_def_request(did, def)?;
    let reply = sdk
        .sign_and_submit_request(submitter.pool(), submitter.wallet()?, did, request)
        .await?;
    tracing::info!(actor = %submitter.name(), rev_reg_id = %def.id, "revocation registry definition published");
    Ok(reply)
}

pub async fn send_revoc_reg_entry(
    sdk: &dyn IdentitySdk,
    submitter: &Actor,
    rev_reg_id: &str,
    delta: &RevocationRegistryDelta,
) -> ScenarioResult<LedgerReply> {
    let did = submitter.did()?;
    let request = build_revoc_reg_entry_request(did, rev_reg_id, REVOC_DEF_TYPE_CL_ACCUM, delta)?;
    let reply = sdk
        .sign_and_submit_request(submitter.pool(), submitter.wallet()?, did, request)
        .await?;
    tracing::info!(
        actor = %submitter.name(),
        rev_reg_id,
        issued = delta.value.issued.len(),
        revoked = delta.value.revoked.len(),
        txn_time = ?reply.txn_time,
        "revocation registry entry published"
    );
    Ok(reply)
}

pub async fn get_schema(
    sdk: &dyn IdentitySdk,
    pool: PoolHandle,
    submitter: &Did,
    schema_id: &str,
) -> ScenarioResult<(SchemaId, Schema)> {
    let request = build_get_schema_request(submitter, schema_id)?;
    let reply = sdk.submit_request(pool, request).await?;
    Ok(parse_get_schema_response(&reply)?)
}

pub async fn get_cred_def(
    sdk: &dyn IdentitySdk,
    pool: PoolHandle,
    submitter: &Did,
    cred_def_id: &str,
) -> ScenarioResult<(CredDefId, CredentialDefinition)> {
    let request = build_get_cred_def_request(submitter, cred_def_id)?;
    let reply = sdk.submit_request(pool, request).await?;
    Ok(parse_get_cred_def_response(&reply)?)
}

pub async fn get_revoc_reg_def(
    sdk: &dyn IdentitySdk,
    pool: PoolHandle,
    submitter: &Did,
    rev_reg_id: &str,
) -> ScenarioResult<(RevRegId, RevocationRegistryDefinition)> {
    let request = build_get_revoc_reg_def_request(submitter, rev_reg_id)?;
    let reply = sdk.submit_request(pool, request).await?;
    Ok(parse_get_revoc_reg_def_response(&reply)?)
}

/// Delta over `(from, to]`; cumulative when `from` is `None`. Also returns
/// the ledger time the delta is valid at.
pub async fn get_revoc_reg_delta(
    sdk: &dyn IdentitySdk,
    pool: PoolHandle,
    submitter: &Did,
    rev_reg_id: &str,
    from: Option<i64>,
    to: i64,
) -> ScenarioResult<(RevRegId, RevocationRegistryDelta, i64)> {
    let request = build_get_revoc_reg_delta_request(submitter, rev_reg_id, from, to)?;
    let reply = sdk.submit_request(pool, request).await?;
    Ok(parse_get_revoc_reg_delta_response(&reply)?)
}

/// Registry state as of `timestamp`, with the ledger time it was written.
pub async fn get_revoc_reg(
    sdk: &dyn IdentitySdk,
    pool: PoolHandle,
    submitter: &Did,
    rev_reg_id: &str,
    timestamp: i64,
) -> ScenarioResult<(RevRegId, RevocationRegistry, i64)> {
    let request = build_get_revoc_reg_request(submitter, rev_reg_id, timestamp)?;
    let reply = sdk.submit_request(pool, request).await?;
    Ok(parse_get_revoc_reg_response(&reply)?)
}

/// Create a schema under the actor's DID and publish it.
pub async fn create_and_publish_schema(
    sdk: &dyn IdentitySdk,
    issuer: &Actor,
    name: &str,
    version: &str,
    attrs: &[&str],
) -> ScenarioResult<(SchemaId, Schema)> {
    let attrs: Vec<String> = attrs.iter().map(|a| a.to_string()).collect();
    let (schema_id, schema) = sdk
        .issuer_create_schema(issuer.did()?, name, version, &attrs)
        .await?;
    send_schema(sdk, issuer, &schema).await?;
    Ok((schema_id, schema))
}

/// Revocation registry an issuer publishes alongside a credential definition.
#[derive(Debug, Clone)]
pub struct RevRegSetup {
    pub rev_reg_id: RevRegId,
    pub definition: RevocationRegistryDefinition,
    pub tails: TailsStorageConfig,
    /// Reader the issuer uses when issuing and revoking.
    pub tails_reader: BlobReaderHandle,
}

/// A published credential definition and everything needed to issue under it.
#[derive(Debug, Clone)]
pub struct CredDefSetup {
    /// Prefix for the artifacts recorded while issuing, e.g. `transcript`.
    pub label: String,
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub cred_def: CredentialDefinition,
    pub revocation: Option<RevRegSetup>,
}

impl CredDefSetup {
    pub fn rev_reg_id(&self) -> Option<&str> {
        self.revocation.as_ref().map(|r| r.rev_reg_id.as_str())
    }
}

/// Resolve the schema from the ledger, create the credential definition in
/// the issuer's wallet and publish it.
pub async fn create_and_publish_cred_def(
    sdk: &dyn IdentitySdk,
    issuer: &Actor,
    label: &str,
    schema_id: &str,
    tag: &str,
    support_revocation: bool,
) -> ScenarioResult<CredDefSetup> {
    let did = issuer.did()?;
    let (_, schema) = get_schema(sdk, issuer.pool(), did, schema_id).await?;
    let (cred_def_id, cred_def) = sdk
        .issuer_create_and_store_credential_def(
            issuer.wallet()?,
            did,
            &schema,
            tag,
            &CredentialDefinitionConfig { support_revocation },
        )
        .await?;
    send_cred_def(sdk, issuer, &cred_def).await?;
    Ok(CredDefSetup {
        label: label.to_string(),
        schema_id: schema.id,
        cred_def_id,
        cred_def,
        revocation: None,
    })
}

/// Create a revocation registry with its tails file under `tails_dir`,
/// publish the definition and the initial entry, and attach it to `setup`.
pub async fn create_and_publish_revoc_reg(
    sdk: &dyn IdentitySdk,
    issuer: &Actor,
    setup: &mut CredDefSetup,
    tag: &str,
    config: &RevocationRegistryConfig,
    tails_dir: &Path,
) -> ScenarioResult<RevRegSetup> {
    let tails = TailsStorageConfig::new(tails_dir);
    let writer = sdk
        .open_blob_storage_writer(DEFAULT_BLOB_STORAGE_TYPE, &tails)
        .await?;
    let (rev_reg_id, definition, initial) = sdk
        .issuer_create_and_store_revoc_reg(
            issuer.wallet()?,
            issuer.did()?,
            tag,
            &setup.cred_def_id,
            config,
            writer,
        )
        .await?;
    send_revoc_reg_def(sdk, issuer, &definition).await?;
    send_revoc_reg_entry(sdk, issuer, &rev_reg_id, &initial).await?;

    let tails_reader = sdk
        .open_blob_storage_reader(DEFAULT_BLOB_STORAGE_TYPE, &tails)
        .await?;
    let registry = RevRegSetup {
        rev_reg_id,
        definition,
        tails,
        tails_reader,
    };
    setup.revocation = Some(registry.clone());
    Ok(registry)
}
