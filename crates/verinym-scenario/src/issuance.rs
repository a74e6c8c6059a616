//! Credential issuance over an authenticated pairwise channel, and
//! revocation.

use verinym_sdk::{
    CredRevId, Credential, CredentialOffer, CredentialRequest, CredentialValues, IdentitySdk,
    RevRegId, RevocationRegistryDelta,
};

use crate::actor::Actor;
use crate::error::{ScenarioError, ScenarioResult};
use crate::onboarding::{auth_receive, auth_send};
use crate::publish::{get_cred_def, get_revoc_reg_def, send_revoc_reg_entry, CredDefSetup, RevRegSetup};

/// A credential as stored by the holder.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// Referent in the holder's wallet.
    pub referent: String,
    pub credential: Credential,
    pub rev_reg_id: Option<RevRegId>,
    pub cred_rev_id: Option<CredRevId>,
}

/// Run offer, request, issue and store between `issuer` and `holder`.
///
/// Both must already be connected. When the definition has a revocation
/// registry the issuer publishes the resulting delta before sending the
/// credential.
pub async fn issue_credential(
    sdk: &dyn IdentitySdk,
    issuer: &mut Actor,
    holder: &mut Actor,
    setup: &CredDefSetup,
    values: &CredentialValues,
) -> ScenarioResult<IssuedCredential> {
    let label = &setup.label;
    tracing::info!(
        issuer = %issuer.name(),
        holder = %holder.name(),
        cred_def_id = %setup.cred_def_id,
        "issue credential"
    );

    let offer = sdk
        .issuer_create_credential_offer(issuer.wallet()?, &setup.cred_def_id)
        .await?;
    issuer.artifacts.record(&format!("{}_cred_offer", label), &offer)?;
    let sealed = auth_send(sdk, issuer, holder.name(), &offer).await?;

    let received_offer: CredentialOffer = auth_receive(sdk, holder, issuer.name(), &sealed).await?;
    holder
        .artifacts
        .record(&format!("{}_cred_offer", label), &received_offer)?;
    let holder_did = holder.connection(issuer.name())?.my_did.clone();
    let master_secret = holder.master_secret(sdk).await?;
    let (_, cred_def) =
        get_cred_def(sdk, holder.pool(), &holder_did, &received_offer.cred_def_id).await?;
    let (request, metadata) = sdk
        .prover_create_credential_req(
            holder.wallet()?,
            &holder_did,
            &received_offer,
            &cred_def,
            &master_secret,
        )
        .await?;
    holder.artifacts.record(&format!("{}_cred_request", label), &request)?;
    let sealed = auth_send(sdk, holder, issuer.name(), &request).await?;

    let received_request: CredentialRequest =
        auth_receive(sdk, issuer, holder.name(), &sealed).await?;
    let tails_reader = setup.revocation.as_ref().map(|r| r.tails_reader);
    let (credential, cred_rev_id, delta) = sdk
        .issuer_create_credential(
            issuer.wallet()?,
            &offer,
            &received_request,
            values,
            setup.rev_reg_id(),
            tails_reader,
        )
        .await?;
    if let (Some(rev_reg_id), Some(delta)) = (setup.rev_reg_id(), delta.as_ref()) {
        send_revoc_reg_entry(sdk, issuer, rev_reg_id, delta).await?;
    }
    issuer.artifacts.record(&format!("{}_cred", label), &credential)?;
    let sealed = auth_send(sdk, issuer, holder.name(), &credential).await?;

    let received: Credential = auth_receive(sdk, holder, issuer.name(), &sealed).await?;
    let rev_reg_def = match &received.rev_reg_id {
        Some(id) => Some(get_revoc_reg_def(sdk, holder.pool(), &holder_did, id).await?.1),
        None => None,
    };
    let referent = sdk
        .prover_store_credential(
            holder.wallet()?,
            None,
            &metadata,
            &received,
            &cred_def,
            rev_reg_def.as_ref(),
        )
        .await?;
    holder.artifacts.record(&format!("{}_cred", label), &received)?;
    tracing::info!(
        holder = %holder.name(),
        referent = %referent,
        cred_rev_id = ?cred_rev_id,
        "credential stored"
    );

    Ok(IssuedCredential {
        referent,
        rev_reg_id: received.rev_reg_id.clone(),
        cred_rev_id,
        credential: received,
    })
}

/// Revoke an issued credential and publish the delta.
pub async fn revoke_credential(
    sdk: &dyn IdentitySdk,
    issuer: &Actor,
    registry: &RevRegSetup,
    issued: &IssuedCredential,
) -> ScenarioResult<RevocationRegistryDelta> {
    let cred_rev_id = issued.cred_rev_id.ok_or_else(|| {
        ScenarioError::Protocol(format!("credential {} is not revocable", issued.referent))
    })?;
    if issued.rev_reg_id.as_deref() != Some(registry.rev_reg_id.as_str()) {
        return Err(ScenarioError::Protocol(format!(
            "credential {} is not in registry {}",
            issued.referent, registry.rev_reg_id
        )));
    }
    let delta = sdk
        .issuer_revoke_credential(
            issuer.wallet()?,
            registry.tails_reader,
            &registry.rev_reg_id,
            cred_rev_id,
        )
        .await?;
    send_revoc_reg_entry(sdk, issuer, &registry.rev_reg_id, &delta).await?;
    tracing::info!(
        issuer = %issuer.name(),
        rev_reg_id = %registry.rev_reg_id,
        cred_rev_id,
        "credential revoked"
    );
    Ok(delta)
}
