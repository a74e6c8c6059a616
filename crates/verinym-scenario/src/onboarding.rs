//! Pairwise onboarding between two actors and the authenticated channel it
//! establishes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use verinym_core::{Did, Verkey};
use verinym_sdk::IdentitySdk;

use crate::actor::{Actor, Pairwise};
use crate::error::{ScenarioError, ScenarioResult};
use crate::publish::send_nym;
use crate::session::PoolSession;

/// Sent out of band by the initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub did: Did,
    pub nonce: u64,
}

/// The counterparty's answer, anoncrypted to the initiator's pairwise key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub did: Did,
    pub verkey: Verkey,
    pub nonce: u64,
}

/// Both sides of a new pairwise relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Onboarding {
    /// Initiator's DID and key for the counterparty.
    pub from_to_did: Did,
    pub from_to_key: Verkey,
    /// Counterparty's DID and key for the initiator.
    pub to_from_did: Did,
    pub to_from_key: Verkey,
    /// Response as decrypted by the initiator.
    pub response: ConnectionResponse,
}

/// Onboard `to` with `from`.
///
/// The initiator registers a fresh pairwise DID and sends it with `nonce`.
/// The counterparty (creating its wallet if needed) answers with its own
/// pairwise DID, anoncrypted to the initiator's key as resolved from the
/// ledger. The initiator accepts only if the echoed nonce matches, then
/// registers the counterparty's DID.
pub async fn onboarding(
    sdk: &dyn IdentitySdk,
    session: &mut PoolSession,
    from: &mut Actor,
    to: &mut Actor,
    nonce: u64,
) -> ScenarioResult<Onboarding> {
    tracing::info!(from = %from.name(), to = %to.name(), "onboarding");
    let (from_to_did, from_to_key) = sdk.create_and_store_my_did(from.wallet()?, None).await?;
    send_nym(sdk, from, &from_to_did, &from_to_key, None).await?;

    let request = ConnectionRequest {
        did: from_to_did.clone(),
        nonce,
    };

    let to_wallet = to.ensure_wallet(sdk, session).await?;
    let (to_from_did, to_from_key) = sdk.create_and_store_my_did(to_wallet, None).await?;
    let resolved = sdk.key_for_did(to.pool(), to_wallet, &request.did).await?;
    let response = ConnectionResponse {
        did: to_from_did.clone(),
        verkey: to_from_key.clone(),
        nonce: request.nonce,
    };
    let anoncrypted = sdk
        .anon_crypt(&resolved, &serde_json::to_vec(&response)?)
        .await?;

    let decrypted = sdk
        .anon_decrypt(from.wallet()?, &from_to_key, &anoncrypted)
        .await?;
    let response: ConnectionResponse = serde_json::from_slice(&decrypted)?;
    if response.nonce != nonce {
        return Err(ScenarioError::AuthenticationMismatch(format!(
            "{} echoed nonce {} to {}, expected {}",
            to.name(),
            response.nonce,
            from.name(),
            nonce
        )));
    }

    send_nym(sdk, from, &response.did, &response.verkey, None).await?;

    from.add_connection(
        to.name(),
        Pairwise {
            my_did: from_to_did.clone(),
            my_verkey: from_to_key.clone(),
            their_did: response.did.clone(),
            their_verkey: response.verkey.clone(),
        },
    );
    to.add_connection(
        from.name(),
        Pairwise {
            my_did: to_from_did.clone(),
            my_verkey: to_from_key.clone(),
            their_did: from_to_did.clone(),
            their_verkey: resolved,
        },
    );
    from.artifacts.record(&format!("connection_response_from_{}", to.name()), &response)?;

    Ok(Onboarding {
        from_to_did,
        from_to_key,
        to_from_did,
        to_from_key,
        response,
    })
}

/// Authcrypt `message` from `sender` to its pairwise counterpart `receiver`.
pub async fn auth_send<T: Serialize>(
    sdk: &dyn IdentitySdk,
    sender: &Actor,
    receiver: &str,
    message: &T,
) -> ScenarioResult<Vec<u8>> {
    let pairwise = sender.connection(receiver)?;
    let plaintext = serde_json::to_vec(message)?;
    Ok(sdk
        .auth_crypt(
            sender.wallet()?,
            &pairwise.my_verkey,
            &pairwise.their_verkey,
            &plaintext,
        )
        .await?)
}

/// Decrypt a message authcrypted by `sender` and check it really came from
/// the key `receiver` holds for that relationship.
pub async fn auth_receive<T: DeserializeOwned>(
    sdk: &dyn IdentitySdk,
    receiver: &Actor,
    sender: &str,
    message: &[u8],
) -> ScenarioResult<T> {
    let pairwise = receiver.connection(sender)?;
    let (sender_vk, plaintext) = sdk
        .auth_decrypt(receiver.wallet()?, &pairwise.my_verkey, message)
        .await?;
    if sender_vk != pairwise.their_verkey {
        return Err(ScenarioError::AuthenticationMismatch(format!(
            "message to {} claims {} but was sent by {}",
            receiver.name(),
            sender,
            sender_vk
        )));
    }
    Ok(serde_json::from_slice(&plaintext)?)
}
