//! Verinym issuance: promote an onboarded actor to a ledger identity.

use serde::{Deserialize, Serialize};

use verinym_core::{Did, Verkey};
use verinym_sdk::IdentitySdk;

use crate::actor::Actor;
use crate::error::{ScenarioError, ScenarioResult};
use crate::onboarding::Onboarding;
use crate::publish::send_nym;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DidInfo {
    did: Did,
    verkey: Verkey,
}

/// `to` creates its public DID and sends it authcrypted over the pairwise
/// channel from `connection`; `from` checks the sender key against the
/// ledger and writes the NYM with `to`'s role.
pub async fn get_verinym(
    sdk: &dyn IdentitySdk,
    from: &Actor,
    to: &mut Actor,
    connection: &Onboarding,
) -> ScenarioResult<Did> {
    let (did, verkey) = sdk.create_and_store_my_did(to.wallet()?, None).await?;
    let info = DidInfo {
        did: did.clone(),
        verkey: verkey.clone(),
    };
    let authcrypted = sdk
        .auth_crypt(
            to.wallet()?,
            &connection.to_from_key,
            &connection.from_to_key,
            &serde_json::to_vec(&info)?,
        )
        .await?;

    let (sender_vk, plaintext) = sdk
        .auth_decrypt(from.wallet()?, &connection.from_to_key, &authcrypted)
        .await?;
    let expected = sdk
        .key_for_did(from.pool(), from.wallet()?, &connection.to_from_did)
        .await?;
    if sender_vk != expected {
        return Err(ScenarioError::AuthenticationMismatch(format!(
            "verinym for {} was sent by {}, expected {}",
            to.name(),
            sender_vk,
            expected
        )));
    }
    let received: DidInfo = serde_json::from_slice(&plaintext)?;

    send_nym(sdk, from, &received.did, &received.verkey, to.role()).await?;
    to.set_identity(did.clone(), verkey);
    tracing::info!(actor = %to.name(), did = %did, role = ?to.role(), "verinym issued");
    Ok(did)
}
