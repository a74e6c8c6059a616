//! Integration test: onboarding, verinym issuance and the authenticated
//! channel between pairwise DIDs.

use verinym_integration_tests::{Fixture, NONCE};
use verinym_scenario::{auth_receive, auth_send, onboarding, ScenarioError};
use verinym_sdk::CryptoApi;

#[tokio::test]
async fn test_onboarding_returns_pairwise_dids_and_echoes_nonce() {
    let fx = Fixture::new("onboarding").await;
    let mut session = fx.open_session().await;
    let mut steward = fx.steward(&mut session).await;
    let mut faber = fx.actor(&session, "Faber", "faber_wallet");

    let connection = onboarding(fx.sdk(), &mut session, &mut steward, &mut faber, NONCE)
        .await
        .expect("onboarding should succeed");

    assert!(!connection.from_to_did.as_str().is_empty());
    assert!(!connection.to_from_did.as_str().is_empty());
    assert_ne!(connection.from_to_did, connection.to_from_did);
    assert_eq!(connection.response.nonce, NONCE);
    assert_eq!(connection.response.did, connection.to_from_did);

    // Both sides hold the relationship.
    let steward_side = steward.connection("Faber").unwrap();
    assert_eq!(steward_side.their_did, connection.to_from_did);
    let faber_side = faber.connection("Sovrin Steward").unwrap();
    assert_eq!(faber_side.their_verkey, connection.from_to_key);

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_verinym_differs_from_pairwise_did() {
    let fx = Fixture::new("verinym").await;
    let mut session = fx.open_session().await;
    let mut steward = fx.steward(&mut session).await;
    let faber = fx
        .trust_anchor(&mut session, &mut steward, "Faber", "faber_wallet")
        .await;

    let verinym = faber.did().unwrap().clone();
    let pairwise = faber.connection("Sovrin Steward").unwrap().my_did.clone();
    assert_ne!(verinym, pairwise);

    // The verinym carries the trust-anchor role, so it may publish.
    let definition = fx.transcript_definition(&faber).await;
    assert!(definition.cred_def_id.starts_with(verinym.as_str()));

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_auth_channel_roundtrip() {
    let fx = Fixture::new("auth-channel").await;
    let mut session = fx.open_session().await;
    let mut steward = fx.steward(&mut session).await;
    let mut faber = fx
        .trust_anchor(&mut session, &mut steward, "Faber", "faber_wallet")
        .await;
    let mut alice = fx.actor(&session, "Alice", "alice_wallet");
    onboarding(fx.sdk(), &mut session, &mut faber, &mut alice, NONCE)
        .await
        .unwrap();

    let message = serde_json::json!({"greeting": "hello Alice"});
    let sealed = auth_send(fx.sdk(), &faber, "Alice", &message).await.unwrap();
    let received: serde_json::Value = auth_receive(fx.sdk(), &alice, "Faber", &sealed)
        .await
        .unwrap();
    assert_eq!(received, message);

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_auth_receive_rejects_unexpected_sender() {
    let fx = Fixture::new("auth-mismatch").await;
    let mut session = fx.open_session().await;
    let mut steward = fx.steward(&mut session).await;
    let mut faber = fx
        .trust_anchor(&mut session, &mut steward, "Faber", "faber_wallet")
        .await;
    let mut acme = fx
        .trust_anchor(&mut session, &mut steward, "Acme", "acme_wallet")
        .await;
    let mut alice = fx.actor(&session, "Alice", "alice_wallet");
    onboarding(fx.sdk(), &mut session, &mut faber, &mut alice, NONCE)
        .await
        .unwrap();
    onboarding(fx.sdk(), &mut session, &mut acme, &mut alice, NONCE)
        .await
        .unwrap();

    // Acme seals a message to the key Alice uses for Faber.
    let alice_for_faber = alice.connection("Faber").unwrap().my_verkey.clone();
    let acme_for_alice = acme.connection("Alice").unwrap().my_verkey.clone();
    let forged = fx
        .sdk()
        .auth_crypt(
            acme.wallet().unwrap(),
            &acme_for_alice,
            &alice_for_faber,
            br#"{"greeting":"from Faber, honest"}"#,
        )
        .await
        .unwrap();

    let result: Result<serde_json::Value, _> =
        auth_receive(fx.sdk(), &alice, "Faber", &forged).await;
    assert!(matches!(result, Err(ScenarioError::AuthenticationMismatch(_))));

    session.close(fx.sdk()).await.unwrap();
}
