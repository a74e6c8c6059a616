//! Integration test: revocable job certificates, the loan-application proof
//! and what changes once the certificate is revoked.

use verinym_integration_tests::{Fixture, NONCE};
use verinym_scenario::walkthrough::{job_certificate_values, JOB_CERTIFICATE_ATTRS};
use verinym_scenario::{
    create_and_publish_cred_def, create_and_publish_revoc_reg, create_and_publish_schema,
    expect_revealed, issue_credential, onboarding, present_proof, request_proof,
    revoke_credential, revoked_as_of, verify_presentation, Actor, CredDefSetup, IssuedCredential,
    PoolSession, PresentationPlan, ProofRequestBuilder, RevRegSetup, SelectionPolicy,
};
use verinym_sdk::{
    IssuanceType, PredicateType, Proof, ProofRequest, Restriction, RevocationRegistryConfig,
};

struct Employer {
    session: PoolSession,
    acme: Actor,
    thrift: Actor,
    alice: Actor,
    job_certificate: CredDefSetup,
    registry: RevRegSetup,
    certificate: IssuedCredential,
}

async fn employer(fx: &Fixture) -> Employer {
    let sdk = fx.sdk();
    let mut session = fx.open_session().await;
    let mut steward = fx.steward(&mut session).await;
    let mut acme = fx
        .trust_anchor(&mut session, &mut steward, "Acme", "acme_wallet")
        .await;
    let mut thrift = fx
        .trust_anchor(&mut session, &mut steward, "Thrift", "thrift_wallet")
        .await;

    let (schema_id, _) =
        create_and_publish_schema(sdk, &acme, "Job-Certificate", "0.2", JOB_CERTIFICATE_ATTRS)
            .await
            .unwrap();
    let mut job_certificate =
        create_and_publish_cred_def(sdk, &acme, "job_certificate", &schema_id, "TAG1", true)
            .await
            .unwrap();
    let registry = create_and_publish_revoc_reg(
        sdk,
        &acme,
        &mut job_certificate,
        "cred_def_tag",
        &RevocationRegistryConfig {
            issuance_type: IssuanceType::IssuanceOnDemand,
            max_cred_num: 5,
        },
        &fx.config.tails.base_dir.join("acme"),
    )
    .await
    .unwrap();

    let mut alice = fx.actor(&session, "Alice", "alice_wallet");
    onboarding(sdk, &mut session, &mut acme, &mut alice, NONCE)
        .await
        .unwrap();
    onboarding(sdk, &mut session, &mut thrift, &mut alice, NONCE)
        .await
        .unwrap();
    let certificate = issue_credential(
        sdk,
        &mut acme,
        &mut alice,
        &job_certificate,
        &job_certificate_values(),
    )
    .await
    .unwrap();

    Employer {
        session,
        acme,
        thrift,
        alice,
        job_certificate,
        registry,
        certificate,
    }
}

async fn loan_request(fx: &Fixture, job_certificate: &CredDefSetup) -> ProofRequest {
    let from_acme = || vec![Restriction::cred_def(job_certificate.cred_def_id.clone())];
    ProofRequestBuilder::new("Loan-Application-Basic", "0.1")
        .attribute("employee_status", from_acme())
        .predicate("salary", PredicateType::GreaterOrEqual, 2000, from_acme())
        .predicate("experience", PredicateType::GreaterOrEqual, 1, from_acme())
        .non_revoked_to(chrono::Utc::now().timestamp())
        .build(fx.sdk())
        .await
        .unwrap()
}

async fn apply_for_loan(
    fx: &Fixture,
    thrift: &mut Actor,
    alice: &mut Actor,
    request: &ProofRequest,
) -> Result<Proof, verinym_scenario::ScenarioError> {
    let received = request_proof(fx.sdk(), thrift, alice, "loan_application", request).await?;
    let sealed = present_proof(
        fx.sdk(),
        alice,
        "Thrift",
        "loan_application",
        &received,
        &PresentationPlan::default(),
        &SelectionPolicy::first(),
    )
    .await?;
    verify_presentation(fx.sdk(), thrift, "Alice", "loan_application", request, &sealed).await
}

#[tokio::test]
async fn test_issued_certificate_carries_revocation_index() {
    let fx = Fixture::new("revocable").await;
    let Employer {
        session,
        registry,
        certificate,
        ..
    } = employer(&fx).await;

    assert_eq!(certificate.rev_reg_id.as_deref(), Some(registry.rev_reg_id.as_str()));
    assert!(certificate.cred_rev_id.is_some());
    assert!(registry.rev_reg_id.contains("cred_def_tag"));

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_loan_proof_fails_after_revocation() {
    let fx = Fixture::new("revocation").await;
    let Employer {
        session,
        acme,
        mut thrift,
        mut alice,
        job_certificate,
        registry,
        certificate,
    } = employer(&fx).await;

    let request = loan_request(&fx, &job_certificate).await;
    let proof = apply_for_loan(&fx, &mut thrift, &mut alice, &request)
        .await
        .expect("loan proof should verify before revocation");
    expect_revealed(&proof, "attr1_referent", "Permanent").unwrap();

    let delta = revoke_credential(fx.sdk(), &acme, &registry, &certificate)
        .await
        .unwrap();
    let index = certificate.cred_rev_id.unwrap();
    assert!(delta.value.revoked.contains(&index));
    assert!(!delta.value.issued.contains(&index));

    let now = chrono::Utc::now().timestamp();
    let revoked = revoked_as_of(fx.sdk(), &thrift, &proof, now).await.unwrap();
    assert_eq!(revoked, Some((registry.rev_reg_id.clone(), index)));

    // A fresh presentation cannot be built for a revoked credential either.
    let request = loan_request(&fx, &job_certificate).await;
    assert!(apply_for_loan(&fx, &mut thrift, &mut alice, &request).await.is_err());

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_loan_proof_holds_after_other_registry_writes() {
    let fx = Fixture::new("other-writes").await;
    let Employer {
        session,
        mut acme,
        mut thrift,
        mut alice,
        job_certificate,
        registry,
        certificate,
    } = employer(&fx).await;

    let request = loan_request(&fx, &job_certificate).await;
    let proof = apply_for_loan(&fx, &mut thrift, &mut alice, &request)
        .await
        .unwrap();

    let second = issue_credential(
        fx.sdk(),
        &mut acme,
        &mut alice,
        &job_certificate,
        &job_certificate_values(),
    )
    .await
    .unwrap();
    assert_ne!(second.cred_rev_id, certificate.cred_rev_id);
    let now = chrono::Utc::now().timestamp();
    assert_eq!(revoked_as_of(fx.sdk(), &thrift, &proof, now).await.unwrap(), None);

    revoke_credential(fx.sdk(), &acme, &registry, &second)
        .await
        .unwrap();
    let now = chrono::Utc::now().timestamp();
    assert_eq!(revoked_as_of(fx.sdk(), &thrift, &proof, now).await.unwrap(), None);

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_revoking_twice_is_rejected() {
    let fx = Fixture::new("revoke-twice").await;
    let Employer {
        session,
        acme,
        registry,
        certificate,
        ..
    } = employer(&fx).await;

    revoke_credential(fx.sdk(), &acme, &registry, &certificate)
        .await
        .unwrap();
    assert!(revoke_credential(fx.sdk(), &acme, &registry, &certificate)
        .await
        .is_err());

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_corrupted_tails_file_breaks_presentation() {
    let fx = Fixture::new("tails").await;
    let Employer {
        session,
        mut thrift,
        mut alice,
        job_certificate,
        registry,
        ..
    } = employer(&fx).await;

    std::fs::write(&registry.definition.value.tails_location, b"not the tails").unwrap();

    let request = loan_request(&fx, &job_certificate).await;
    assert!(apply_for_loan(&fx, &mut thrift, &mut alice, &request).await.is_err());

    session.close(fx.sdk()).await.unwrap();
}
