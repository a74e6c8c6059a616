//! Integration test: schema and definition publication, transcript
//! issuance and the job-application proof.

use verinym_integration_tests::{Fixture, NONCE};
use std::collections::BTreeMap;

use verinym_scenario::walkthrough::{transcript_values, ALICE_DEGREE, ALICE_SSN};
use verinym_scenario::{
    check_proof, create_and_publish_schema, expect_revealed, expect_self_attested, get_schema,
    issue_credential, onboarding, present_proof, request_proof, verify_presentation, Actor,
    CredDefSetup, PoolSession, PresentationPlan, ProofRequestBuilder, ScenarioError,
    SelectionPolicy,
};
use verinym_sdk::{PredicateType, ProofRequest, Restriction};

/// Faber holds a trust-anchor verinym and a transcript definition; Alice is
/// connected to Faber and to Acme.
struct College {
    session: PoolSession,
    faber: Actor,
    acme: Actor,
    alice: Actor,
    transcript: CredDefSetup,
}

async fn college(fx: &Fixture, revocable: bool) -> College {
    let mut session = fx.open_session().await;
    let mut steward = fx.steward(&mut session).await;
    let mut faber = fx
        .trust_anchor(&mut session, &mut steward, "Faber", "faber_wallet")
        .await;
    let mut acme = fx
        .trust_anchor(&mut session, &mut steward, "Acme", "acme_wallet")
        .await;
    let transcript = if revocable {
        fx.revocable_transcript_definition(&faber).await
    } else {
        fx.transcript_definition(&faber).await
    };
    let mut alice = fx.actor(&session, "Alice", "alice_wallet");
    onboarding(fx.sdk(), &mut session, &mut faber, &mut alice, NONCE)
        .await
        .unwrap();
    onboarding(fx.sdk(), &mut session, &mut acme, &mut alice, NONCE)
        .await
        .unwrap();
    College {
        session,
        faber,
        acme,
        alice,
        transcript,
    }
}

async fn job_application_request(
    fx: &Fixture,
    transcript: &CredDefSetup,
    non_revoked_to: Option<i64>,
) -> ProofRequest {
    let from_faber = || vec![Restriction::cred_def(transcript.cred_def_id.clone())];
    let builder = ProofRequestBuilder::new("Job-Application", "0.1")
        .self_attested("first_name")
        .self_attested("last_name")
        .attribute("degree", from_faber())
        .attribute("status", from_faber())
        .attribute("ssn", from_faber())
        .self_attested("phone_number")
        .predicate("average", PredicateType::GreaterOrEqual, 4, from_faber());
    let builder = match non_revoked_to {
        Some(to) => builder.non_revoked_to(to),
        None => builder,
    };
    builder.build(fx.sdk()).await.unwrap()
}

fn job_application_plan() -> PresentationPlan {
    PresentationPlan::default()
        .self_attest("attr1_referent", "Alice")
        .self_attest("attr2_referent", "Garcia")
        .self_attest("attr6_referent", "123-45-6789")
}

#[tokio::test]
async fn test_published_schema_is_read_back_by_id() {
    let fx = Fixture::new("schema").await;
    let mut session = fx.open_session().await;
    let mut steward = fx.steward(&mut session).await;
    let government = fx
        .trust_anchor(&mut session, &mut steward, "Government", "government_wallet")
        .await;

    let (schema_id, schema) = create_and_publish_schema(
        fx.sdk(),
        &government,
        "Job-Certificate",
        "0.2",
        &["first_name", "last_name", "salary", "employee_status", "experience"],
    )
    .await
    .unwrap();

    let (read_id, read) = get_schema(
        fx.sdk(),
        session.handle(),
        government.did().unwrap(),
        &schema_id,
    )
    .await
    .unwrap();
    assert_eq!(read_id, schema_id);
    assert_eq!(read.attr_names, schema.attr_names);
    assert!(read.seq_no.is_some());

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_job_application_reveals_issued_values() {
    let fx = Fixture::new("job-application").await;
    let College {
        session,
        mut faber,
        mut acme,
        mut alice,
        transcript,
    } = college(&fx, false).await;

    let issued = issue_credential(
        fx.sdk(),
        &mut faber,
        &mut alice,
        &transcript,
        &transcript_values("5"),
    )
    .await
    .unwrap();
    assert!(issued.rev_reg_id.is_none());
    assert_eq!(alice.artifacts.count("transcript_cred"), 1);

    let request = job_application_request(&fx, &transcript, None).await;
    let received = request_proof(fx.sdk(), &mut acme, &mut alice, "job_application", &request)
        .await
        .unwrap();
    assert_eq!(received, request);

    let sealed = present_proof(
        fx.sdk(),
        &mut alice,
        "Acme",
        "job_application",
        &received,
        &job_application_plan(),
        &SelectionPolicy::first(),
    )
    .await
    .unwrap();
    let proof = verify_presentation(fx.sdk(), &mut acme, "Alice", "job_application", &request, &sealed)
        .await
        .expect("proof should verify");

    expect_revealed(&proof, "attr3_referent", ALICE_DEGREE).unwrap();
    expect_revealed(&proof, "attr4_referent", "graduated").unwrap();
    expect_revealed(&proof, "attr5_referent", ALICE_SSN).unwrap();
    expect_self_attested(&proof, "attr1_referent", "Alice").unwrap();
    expect_self_attested(&proof, "attr6_referent", "123-45-6789").unwrap();

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_unsatisfied_predicate_is_rejected() {
    let fx = Fixture::new("predicate").await;
    let College {
        session,
        mut faber,
        mut acme,
        mut alice,
        transcript,
    } = college(&fx, false).await;

    issue_credential(
        fx.sdk(),
        &mut faber,
        &mut alice,
        &transcript,
        &transcript_values("3"),
    )
    .await
    .unwrap();

    let request = job_application_request(&fx, &transcript, None).await;
    let received = request_proof(fx.sdk(), &mut acme, &mut alice, "job_application", &request)
        .await
        .unwrap();
    let result = present_proof(
        fx.sdk(),
        &mut alice,
        "Acme",
        "job_application",
        &received,
        &job_application_plan(),
        &SelectionPolicy::first(),
    )
    .await;
    assert!(matches!(result, Err(ScenarioError::VerificationFailed(_))));

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_tampered_revealed_value_does_not_verify() {
    let fx = Fixture::new("tampered").await;
    let College {
        session,
        mut faber,
        mut acme,
        mut alice,
        transcript,
    } = college(&fx, false).await;

    issue_credential(
        fx.sdk(),
        &mut faber,
        &mut alice,
        &transcript,
        &transcript_values("5"),
    )
    .await
    .unwrap();
    let request = job_application_request(&fx, &transcript, None).await;
    let received = request_proof(fx.sdk(), &mut acme, &mut alice, "job_application", &request)
        .await
        .unwrap();
    let sealed = present_proof(
        fx.sdk(),
        &mut alice,
        "Acme",
        "job_application",
        &received,
        &job_application_plan(),
        &SelectionPolicy::first(),
    )
    .await
    .unwrap();
    let mut proof =
        verify_presentation(fx.sdk(), &mut acme, "Alice", "job_application", &request, &sealed)
            .await
            .unwrap();

    proof
        .requested_proof
        .revealed_attrs
        .get_mut("attr4_referent")
        .unwrap()
        .raw = "expelled".into();
    let valid = check_proof(fx.sdk(), &acme, &request, &proof)
        .await
        .unwrap();
    assert!(!valid);

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_restricted_attribute_cannot_be_self_attested() {
    let fx = Fixture::new("self-attest").await;
    let College {
        session,
        mut faber,
        mut acme,
        mut alice,
        transcript,
    } = college(&fx, false).await;

    issue_credential(
        fx.sdk(),
        &mut faber,
        &mut alice,
        &transcript,
        &transcript_values("5"),
    )
    .await
    .unwrap();
    let request = job_application_request(&fx, &transcript, None).await;
    let received = request_proof(fx.sdk(), &mut acme, &mut alice, "job_application", &request)
        .await
        .unwrap();
    let plan = job_application_plan().self_attest("attr3_referent", "PhD");
    let result = present_proof(
        fx.sdk(),
        &mut alice,
        "Acme",
        "job_application",
        &received,
        &plan,
        &SelectionPolicy::first(),
    )
    .await;
    assert!(matches!(result, Err(ScenarioError::Protocol(_))));

    session.close(fx.sdk()).await.unwrap();
}

#[tokio::test]
async fn test_job_application_from_two_revocable_transcripts() {
    let fx = Fixture::new("two-transcripts").await;
    let College {
        session,
        mut faber,
        mut acme,
        mut alice,
        transcript,
    } = college(&fx, true).await;

    let mut indexes = Vec::new();
    for _ in 0..2 {
        let issued = issue_credential(
            fx.sdk(),
            &mut faber,
            &mut alice,
            &transcript,
            &transcript_values("5"),
        )
        .await
        .unwrap();
        assert_eq!(issued.rev_reg_id.as_deref(), transcript.rev_reg_id());
        indexes.push(issued.cred_rev_id.unwrap());
    }
    assert_ne!(indexes[0], indexes[1]);

    let now = chrono::Utc::now().timestamp();
    let request = job_application_request(&fx, &transcript, Some(now)).await;
    let received = request_proof(fx.sdk(), &mut acme, &mut alice, "job_application", &request)
        .await
        .unwrap();
    let policy = SelectionPolicy::per_referent(BTreeMap::from([
        ("attr3_referent".to_string(), 0),
        ("attr4_referent".to_string(), 1),
        ("attr5_referent".to_string(), 0),
        ("predicate1_referent".to_string(), 1),
    ]));
    let sealed = present_proof(
        fx.sdk(),
        &mut alice,
        "Acme",
        "job_application",
        &received,
        &job_application_plan(),
        &policy,
    )
    .await
    .unwrap();
    let proof = verify_presentation(fx.sdk(), &mut acme, "Alice", "job_application", &request, &sealed)
        .await
        .expect("proof from two credentials of one registry should verify");

    assert_eq!(proof.identifiers.len(), 2);
    for identifier in &proof.identifiers {
        assert_eq!(identifier.rev_reg_id.as_deref(), transcript.rev_reg_id());
        assert!(identifier.timestamp.is_some());
    }
    let mut disclosed: Vec<_> = proof
        .proof
        .sub_proofs
        .iter()
        .filter_map(|sub| sub.revocation.as_ref().map(|r| r.cred_rev_id))
        .collect();
    disclosed.sort_unstable();
    indexes.sort_unstable();
    assert_eq!(disclosed, indexes);
    expect_revealed(&proof, "attr3_referent", ALICE_DEGREE).unwrap();
    expect_revealed(&proof, "attr4_referent", "graduated").unwrap();

    session.close(fx.sdk()).await.unwrap();
}
