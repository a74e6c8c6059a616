//! Integration test: the full getting-started walkthrough against the
//! in-process backend, including teardown order and storage selection.

use std::collections::BTreeMap;

use verinym_core::SelectionPolicyKind;
use verinym_integration_tests::Fixture;
use verinym_scenario::walkthrough::{ALICE_DEGREE, ALICE_SSN};
use verinym_scenario::{ScenarioError, Walkthrough};
use verinym_sdk::{ErrorCode, LifecycleEvent};

const ACTOR_WALLETS: &[&str] = &[
    "sovrin_steward_wallet",
    "government_wallet",
    "faber_wallet",
    "acme_wallet",
    "thrift_wallet",
    "alice_wallet",
];

#[tokio::test]
async fn test_walkthrough_completes() {
    let fx = Fixture::new("walkthrough").await;
    let report = Walkthrough::new(fx.shared(), fx.config.clone())
        .run()
        .await
        .expect("walkthrough should complete");

    assert_eq!(report.verinyms.len(), 4);
    for actor in ["Government", "Faber", "Acme", "Thrift"] {
        assert!(report.verinyms.contains_key(actor), "{} has no verinym", actor);
    }
    let government = &report.verinyms["Government"];
    assert!(report.transcript_schema_id.starts_with(government.as_str()));
    assert!(report.transcript_schema_id.ends_with(":Transcript:1.2"));
    assert!(report.job_certificate_schema_id.ends_with(":Job-Certificate:0.2"));
    assert!(report
        .transcript_cred_def_id
        .starts_with(report.verinyms["Faber"].as_str()));
    assert!(report
        .transcript_rev_reg_id
        .starts_with(report.verinyms["Faber"].as_str()));
    assert!(report
        .job_certificate_rev_reg_id
        .starts_with(report.verinyms["Acme"].as_str()));

    assert_eq!(report.transcripts.len(), fx.config.walkthrough.transcript_rounds);
    assert_eq!(
        report.job_application_revealed.get("attr3_referent").map(String::as_str),
        Some(ALICE_DEGREE)
    );
    assert_eq!(
        report.job_application_revealed.get("attr5_referent").map(String::as_str),
        Some(ALICE_SSN)
    );
    assert!(report.loan_verified);
    assert!(report.kyc_verified);
    assert!(!report.loan_valid_after_revocation);
}

#[tokio::test]
async fn test_teardown_reverses_creation_order() {
    let fx = Fixture::new("teardown").await;
    Walkthrough::new(fx.shared(), fx.config.clone())
        .run()
        .await
        .unwrap();

    let journal = fx.backend.journal();
    let created: Vec<&str> = journal
        .iter()
        .filter(|e| e.event == LifecycleEvent::WalletCreated)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(created, ACTOR_WALLETS);

    let deleted: Vec<&str> = journal
        .iter()
        .filter(|e| e.event == LifecycleEvent::WalletDeleted)
        .map(|e| e.name.as_str())
        .collect();
    let mut expected = ACTOR_WALLETS.to_vec();
    expected.reverse();
    assert_eq!(deleted, expected);

    let tail: Vec<LifecycleEvent> = journal.iter().rev().take(2).map(|e| e.event).collect();
    assert_eq!(
        tail,
        vec![LifecycleEvent::PoolConfigDeleted, LifecycleEvent::PoolClosed]
    );
}

#[tokio::test]
async fn test_walkthrough_with_transcripts_mixed_per_referent() {
    let fx = Fixture::new("per-referent").await;
    let mut config = fx.config.clone();
    config.selection.policy = SelectionPolicyKind::PerReferent;
    config.selection.per_referent = BTreeMap::from([
        ("attr3_referent".to_string(), 0),
        ("attr4_referent".to_string(), 1),
        ("attr5_referent".to_string(), 0),
        ("predicate1_referent".to_string(), 1),
    ]);

    let report = Walkthrough::new(fx.shared(), config).run().await.unwrap();
    assert_eq!(report.transcripts.len(), 2);
    assert_eq!(
        report.job_application_revealed.get("attr4_referent").map(String::as_str),
        Some("graduated")
    );
    assert!(report.loan_verified);
    assert!(!report.loan_valid_after_revocation);
}

#[tokio::test]
async fn test_walkthrough_on_rocksdb_wallets() {
    let fx = Fixture::new("rocksdb").await;
    let mut config = fx.config.clone();
    config.wallet_storage.storage_type = Some("rocksdb".into());
    config.wallet_storage.storage_config = Some(
        serde_json::json!({ "path": fx.dir.join("wallets").to_string_lossy() }).to_string(),
    );

    let report = Walkthrough::new(fx.shared(), config).run().await.unwrap();
    assert!(report.kyc_verified);
    // Deleted wallets leave nothing behind.
    let leftover = std::fs::read_dir(fx.dir.join("wallets"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn test_unknown_storage_type_fails_and_still_closes_pool() {
    let fx = Fixture::new("unknown-storage").await;
    let mut config = fx.config.clone();
    config.wallet_storage.storage_type = Some("postgres".into());

    let err = Walkthrough::new(fx.shared(), config.clone())
        .run()
        .await
        .unwrap_err();
    match err {
        ScenarioError::Sdk(sdk) => assert_eq!(sdk.code, ErrorCode::WalletStorageTypeUnknown),
        other => panic!("unexpected error: {:?}", other),
    }

    let journal = fx.backend.journal();
    let last = journal.last().unwrap();
    assert_eq!(last.event, LifecycleEvent::PoolConfigDeleted);
    assert_eq!(last.name, config.pool.name);
}

#[tokio::test]
async fn test_plugin_library_is_refused() {
    let fx = Fixture::new("plugin").await;
    let err = fx
        .backend
        .storage()
        .register_plugin(
            "postgres",
            &fx.dir.join("libpostgres_storage.so"),
            "postgresstorage_init",
        )
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::WalletStorageTypeUnknown);
    assert!(fx.backend.storage().register_plugin(
        "rocksdb",
        &fx.dir.join("librocks.so"),
        "init"
    )
    .is_ok());
}
