//! The getting-started walkthrough.
//!
//! A steward onboards the government, a college (Faber), an employer (Acme)
//! and a bank (Thrift) and gives each a trust-anchor verinym. The government
//! publishes the Transcript and Job-Certificate schemas. Alice obtains
//! transcripts from Faber, proves them to Acme in a job application, gets a
//! revocable job certificate, and uses it to apply for a loan and pass KYC
//! at Thrift. Both issuers keep a revocation registry. Acme then revokes the
//! certificate and Thrift's re-check of the loan proof must fail.

use std::collections::BTreeMap;
use std::sync::Arc;

use verinym_core::{Did, Role, ScenarioConfig, REGISTRY_CAPACITY};
use verinym_sdk::{
    AttributeValue, CredentialValues, IdentitySdk, IssuanceType, PredicateType, Restriction,
    RevocationRegistryConfig, SchemaId,
};

use crate::actor::Actor;
use crate::error::{ScenarioError, ScenarioResult};
use crate::issuance::{issue_credential, revoke_credential, IssuedCredential};
use crate::onboarding::onboarding;
use crate::presentation::{
    expect_revealed, expect_self_attested, present_proof, request_proof, revoked_as_of,
    verify_presentation, PresentationPlan, ProofRequestBuilder,
};
use crate::publish::{
    create_and_publish_cred_def, create_and_publish_revoc_reg, create_and_publish_schema,
    CredDefSetup,
};
use crate::selection::SelectionPolicy;
use crate::session::PoolSession;
use crate::verinym::get_verinym;

pub const TRANSCRIPT_ATTRS: &[&str] = &[
    "first_name",
    "last_name",
    "degree",
    "status",
    "year",
    "average",
    "ssn",
];

pub const JOB_CERTIFICATE_ATTRS: &[&str] = &[
    "first_name",
    "last_name",
    "salary",
    "employee_status",
    "experience",
];

pub const ALICE_DEGREE: &str = "Bachelor of Science, Marketing";
pub const ALICE_SSN: &str = "123-45-6789";

/// What a completed run produced.
#[derive(Debug, Clone, Default)]
pub struct WalkthroughReport {
    /// Public DIDs by actor name.
    pub verinyms: BTreeMap<String, Did>,
    pub transcript_schema_id: SchemaId,
    pub job_certificate_schema_id: SchemaId,
    pub transcript_cred_def_id: String,
    pub job_certificate_cred_def_id: String,
    pub transcript_rev_reg_id: String,
    pub job_certificate_rev_reg_id: String,
    /// Referents in each transcript Alice stored, in issuance order.
    pub transcripts: Vec<String>,
    /// Revealed raw values of the job application, by referent.
    pub job_application_revealed: BTreeMap<String, String>,
    pub loan_verified: bool,
    pub kyc_verified: bool,
    /// Thrift's re-check of the loan proof after revocation.
    pub loan_valid_after_revocation: bool,
}

pub struct Walkthrough {
    sdk: Arc<dyn IdentitySdk>,
    config: ScenarioConfig,
}

impl Walkthrough {
    pub fn new(sdk: Arc<dyn IdentitySdk>, config: ScenarioConfig) -> Self {
        Self { sdk, config }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Open the pool, run the scenario, then tear everything down. A
    /// scenario failure is reported after teardown has been attempted.
    pub async fn run(&self) -> ScenarioResult<WalkthroughReport> {
        self.config.validate()?;
        let sdk = self.sdk.as_ref();
        let mut session = PoolSession::open(sdk, &self.config.pool).await?;
        let outcome = self.scenario(&mut session).await;
        let teardown = self.teardown(session).await;
        let report = outcome?;
        teardown?;
        Ok(report)
    }

    /// Close and delete wallets newest first, then the pool.
    pub async fn teardown(&self, session: PoolSession) -> ScenarioResult<()> {
        tracing::info!(pool = %session.name(), resources = session.resources().len(), "teardown");
        session.close(self.sdk.as_ref()).await
    }

    fn actor(&self, name: &str, session: &PoolSession, wallet: &str) -> ScenarioResult<Actor> {
        Actor::new(name, session.handle(), wallet, format!("{}_key", wallet))
            .with_storage(&self.config.wallet_storage)
    }

    async fn scenario(&self, session: &mut PoolSession) -> ScenarioResult<WalkthroughReport> {
        let sdk = self.sdk.as_ref();
        let cfg = &self.config.walkthrough;
        let nonce = cfg.connection_nonce;
        let mut report = WalkthroughReport::default();

        tracing::info!("== Setup: steward ==");
        let mut steward = self
            .actor("Sovrin Steward", session, "sovrin_steward_wallet")?
            .with_seed(cfg.steward_seed.clone());
        steward.ensure_wallet(sdk, session).await?;
        steward.create_did(sdk).await?;

        tracing::info!("== Onboarding: trust anchors ==");
        let mut government = self
            .actor("Government", session, "government_wallet")?
            .with_role(Role::TrustAnchor);
        let mut faber = self
            .actor("Faber", session, "faber_wallet")?
            .with_role(Role::TrustAnchor);
        let mut acme = self
            .actor("Acme", session, "acme_wallet")?
            .with_role(Role::TrustAnchor);
        let mut thrift = self
            .actor("Thrift", session, "thrift_wallet")?
            .with_role(Role::TrustAnchor);
        for anchor in [&mut government, &mut faber, &mut acme, &mut thrift] {
            let connection = onboarding(sdk, session, &mut steward, anchor, nonce).await?;
            let did = get_verinym(sdk, &steward, anchor, &connection).await?;
            report.verinyms.insert(anchor.name().to_string(), did);
        }

        tracing::info!("== Schemas ==");
        let (job_certificate_schema_id, _) = create_and_publish_schema(
            sdk,
            &government,
            "Job-Certificate",
            "0.2",
            JOB_CERTIFICATE_ATTRS,
        )
        .await?;
        let (transcript_schema_id, _) =
            create_and_publish_schema(sdk, &government, "Transcript", "1.2", TRANSCRIPT_ATTRS)
                .await?;
        report.job_certificate_schema_id = job_certificate_schema_id.clone();
        report.transcript_schema_id = transcript_schema_id.clone();

        tracing::info!("== Credential definitions ==");
        let registry_config = RevocationRegistryConfig {
            issuance_type: IssuanceType::IssuanceOnDemand,
            max_cred_num: REGISTRY_CAPACITY,
        };
        let tails_dir = &self.config.tails.base_dir;
        let mut transcript = create_and_publish_cred_def(
            sdk,
            &faber,
            "transcript",
            &transcript_schema_id,
            "TAG1",
            true,
        )
        .await?;
        let transcript_registry = create_and_publish_revoc_reg(
            sdk,
            &faber,
            &mut transcript,
            "cred_def_tag",
            &registry_config,
            &tails_dir.join("faber"),
        )
        .await?;
        let mut job_certificate = create_and_publish_cred_def(
            sdk,
            &acme,
            "job_certificate",
            &job_certificate_schema_id,
            "TAG1",
            true,
        )
        .await?;
        let job_certificate_registry = create_and_publish_revoc_reg(
            sdk,
            &acme,
            &mut job_certificate,
            "cred_def_tag",
            &registry_config,
            &tails_dir.join("acme"),
        )
        .await?;
        report.transcript_cred_def_id = transcript.cred_def_id.clone();
        report.job_certificate_cred_def_id = job_certificate.cred_def_id.clone();
        report.transcript_rev_reg_id = transcript_registry.rev_reg_id.clone();
        report.job_certificate_rev_reg_id = job_certificate_registry.rev_reg_id.clone();

        tracing::info!("== Transcripts: Faber -> Alice ==");
        let mut alice = self.actor("Alice", session, "alice_wallet")?;
        onboarding(sdk, session, &mut faber, &mut alice, nonce).await?;
        for round in 0..cfg.transcript_rounds {
            tracing::info!(round, "transcript issuance");
            let issued = issue_credential(
                sdk,
                &mut faber,
                &mut alice,
                &transcript,
                &transcript_values(&cfg.transcript_average),
            )
            .await?;
            report.transcripts.push(issued.referent);
        }

        tracing::info!("== Job application: Alice -> Acme ==");
        onboarding(sdk, session, &mut acme, &mut alice, nonce).await?;
        report.job_application_revealed =
            self.job_application(&mut acme, &mut alice, &transcript).await?;

        tracing::info!("== Job certificate: Acme -> Alice ==");
        let certificate = issue_credential(
            sdk,
            &mut acme,
            &mut alice,
            &job_certificate,
            &job_certificate_values(),
        )
        .await?;

        tracing::info!("== Loan application: Alice -> Thrift ==");
        onboarding(sdk, session, &mut thrift, &mut alice, nonce).await?;
        let loan_proof = self
            .loan_application(&mut thrift, &mut alice, &job_certificate)
            .await?;
        report.loan_verified = true;

        tracing::info!("== KYC: Alice -> Thrift ==");
        self.kyc(&mut thrift, &mut alice, &transcript, &job_certificate)
            .await?;
        report.kyc_verified = true;

        tracing::info!("== Revocation: Acme revokes the job certificate ==");
        revoke_job_certificate(sdk, &acme, &job_certificate, &certificate).await?;
        let now = chrono::Utc::now().timestamp();
        let revoked = revoked_as_of(sdk, &thrift, &loan_proof, now).await?;
        report.loan_valid_after_revocation = revoked.is_none();
        match revoked {
            Some((rev_reg_id, cred_rev_id)) => {
                tracing::info!(rev_reg_id = %rev_reg_id, cred_rev_id, "loan proof no longer holds");
            }
            None => {
                return Err(ScenarioError::VerificationFailed(
                    "loan proof still holds after the job certificate was revoked".into(),
                ))
            }
        }

        Ok(report)
    }

    async fn job_application(
        &self,
        acme: &mut Actor,
        alice: &mut Actor,
        transcript: &CredDefSetup,
    ) -> ScenarioResult<BTreeMap<String, String>> {
        let sdk = self.sdk.as_ref();
        let from_faber = || vec![Restriction::cred_def(transcript.cred_def_id.clone())];
        let request = ProofRequestBuilder::new("Job-Application", "0.1")
            .self_attested("first_name")
            .self_attested("last_name")
            .attribute("degree", from_faber())
            .attribute("status", from_faber())
            .attribute("ssn", from_faber())
            .self_attested("phone_number")
            .predicate(
                "average",
                PredicateType::GreaterOrEqual,
                self.config.walkthrough.average_threshold,
                from_faber(),
            )
            .non_revoked_to(chrono::Utc::now().timestamp())
            .build(sdk)
            .await?;
        let received = request_proof(sdk, acme, alice, "job_application", &request).await?;

        let plan = PresentationPlan::default()
            .self_attest("attr1_referent", "Alice")
            .self_attest("attr2_referent", "Garcia")
            .self_attest("attr6_referent", "123-45-6789");
        let policy = SelectionPolicy::from_config(&self.config.selection);
        let sealed = present_proof(sdk, alice, acme.name(), "job_application", &received, &plan, &policy)
            .await?;

        let proof =
            verify_presentation(sdk, acme, alice.name(), "job_application", &request, &sealed)
                .await?;
        expect_revealed(&proof, "attr3_referent", ALICE_DEGREE)?;
        expect_revealed(&proof, "attr4_referent", "graduated")?;
        expect_revealed(&proof, "attr5_referent", ALICE_SSN)?;
        expect_self_attested(&proof, "attr1_referent", "Alice")?;
        expect_self_attested(&proof, "attr2_referent", "Garcia")?;
        expect_self_attested(&proof, "attr6_referent", "123-45-6789")?;

        Ok(proof
            .requested_proof
            .revealed_attrs
            .iter()
            .map(|(referent, attr)| (referent.clone(), attr.raw.clone()))
            .collect())
    }

    async fn loan_application(
        &self,
        thrift: &mut Actor,
        alice: &mut Actor,
        job_certificate: &CredDefSetup,
    ) -> ScenarioResult<verinym_sdk::Proof> {
        let sdk = self.sdk.as_ref();
        let from_acme = || vec![Restriction::cred_def(job_certificate.cred_def_id.clone())];
        let request = ProofRequestBuilder::new("Loan-Application-Basic", "0.1")
            .attribute("employee_status", from_acme())
            .predicate("salary", PredicateType::GreaterOrEqual, 2000, from_acme())
            .predicate("experience", PredicateType::GreaterOrEqual, 1, from_acme())
            .non_revoked_to(chrono::Utc::now().timestamp())
            .build(sdk)
            .await?;
        let received = request_proof(sdk, thrift, alice, "loan_application", &request).await?;
        let policy = SelectionPolicy::from_config(&self.config.selection);
        let sealed = present_proof(
            sdk,
            alice,
            thrift.name(),
            "loan_application",
            &received,
            &PresentationPlan::default(),
            &policy,
        )
        .await?;
        let proof =
            verify_presentation(sdk, thrift, alice.name(), "loan_application", &request, &sealed)
                .await?;
        expect_revealed(&proof, "attr1_referent", "Permanent")?;
        Ok(proof)
    }

    async fn kyc(
        &self,
        thrift: &mut Actor,
        alice: &mut Actor,
        transcript: &CredDefSetup,
        job_certificate: &CredDefSetup,
    ) -> ScenarioResult<()> {
        let sdk = self.sdk.as_ref();
        let from_acme = || vec![Restriction::cred_def(job_certificate.cred_def_id.clone())];
        let request = ProofRequestBuilder::new("Loan-Application-KYC", "0.1")
            .attribute("first_name", from_acme())
            .attribute("last_name", from_acme())
            .attribute("ssn", vec![Restriction::cred_def(transcript.cred_def_id.clone())])
            .build(sdk)
            .await?;
        let received = request_proof(sdk, thrift, alice, "kyc", &request).await?;
        let policy = SelectionPolicy::from_config(&self.config.selection);
        let sealed = present_proof(
            sdk,
            alice,
            thrift.name(),
            "kyc",
            &received,
            &PresentationPlan::default(),
            &policy,
        )
        .await?;
        let proof = verify_presentation(sdk, thrift, alice.name(), "kyc", &request, &sealed).await?;
        expect_revealed(&proof, "attr1_referent", "Alice")?;
        expect_revealed(&proof, "attr2_referent", "Garcia")?;
        expect_revealed(&proof, "attr3_referent", ALICE_SSN)?;
        Ok(())
    }
}

async fn revoke_job_certificate(
    sdk: &dyn IdentitySdk,
    acme: &Actor,
    job_certificate: &CredDefSetup,
    certificate: &IssuedCredential,
) -> ScenarioResult<()> {
    let registry = job_certificate.revocation.as_ref().ok_or_else(|| {
        ScenarioError::Protocol("job certificate definition has no revocation registry".into())
    })?;
    revoke_credential(sdk, acme, registry, certificate).await?;
    Ok(())
}

/// Alice's transcript. `average` is taken as its own encoding so the
/// predicate compares the configured number directly.
pub fn transcript_values(average: &str) -> CredentialValues {
    let mut values = CredentialValues::new();
    values.insert("first_name".into(), AttributeValue::new("Alice"));
    values.insert("last_name".into(), AttributeValue::new("Garcia"));
    values.insert("degree".into(), AttributeValue::new(ALICE_DEGREE));
    values.insert("status".into(), AttributeValue::new("graduated"));
    values.insert("ssn".into(), AttributeValue::new(ALICE_SSN));
    values.insert("year".into(), AttributeValue::new("2015"));
    values.insert(
        "average".into(),
        AttributeValue::with_encoding(average, average),
    );
    values
}

pub fn job_certificate_values() -> CredentialValues {
    let mut values = CredentialValues::new();
    values.insert("first_name".into(), AttributeValue::new("Alice"));
    values.insert("last_name".into(), AttributeValue::new("Garcia"));
    values.insert("employee_status".into(), AttributeValue::new("Permanent"));
    values.insert("salary".into(), AttributeValue::new("2400"));
    values.insert("experience".into(), AttributeValue::new("10"));
    values
}
