//! Proof requests, presentation by the holder and verification against the
//! verifier's own ledger reads.

use std::collections::{BTreeMap, BTreeSet};

use verinym_core::Did;
use verinym_sdk::proof::Identifier;
use verinym_sdk::{
    AttributeInfo, BlobReaderHandle, CredRevId, CredentialDefinitions, IdentitySdk,
    NonRevokedInterval, PredicateInfo, PredicateType, Proof, ProofRequest, RequestedAttribute,
    RequestedCredential, RequestedCredentials, RequestedPredicate, Restriction, RevRegId,
    RevocationRegistries, RevocationRegistryDefinition, RevocationRegistryDefinitions,
    RevocationRegistryDelta, RevocationStates, Schemas, TailsStorageConfig,
    DEFAULT_BLOB_STORAGE_TYPE,
};

use crate::actor::Actor;
use crate::error::{ScenarioError, ScenarioResult};
use crate::onboarding::{auth_receive, auth_send};
use crate::publish::{get_cred_def, get_revoc_reg, get_revoc_reg_def, get_revoc_reg_delta, get_schema};
use crate::selection::SelectionPolicy;

/// Candidates fetched per round trip when searching the holder's wallet.
const FETCH_BATCH: usize = 10;

/// Builds a proof request with `attrN_referent` / `predicateN_referent` slots
/// numbered in the order they are added.
#[derive(Debug, Clone)]
pub struct ProofRequestBuilder {
    name: String,
    version: String,
    nonce: Option<String>,
    attributes: BTreeMap<String, AttributeInfo>,
    predicates: BTreeMap<String, PredicateInfo>,
    non_revoked: Option<NonRevokedInterval>,
}

impl ProofRequestBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            nonce: None,
            attributes: BTreeMap::new(),
            predicates: BTreeMap::new(),
            non_revoked: None,
        }
    }

    /// Use a fixed nonce instead of asking the SDK for one.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Unrestricted slot; the holder may self-attest it.
    pub fn self_attested(self, name: &str) -> Self {
        self.attribute(name, Vec::new())
    }

    /// Attribute slot that must come from a credential matching one of
    /// `restrictions` (any credential when empty).
    pub fn attribute(mut self, name: &str, restrictions: Vec<Restriction>) -> Self {
        let referent = format!("attr{}_referent", self.attributes.len() + 1);
        self.attributes.insert(
            referent,
            AttributeInfo {
                name: name.to_string(),
                restrictions: (!restrictions.is_empty()).then_some(restrictions),
                non_revoked: None,
            },
        );
        self
    }

    pub fn predicate(
        mut self,
        name: &str,
        p_type: PredicateType,
        p_value: i64,
        restrictions: Vec<Restriction>,
    ) -> Self {
        let referent = format!("predicate{}_referent", self.predicates.len() + 1);
        self.predicates.insert(
            referent,
            PredicateInfo {
                name: name.to_string(),
                p_type,
                p_value,
                restrictions: (!restrictions.is_empty()).then_some(restrictions),
                non_revoked: None,
            },
        );
        self
    }

    /// Credentials must be unrevoked as of `to`.
    pub fn non_revoked_to(mut self, to: i64) -> Self {
        self.non_revoked = Some(NonRevokedInterval::to(to));
        self
    }

    pub async fn build(self, sdk: &dyn IdentitySdk) -> ScenarioResult<ProofRequest> {
        let nonce = match self.nonce {
            Some(nonce) => nonce,
            None => sdk.generate_nonce().await?,
        };
        let request = ProofRequest {
            nonce,
            name: self.name,
            version: self.version,
            requested_attributes: self.attributes,
            requested_predicates: self.predicates,
            non_revoked: self.non_revoked,
        };
        request.validate()?;
        Ok(request)
    }
}

/// How the holder answers a request beyond picking credentials.
#[derive(Debug, Clone, Default)]
pub struct PresentationPlan {
    /// Referent → value the holder asserts itself.
    pub self_attested: BTreeMap<String, String>,
    /// Attribute referents proven without disclosing the value.
    pub unrevealed: BTreeSet<String>,
}

impl PresentationPlan {
    pub fn self_attest(mut self, referent: &str, value: &str) -> Self {
        self.self_attested
            .insert(referent.to_string(), value.to_string());
        self
    }

    pub fn unrevealed(mut self, referent: &str) -> Self {
        self.unrevealed.insert(referent.to_string());
        self
    }
}

/// Send `request` from `verifier` to `holder`; returns it as the holder
/// received it.
pub async fn request_proof(
    sdk: &dyn IdentitySdk,
    verifier: &mut Actor,
    holder: &mut Actor,
    purpose: &str,
    request: &ProofRequest,
) -> ScenarioResult<ProofRequest> {
    tracing::info!(verifier = %verifier.name(), holder = %holder.name(), purpose, "request proof");
    verifier
        .artifacts
        .record(&format!("{}_proof_request", purpose), request)?;
    let sealed = auth_send(sdk, verifier, holder.name(), request).await?;
    let received: ProofRequest = auth_receive(sdk, holder, verifier.name(), &sealed).await?;
    holder
        .artifacts
        .record(&format!("{}_proof_request", purpose), &received)?;
    Ok(received)
}

/// All candidates for `referent`, in wallet order.
async fn fetch_candidates(
    sdk: &dyn IdentitySdk,
    search: verinym_sdk::SearchHandle,
    referent: &str,
) -> ScenarioResult<Vec<RequestedCredential>> {
    let mut all = Vec::new();
    loop {
        let batch = sdk
            .prover_fetch_credentials_for_proof_req(search, referent, FETCH_BATCH)
            .await?;
        let done = batch.len() < FETCH_BATCH;
        all.extend(batch);
        if done {
            return Ok(all);
        }
    }
}

/// Referent → chosen candidate for every slot the holder proves from a
/// credential.
async fn choose_credentials(
    sdk: &dyn IdentitySdk,
    holder: &Actor,
    request: &ProofRequest,
    plan: &PresentationPlan,
    policy: &SelectionPolicy,
) -> ScenarioResult<BTreeMap<String, RequestedCredential>> {
    let search = sdk
        .prover_search_credentials_for_proof_req(holder.wallet()?, request)
        .await?;

    let referents: Vec<&String> = request
        .requested_attributes
        .keys()
        .filter(|r| !plan.self_attested.contains_key(*r))
        .chain(request.requested_predicates.keys())
        .collect();
    let mut chosen = BTreeMap::new();
    let mut outcome = Ok(());
    for referent in referents {
        let candidates = match fetch_candidates(sdk, search, referent).await {
            Ok(c) => c,
            Err(err) => {
                outcome = Err(err);
                break;
            }
        };
        match policy.select(referent, &candidates) {
            Some(pick) => {
                tracing::debug!(
                    referent = %referent,
                    candidates = candidates.len(),
                    cred_id = %pick.cred_info.referent,
                    "credential selected"
                );
                chosen.insert(referent.clone(), pick.clone());
            }
            None => {
                outcome = Err(ScenarioError::Protocol(format!(
                    "{} holds no credential for {}",
                    holder.name(),
                    referent
                )));
                break;
            }
        }
    }

    sdk.prover_close_credentials_search_for_proof_req(search)
        .await?;
    outcome.map(|_| chosen)
}

/// Ledger objects the holder needs to build a proof.
#[derive(Debug, Clone, Default)]
pub struct ProverEntities {
    pub schemas: Schemas,
    pub cred_defs: CredentialDefinitions,
    pub rev_states: RevocationStates,
    /// Ledger time the revocation states of each registry were built at.
    pub timestamps: BTreeMap<RevRegId, i64>,
}

/// A registry's definition and cumulative delta as of one ledger time.
struct RegistrySnapshot {
    def: RevocationRegistryDefinition,
    delta: RevocationRegistryDelta,
    timestamp: i64,
    reader: BlobReaderHandle,
}

/// Resolve schemas, definitions and, for revocable credentials asked for
/// with an interval, a revocation state at the latest ledger time not after
/// the interval end. Each credential gets its own state, so several
/// credentials from one registry can be presented together.
pub async fn prover_get_entities_from_ledger(
    sdk: &dyn IdentitySdk,
    holder: &Actor,
    submitter: &Did,
    credentials: &[RequestedCredential],
) -> ScenarioResult<ProverEntities> {
    let pool = holder.pool();
    let mut entities = ProverEntities::default();
    let mut snapshots: BTreeMap<RevRegId, RegistrySnapshot> = BTreeMap::new();
    for requested in credentials {
        let info = &requested.cred_info;
        if !entities.schemas.contains_key(&info.schema_id) {
            tracing::debug!(actor = %holder.name(), schema_id = %info.schema_id, "get schema from ledger");
            let (id, schema) = get_schema(sdk, pool, submitter, &info.schema_id).await?;
            entities.schemas.insert(id, schema);
        }
        if !entities.cred_defs.contains_key(&info.cred_def_id) {
            tracing::debug!(actor = %holder.name(), cred_def_id = %info.cred_def_id, "get credential definition from ledger");
            let (id, cred_def) = get_cred_def(sdk, pool, submitter, &info.cred_def_id).await?;
            entities.cred_defs.insert(id, cred_def);
        }
        let (Some(rev_reg_id), Some(cred_rev_id), Some(interval)) =
            (&info.rev_reg_id, info.cred_rev_id, requested.interval)
        else {
            continue;
        };
        if !snapshots.contains_key(rev_reg_id) {
            let to = interval.to.unwrap_or_else(|| chrono::Utc::now().timestamp());
            let (_, def) = get_revoc_reg_def(sdk, pool, submitter, rev_reg_id).await?;
            let (_, delta, timestamp) =
                get_revoc_reg_delta(sdk, pool, submitter, rev_reg_id, None, to).await?;
            let reader = sdk
                .open_blob_storage_reader(
                    DEFAULT_BLOB_STORAGE_TYPE,
                    &TailsStorageConfig::for_location(&def.value.tails_location),
                )
                .await?;
            entities.timestamps.insert(rev_reg_id.clone(), timestamp);
            snapshots.insert(
                rev_reg_id.clone(),
                RegistrySnapshot {
                    def,
                    delta,
                    timestamp,
                    reader,
                },
            );
        }
        let Some(snapshot) = snapshots.get(rev_reg_id) else {
            continue;
        };
        let by_index = entities
            .rev_states
            .entry(rev_reg_id.clone())
            .or_default()
            .entry(snapshot.timestamp)
            .or_default();
        if by_index.contains_key(&cred_rev_id) {
            continue;
        }
        let state = sdk
            .create_revocation_state(
                snapshot.reader,
                &snapshot.def,
                &snapshot.delta,
                snapshot.timestamp,
                cred_rev_id,
            )
            .await?;
        tracing::debug!(
            actor = %holder.name(),
            rev_reg_id = %rev_reg_id,
            cred_rev_id,
            timestamp = snapshot.timestamp,
            "revocation state built"
        );
        by_index.insert(cred_rev_id, state);
    }
    Ok(entities)
}

/// Build the proof for `request` and send it authcrypted to `verifier`.
pub async fn present_proof(
    sdk: &dyn IdentitySdk,
    holder: &mut Actor,
    verifier: &str,
    purpose: &str,
    request: &ProofRequest,
    plan: &PresentationPlan,
    policy: &SelectionPolicy,
) -> ScenarioResult<Vec<u8>> {
    tracing::info!(holder = %holder.name(), verifier, purpose, "present proof");
    for referent in plan.self_attested.keys() {
        match request.requested_attributes.get(referent) {
            Some(info) if info.restrictions.is_none() => {}
            Some(_) => {
                return Err(ScenarioError::Protocol(format!(
                    "{} is restricted and cannot be self-attested",
                    referent
                )))
            }
            None => {
                return Err(ScenarioError::Protocol(format!(
                    "{} is not an attribute of {}",
                    referent, request.name
                )))
            }
        }
    }

    let chosen = choose_credentials(sdk, holder, request, plan, policy).await?;
    let submitter = holder.connection(verifier)?.my_did.clone();
    let credentials: Vec<RequestedCredential> = chosen.values().cloned().collect();
    let entities = prover_get_entities_from_ledger(sdk, holder, &submitter, &credentials).await?;

    let timestamp_for = |c: &RequestedCredential| -> Option<i64> {
        c.interval?;
        c.cred_info
            .rev_reg_id
            .as_ref()
            .and_then(|id| entities.timestamps.get(id).copied())
    };
    let mut requested = RequestedCredentials {
        self_attested_attributes: plan.self_attested.clone(),
        ..Default::default()
    };
    for (referent, pick) in &chosen {
        if request.requested_attributes.contains_key(referent) {
            requested.requested_attributes.insert(
                referent.clone(),
                RequestedAttribute {
                    cred_id: pick.cred_info.referent.clone(),
                    timestamp: timestamp_for(pick),
                    revealed: !plan.unrevealed.contains(referent),
                },
            );
        } else {
            requested.requested_predicates.insert(
                referent.clone(),
                RequestedPredicate {
                    cred_id: pick.cred_info.referent.clone(),
                    timestamp: timestamp_for(pick),
                },
            );
        }
    }
    holder
        .artifacts
        .record(&format!("{}_requested_creds", purpose), &requested)?;

    let master_secret = holder.master_secret(sdk).await?;
    let proof = sdk
        .prover_create_proof(
            holder.wallet()?,
            request,
            &requested,
            &master_secret,
            &entities.schemas,
            &entities.cred_defs,
            &entities.rev_states,
        )
        .await?;
    holder.artifacts.record(&format!("{}_proof", purpose), &proof)?;
    auth_send(sdk, holder, verifier, &proof).await
}

/// Ledger objects the verifier resolves on its own.
#[derive(Debug, Clone, Default)]
pub struct VerifierEntities {
    pub schemas: Schemas,
    pub cred_defs: CredentialDefinitions,
    pub rev_reg_defs: RevocationRegistryDefinitions,
    pub rev_regs: RevocationRegistries,
}

/// Resolve everything a proof's identifiers point at. Registry states are
/// read at each identifier's timestamp.
pub async fn verifier_get_entities_from_ledger(
    sdk: &dyn IdentitySdk,
    verifier: &Actor,
    submitter: &Did,
    identifiers: &[Identifier],
) -> ScenarioResult<VerifierEntities> {
    let pool = verifier.pool();
    let mut entities = VerifierEntities::default();
    for identifier in identifiers {
        if !entities.schemas.contains_key(&identifier.schema_id) {
            let (id, schema) = get_schema(sdk, pool, submitter, &identifier.schema_id).await?;
            entities.schemas.insert(id, schema);
        }
        if !entities.cred_defs.contains_key(&identifier.cred_def_id) {
            let (id, cred_def) = get_cred_def(sdk, pool, submitter, &identifier.cred_def_id).await?;
            entities.cred_defs.insert(id, cred_def);
        }
        let (Some(rev_reg_id), Some(timestamp)) = (&identifier.rev_reg_id, identifier.timestamp)
        else {
            continue;
        };
        if !entities.rev_reg_defs.contains_key(rev_reg_id) {
            let (id, def) = get_revoc_reg_def(sdk, pool, submitter, rev_reg_id).await?;
            entities.rev_reg_defs.insert(id, def);
        }
        let (id, registry, ledger_time) =
            get_revoc_reg(sdk, pool, submitter, rev_reg_id, timestamp).await?;
        tracing::debug!(actor = %verifier.name(), rev_reg_id = %id, requested = timestamp, ledger_time, "revocation registry read");
        entities
            .rev_regs
            .entry(id)
            .or_default()
            .insert(ledger_time, registry);
    }
    Ok(entities)
}

/// First credential disclosed in `proof` that its issuer has revoked as of
/// `at`. Only the registries' revoked sets are consulted, so writes that
/// merely issue new credentials never affect the answer.
pub async fn revoked_as_of(
    sdk: &dyn IdentitySdk,
    verifier: &Actor,
    proof: &Proof,
    at: i64,
) -> ScenarioResult<Option<(RevRegId, CredRevId)>> {
    let submitter = verifier.did()?;
    for (identifier, sub_proof) in proof.identifiers.iter().zip(&proof.proof.sub_proofs) {
        let (Some(rev_reg_id), Some(revocation)) = (&identifier.rev_reg_id, &sub_proof.revocation)
        else {
            continue;
        };
        let (_, delta, ledger_time) =
            get_revoc_reg_delta(sdk, verifier.pool(), submitter, rev_reg_id, None, at).await?;
        tracing::debug!(actor = %verifier.name(), rev_reg_id = %rev_reg_id, at, ledger_time, revoked = delta.value.revoked.len(), "revocation status read");
        if delta.value.revoked.contains(&revocation.cred_rev_id) {
            return Ok(Some((rev_reg_id.clone(), revocation.cred_rev_id)));
        }
    }
    Ok(None)
}

/// Verify `proof` against ledger data the verifier reads itself.
pub async fn check_proof(
    sdk: &dyn IdentitySdk,
    verifier: &Actor,
    request: &ProofRequest,
    proof: &Proof,
) -> ScenarioResult<bool> {
    let entities =
        verifier_get_entities_from_ledger(sdk, verifier, verifier.did()?, &proof.identifiers)
            .await?;
    let valid = sdk
        .verifier_verify_proof(
            request,
            proof,
            &entities.schemas,
            &entities.cred_defs,
            &entities.rev_reg_defs,
            &entities.rev_regs,
        )
        .await?;
    tracing::info!(verifier = %verifier.name(), request = %request.name, valid, "proof checked");
    Ok(valid)
}

/// Receive a proof from `holder` and require it to verify.
pub async fn verify_presentation(
    sdk: &dyn IdentitySdk,
    verifier: &mut Actor,
    holder: &str,
    purpose: &str,
    request: &ProofRequest,
    sealed: &[u8],
) -> ScenarioResult<Proof> {
    let proof: Proof = auth_receive(sdk, verifier, holder, sealed).await?;
    verifier.artifacts.record(&format!("{}_proof", purpose), &proof)?;
    if !check_proof(sdk, verifier, request, &proof).await? {
        return Err(ScenarioError::VerificationFailed(format!(
            "{} proof from {} rejected",
            purpose, holder
        )));
    }
    Ok(proof)
}

/// Require the revealed raw value of `referent` to equal `expected`.
pub fn expect_revealed(proof: &Proof, referent: &str, expected: &str) -> ScenarioResult<()> {
    match proof.revealed(referent) {
        Some(attr) if attr.raw == expected => Ok(()),
        Some(attr) => Err(ScenarioError::VerificationFailed(format!(
            "{} revealed {:?}, expected {:?}",
            referent, attr.raw, expected
        ))),
        None => Err(ScenarioError::VerificationFailed(format!(
            "{} was not revealed",
            referent
        ))),
    }
}

pub fn expect_self_attested(proof: &Proof, referent: &str, expected: &str) -> ScenarioResult<()> {
    match proof.requested_proof.self_attested_attrs.get(referent) {
        Some(value) if value == expected => Ok(()),
        other => Err(ScenarioError::VerificationFailed(format!(
            "{} self-attested {:?}, expected {:?}",
            referent, other, expected
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_builders() {
        let plan = PresentationPlan::default()
            .self_attest("attr1_referent", "Alice")
            .unrevealed("attr4_referent");
        assert_eq!(plan.self_attested.get("attr1_referent").map(String::as_str), Some("Alice"));
        assert!(plan.unrevealed.contains("attr4_referent"));
    }

    #[tokio::test]
    async fn test_builder_numbers_referents() {
        let backend = verinym_sdk::LocalBackend::new();
        let request = ProofRequestBuilder::new("Job-Application", "0.1")
            .nonce("1432422343242122312411212")
            .self_attested("first_name")
            .attribute("degree", vec![Restriction::cred_def("cd")])
            .predicate("average", PredicateType::GreaterOrEqual, 4, vec![Restriction::cred_def("cd")])
            .non_revoked_to(1_700_000_000)
            .build(&backend)
            .await
            .unwrap();
        assert!(request.requested_attributes["attr1_referent"].restrictions.is_none());
        assert_eq!(request.requested_attributes["attr2_referent"].name, "degree");
        assert_eq!(request.requested_predicates["predicate1_referent"].p_value, 4);
        assert_eq!(request.non_revoked, Some(NonRevokedInterval::to(1_700_000_000)));
    }

    #[tokio::test]
    async fn test_builder_generates_nonce_and_validates() {
        let backend = verinym_sdk::LocalBackend::new();
        let request = ProofRequestBuilder::new("KYC", "0.1")
            .self_attested("first_name")
            .build(&backend)
            .await
            .unwrap();
        assert!(request.nonce.chars().all(|c| c.is_ascii_digit()));

        let empty = ProofRequestBuilder::new("Nothing", "0.1").build(&backend).await;
        assert!(matches!(empty, Err(ScenarioError::Sdk(_))));
    }

    #[test]
    fn test_expect_revealed_mismatch() {
        let proof: Proof = serde_json::from_value(serde_json::json!({
            "proof": {"nonce": "1", "blinded_ms": "ms", "sub_proofs": []},
            "requested_proof": {
                "revealed_attrs": {
                    "attr3_referent": {"sub_proof_index": 0, "raw": "Bachelor of Science, Marketing", "encoded": "1"}
                },
                "self_attested_attrs": {"attr1_referent": "Alice"}
            },
            "identifiers": []
        }))
        .unwrap();
        assert!(expect_revealed(&proof, "attr3_referent", "Bachelor of Science, Marketing").is_ok());
        assert!(matches!(
            expect_revealed(&proof, "attr3_referent", "Master of Arts"),
            Err(ScenarioError::VerificationFailed(_))
        ));
        assert!(expect_revealed(&proof, "attr4_referent", "graduated").is_err());
        assert!(expect_self_attested(&proof, "attr1_referent", "Alice").is_ok());
        assert!(expect_self_attested(&proof, "attr1_referent", "Bob").is_err());
    }
}
