//! Proof verification as a list of named checks.

use verinym_crypto::{verify, verify_merkle_path, MerkleStep, PublicKey, Signature};

use crate::api::{
    CredentialDefinitions, RevocationRegistries, RevocationRegistryDefinitions, Schemas,
};
use crate::credential::{attribute_message, raw_digest, RevocationBinding};
use crate::proof::{
    restrictions_match, CredentialSource, DisclosedAttribute, Identifier, NonRevokedInterval,
    Proof, ProofRequest, Restriction, SubProof,
};
use crate::revocation::decode_accum;
use crate::types::attr_common_view;

/// Outcome of verifying one proof.
#[derive(Debug, Clone)]
pub(crate) struct VerificationResult {
    pub valid: bool,
    /// Checks run, in order; verification stops at the first failure.
    pub checks: Vec<VerificationCheck>,
}

#[derive(Debug, Clone)]
pub(crate) struct VerificationCheck {
    pub name: &'static str,
    pub passed: bool,
    pub detail: Option<String>,
}

struct Failed;

#[derive(Default)]
struct Checks {
    checks: Vec<VerificationCheck>,
}

impl Checks {
    fn require(
        &mut self,
        name: &'static str,
        passed: bool,
        detail: impl FnOnce() -> String,
    ) -> Result<(), Failed> {
        let detail = (!passed).then(detail);
        self.checks.push(VerificationCheck {
            name,
            passed,
            detail,
        });
        if passed {
            Ok(())
        } else {
            Err(Failed)
        }
    }

    fn found<T>(
        &mut self,
        name: &'static str,
        value: Option<T>,
        detail: impl FnOnce() -> String,
    ) -> Result<T, Failed> {
        let passed = value.is_some();
        self.require(name, passed, detail)?;
        value.ok_or(Failed)
    }
}

pub(crate) fn verify_proof(
    request: &ProofRequest,
    proof: &Proof,
    schemas: &Schemas,
    cred_defs: &CredentialDefinitions,
    rev_reg_defs: &RevocationRegistryDefinitions,
    rev_regs: &RevocationRegistries,
) -> VerificationResult {
    let mut checks = Checks::default();
    let ledger = LedgerView {
        schemas,
        cred_defs,
        rev_reg_defs,
        rev_regs,
    };
    let valid = run(&mut checks, request, proof, &ledger).is_ok();
    VerificationResult {
        valid,
        checks: checks.checks,
    }
}

struct LedgerView<'a> {
    schemas: &'a Schemas,
    cred_defs: &'a CredentialDefinitions,
    rev_reg_defs: &'a RevocationRegistryDefinitions,
    rev_regs: &'a RevocationRegistries,
}

fn run(
    c: &mut Checks,
    request: &ProofRequest,
    proof: &Proof,
    ledger: &LedgerView<'_>,
) -> Result<(), Failed> {
    c.require("request_valid", request.validate().is_ok(), || {
        "proof request is malformed".into()
    })?;
    c.require("nonce", proof.proof.nonce == request.nonce, || {
        format!("proof answers nonce {}, request has {}", proof.proof.nonce, request.nonce)
    })?;
    c.require(
        "identifiers",
        proof.identifiers.len() == proof.proof.sub_proofs.len(),
        || {
            format!(
                "{} identifiers for {} sub-proofs",
                proof.identifiers.len(),
                proof.proof.sub_proofs.len()
            )
        },
    )?;
    check_referents(c, request, proof)?;

    for (index, (sub, id)) in proof
        .proof
        .sub_proofs
        .iter()
        .zip(&proof.identifiers)
        .enumerate()
    {
        check_sub_proof(c, index, sub, id, &proof.proof.blinded_ms, ledger)?;
    }

    let requested = &proof.requested_proof;
    for (referent, revealed) in &requested.revealed_attrs {
        let info = c.found("referents_covered", request.requested_attributes.get(referent), || {
            format!("{} was not requested", referent)
        })?;
        let (sub, id) = sub_proof_at(c, proof, revealed.sub_proof_index)?;
        let attr = disclosed(c, sub, &info.name)?;
        c.require(
            "revealed_values",
            attr.raw_digest == raw_digest(&revealed.raw) && attr.encoded == revealed.encoded,
            || format!("revealed value of {} does not match the signed one", referent),
        )?;
        check_restrictions(c, referent, info.restrictions.as_deref(), id)?;
        check_interval(c, referent, request.attribute_interval(referent), id)?;
    }
    for (referent, at) in &requested.unrevealed_attrs {
        let info = c.found("referents_covered", request.requested_attributes.get(referent), || {
            format!("{} was not requested", referent)
        })?;
        let (sub, id) = sub_proof_at(c, proof, at.sub_proof_index)?;
        disclosed(c, sub, &info.name)?;
        check_restrictions(c, referent, info.restrictions.as_deref(), id)?;
        check_interval(c, referent, request.attribute_interval(referent), id)?;
    }
    for referent in requested.self_attested_attrs.keys() {
        let info = c.found("referents_covered", request.requested_attributes.get(referent), || {
            format!("{} was not requested", referent)
        })?;
        c.require(
            "self_attested",
            info.restrictions.as_ref().map_or(true, |r| r.is_empty()),
            || format!("{} is restricted but was self-attested", referent),
        )?;
    }
    for (referent, at) in &requested.predicates {
        let info = c.found("referents_covered", request.requested_predicates.get(referent), || {
            format!("predicate {} was not requested", referent)
        })?;
        let (sub, id) = sub_proof_at(c, proof, at.sub_proof_index)?;
        let attr = disclosed(c, sub, &info.name)?;
        let value = c.found("predicates", attr.encoded.parse::<i64>().ok(), || {
            format!("{} is not numeric", info.name)
        })?;
        c.require("predicates", info.p_type.holds(value, info.p_value), || {
            format!("{} does not satisfy {:?} {}", info.name, info.p_type, info.p_value)
        })?;
        check_restrictions(c, referent, info.restrictions.as_deref(), id)?;
        check_interval(c, referent, request.predicate_interval(referent), id)?;
    }
    Ok(())
}

fn check_referents(c: &mut Checks, request: &ProofRequest, proof: &Proof) -> Result<(), Failed> {
    let requested = &proof.requested_proof;
    for referent in request.requested_attributes.keys() {
        let answers = [
            requested.revealed_attrs.contains_key(referent),
            requested.unrevealed_attrs.contains_key(referent),
            requested.self_attested_attrs.contains_key(referent),
        ]
        .iter()
        .filter(|b| **b)
        .count();
        c.require("referents_covered", answers == 1, || {
            format!("attribute {} is answered {} times", referent, answers)
        })?;
    }
    for referent in request.requested_predicates.keys() {
        c.require(
            "referents_covered",
            requested.predicates.contains_key(referent),
            || format!("predicate {} is not answered", referent),
        )?;
    }
    Ok(())
}

fn sub_proof_at<'p>(
    c: &mut Checks,
    proof: &'p Proof,
    index: usize,
) -> Result<(&'p SubProof, &'p Identifier), Failed> {
    let sub = proof.proof.sub_proofs.get(index);
    let id = proof.identifiers.get(index);
    c.found("sub_proof_index", sub.zip(id), || {
        format!("no sub-proof at index {}", index)
    })
}

fn disclosed<'p>(
    c: &mut Checks,
    sub: &'p SubProof,
    name: &str,
) -> Result<&'p DisclosedAttribute, Failed> {
    let wanted = attr_common_view(name);
    let attr = sub
        .attributes
        .iter()
        .find(|(k, _)| attr_common_view(k) == wanted)
        .map(|(_, v)| v);
    c.found("attribute_disclosed", attr, || {
        format!("sub-proof does not cover {}", name)
    })
}

fn check_restrictions(
    c: &mut Checks,
    referent: &str,
    restrictions: Option<&[Restriction]>,
    id: &Identifier,
) -> Result<(), Failed> {
    let source = CredentialSource::new(&id.schema_id, &id.cred_def_id).ok();
    let source = c.found("identifiers", source, || {
        format!("malformed identifiers {} / {}", id.schema_id, id.cred_def_id)
    })?;
    c.require("restrictions", restrictions_match(restrictions, &source), || {
        format!("{} comes from {}, which no restriction allows", referent, id.cred_def_id)
    })
}

fn check_interval(
    c: &mut Checks,
    referent: &str,
    interval: Option<NonRevokedInterval>,
    id: &Identifier,
) -> Result<(), Failed> {
    let (Some(interval), Some(_)) = (interval, &id.rev_reg_id) else {
        return Ok(());
    };
    let timestamp = c.found("non_revoked_interval", id.timestamp, || {
        format!("{} needs a non-revocation timestamp", referent)
    })?;
    c.require(
        "non_revoked_interval",
        interval.to.map_or(true, |to| timestamp <= to),
        || format!("{} is proven at {}, after the requested interval", referent, timestamp),
    )
}

fn check_sub_proof(
    c: &mut Checks,
    index: usize,
    sub: &SubProof,
    id: &Identifier,
    blinded_ms: &str,
    ledger: &LedgerView<'_>,
) -> Result<(), Failed> {
    let schema = c.found("ledger_objects", ledger.schemas.get(&id.schema_id), || {
        format!("schema {} not provided", id.schema_id)
    })?;
    let cred_def = c.found("ledger_objects", ledger.cred_defs.get(&id.cred_def_id), || {
        format!("credential definition {} not provided", id.cred_def_id)
    })?;
    c.require(
        "schema_binding",
        schema.seq_no.map(|s| s.to_string()).as_deref() == Some(cred_def.schema_id.as_str()),
        || format!("{} is not built on {}", cred_def.id, schema.id),
    )?;
    c.require("attributes_present", !sub.attributes.is_empty(), || {
        format!("sub-proof {} discloses nothing", index)
    })?;

    let binding = match (&sub.revocation, &id.rev_reg_id) {
        (Some(r), Some(rev_reg_id)) => Some(RevocationBinding {
            rev_reg_id: rev_reg_id.clone(),
            cred_rev_id: r.cred_rev_id,
            leaf: r.leaf.clone(),
        }),
        (None, None) => None,
        _ => {
            return c.require("revocation_binding", false, || {
                format!("sub-proof {} revocation data disagrees with its identifier", index)
            })
        }
    };

    let issuer_key = PublicKey::from_verkey(&cred_def.value.primary.verkey).ok();
    let issuer_key = c.found("attribute_signatures", issuer_key, || {
        format!("{} has an unusable key", cred_def.id)
    })?;
    for (name, attr) in &sub.attributes {
        let valid = attribute_message(
            &id.cred_def_id,
            &id.schema_id,
            blinded_ms,
            binding.as_ref(),
            name,
            &attr.raw_digest,
            &attr.encoded,
        )
        .ok()
        .zip(Signature::from_bs58(&attr.signature).ok())
        .is_some_and(|(message, signature)| verify(&message, &signature, &issuer_key).is_ok());
        c.require("attribute_signatures", valid, || {
            format!("signature on {} in sub-proof {} does not verify", name, index)
        })?;
    }

    if let Some(timestamp) = id.timestamp {
        let (binding, witness) = c.found(
            "non_revocation",
            binding
                .as_ref()
                .zip(sub.revocation.as_ref().and_then(|r| r.witness.as_ref())),
            || format!("sub-proof {} has a timestamp but no witness", index),
        )?;
        let def = c.found(
            "non_revocation",
            ledger.rev_reg_defs.get(&binding.rev_reg_id),
            || format!("registry definition {} not provided", binding.rev_reg_id),
        )?;
        c.require("non_revocation", def.cred_def_id == id.cred_def_id, || {
            format!("registry {} does not belong to {}", def.id, id.cred_def_id)
        })?;
        let accum = c.found(
            "non_revocation",
            ledger
                .rev_regs
                .get(&binding.rev_reg_id)
                .and_then(|by_ts| by_ts.get(&timestamp)),
            || format!("no registry state for {} at {}", binding.rev_reg_id, timestamp),
        )?;
        let path: Option<Vec<MerkleStep>> = witness
            .iter()
            .map(|step| MerkleStep::try_from(step).ok())
            .collect();
        let included = decode_accum(&binding.leaf)
            .ok()
            .zip(decode_accum(&accum.value.accum).ok())
            .zip(path)
            .is_some_and(|((leaf, root), path)| verify_merkle_path(&leaf, &path, &root));
        c.require("non_revocation", included, || {
            format!(
                "credential {} of {} is not in the accumulator at {}",
                binding.cred_rev_id, binding.rev_reg_id, timestamp
            )
        })?;
    }
    Ok(())
}
