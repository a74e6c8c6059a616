//! Proof requests, the holder's credential selection, and proofs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use verinym_core::Did;

use crate::credential::CredentialInfo;
use crate::error::{SdkError, SdkResult};
use crate::revocation::WitnessStep;
use crate::types::{issuer_of, parse_schema_id, CredDefId, CredRevId, RevRegId, SchemaId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    pub nonce: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

impl ProofRequest {
    pub fn validate(&self) -> SdkResult<()> {
        if self.nonce.is_empty() || !self.nonce.chars().all(|c| c.is_ascii_digit()) {
            return Err(SdkError::invalid_structure(format!(
                "proof request nonce {:?} is not decimal",
                self.nonce
            )));
        }
        if self.requested_attributes.is_empty() && self.requested_predicates.is_empty() {
            return Err(SdkError::invalid_structure("proof request asks for nothing"));
        }
        if let Some(dup) = self
            .requested_attributes
            .keys()
            .find(|k| self.requested_predicates.contains_key(*k))
        {
            return Err(SdkError::invalid_structure(format!(
                "referent {} names both an attribute and a predicate",
                dup
            )));
        }
        Ok(())
    }

    /// Interval for an attribute referent, falling back to the request-level one.
    pub fn attribute_interval(&self, referent: &str) -> Option<NonRevokedInterval> {
        self.requested_attributes
            .get(referent)
            .and_then(|a| a.non_revoked)
            .or(self.non_revoked)
    }

    pub fn predicate_interval(&self, referent: &str) -> Option<NonRevokedInterval> {
        self.requested_predicates
            .get(referent)
            .and_then(|p| p.non_revoked)
            .or(self.non_revoked)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<Restriction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateInfo {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<Vec<Restriction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_revoked: Option<NonRevokedInterval>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateType {
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "<")]
    Less,
}

impl PredicateType {
    pub fn holds(&self, value: i64, threshold: i64) -> bool {
        match self {
            Self::GreaterOrEqual => value >= threshold,
            Self::Greater => value > threshold,
            Self::LessOrEqual => value <= threshold,
            Self::Less => value < threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NonRevokedInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
}

impl NonRevokedInterval {
    pub fn to(to: i64) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.from.map_or(true, |f| timestamp >= f) && self.to.map_or(true, |t| timestamp <= t)
    }
}

/// One acceptable source for a referent; every field that is set must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Restriction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<SchemaId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_issuer_did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_def_id: Option<CredDefId>,
}

impl Restriction {
    pub fn cred_def(cred_def_id: impl Into<String>) -> Self {
        Self {
            cred_def_id: Some(cred_def_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, source: &CredentialSource) -> bool {
        fn field(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }
        field(&self.schema_id, &source.schema_id)
            && field(&self.schema_issuer_did, source.schema_issuer_did.as_str())
            && field(&self.schema_name, &source.schema_name)
            && field(&self.schema_version, &source.schema_version)
            && field(&self.issuer_did, source.issuer_did.as_str())
            && field(&self.cred_def_id, &source.cred_def_id)
    }
}

/// Identifying facts about where a credential came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    pub schema_id: SchemaId,
    pub schema_issuer_did: Did,
    pub schema_name: String,
    pub schema_version: String,
    pub issuer_did: Did,
    pub cred_def_id: CredDefId,
}

impl CredentialSource {
    pub fn new(schema_id: &str, cred_def_id: &str) -> SdkResult<Self> {
        let schema = parse_schema_id(schema_id)?;
        Ok(Self {
            schema_id: schema_id.to_string(),
            schema_issuer_did: schema.issuer_did,
            schema_name: schema.name,
            schema_version: schema.version,
            issuer_did: issuer_of(cred_def_id)?,
            cred_def_id: cred_def_id.to_string(),
        })
    }
}

/// No restrictions, or any one restriction matching.
pub fn restrictions_match(restrictions: Option<&[Restriction]>, source: &CredentialSource) -> bool {
    match restrictions {
        None => true,
        Some([]) => true,
        Some(list) => list.iter().any(|r| r.matches(source)),
    }
}

/// A search candidate for one referent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedCredential {
    pub cred_info: CredentialInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<NonRevokedInterval>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RequestedCredentials {
    #[serde(default)]
    pub self_attested_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,
    #[serde(default)]
    pub requested_predicates: BTreeMap<String, RequestedPredicate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    pub cred_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub revealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPredicate {
    pub cred_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub proof: ProofBody,
    pub requested_proof: RequestedProof,
    pub identifiers: Vec<Identifier>,
}

impl Proof {
    pub fn revealed(&self, referent: &str) -> Option<&RevealedAttribute> {
        self.requested_proof.revealed_attrs.get(referent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBody {
    pub nonce: String,
    /// Master-secret commitment every sub-proof was signed over.
    pub blinded_ms: String,
    pub sub_proofs: Vec<SubProof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProof {
    /// Signed encoded values, keyed by attribute name.
    pub attributes: BTreeMap<String, DisclosedAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<NonRevocationProof>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedAttribute {
    pub raw_digest: String,
    pub encoded: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonRevocationProof {
    pub cred_rev_id: CredRevId,
    pub leaf: String,
    /// Inclusion path to the accumulator at the identifier's timestamp;
    /// absent when no interval was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Vec<WitnessStep>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RequestedProof {
    #[serde(default)]
    pub revealed_attrs: BTreeMap<String, RevealedAttribute>,
    #[serde(default)]
    pub unrevealed_attrs: BTreeMap<String, SubProofReferent>,
    #[serde(default)]
    pub self_attested_attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub predicates: BTreeMap<String, SubProofReferent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAttribute {
    pub sub_proof_index: usize,
    pub raw: String,
    pub encoded: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProofReferent {
    pub sub_proof_index: usize,
}

/// Ledger objects a sub-proof is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevRegId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
