//! Messages exchanged while issuing a credential, and the stored result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use verinym_core::Did;
use verinym_crypto::encode_attribute;

use crate::error::{SdkError, SdkResult};
use crate::revocation::WitnessStep;
use crate::types::{attr_common_view, CredDefId, CredRevId, RevRegId, SchemaId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOffer {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    pub nonce: String,
    /// Issuer's signature over the offer nonce with the credential
    /// definition key.
    pub key_correctness_proof: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub prover_did: Did,
    pub cred_def_id: CredDefId,
    /// Commitment to the holder's master secret.
    pub blinded_ms: String,
    /// Binds `blinded_ms` to the offer nonce.
    pub blinded_ms_correctness_proof: String,
    pub nonce: String,
}

/// Holder-side data needed to store the credential once it arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequestMetadata {
    pub master_secret_name: String,
    pub blinded_ms: String,
    pub nonce: String,
}

/// One attribute in raw and encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub raw: String,
    pub encoded: String,
}

impl AttributeValue {
    /// Attribute with the default encoding of `raw`.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let encoded = encode_attribute(&raw);
        Self { raw, encoded }
    }

    /// Attribute with an explicitly chosen encoding.
    pub fn with_encoding(raw: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            encoded: encoded.into(),
        }
    }

    /// Integer view of the encoded value, used by predicates.
    pub fn encoded_as_int(&self) -> Option<i64> {
        self.encoded.parse().ok()
    }
}

pub type CredentialValues = BTreeMap<String, AttributeValue>;

/// Digest of a raw value; the issuer signs this so revealed raw values can
/// be checked without disclosing undisclosed ones.
pub fn raw_digest(raw: &str) -> String {
    hex::encode(blake3::hash(raw.as_bytes()).as_bytes())
}

/// Revocation slot a credential occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationBinding {
    pub rev_reg_id: RevRegId,
    pub cred_rev_id: CredRevId,
    /// Hex tails entry of `cred_rev_id`.
    pub leaf: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSignature {
    pub raw_digest: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSignature {
    pub blinded_ms: String,
    pub attributes: BTreeMap<String, AttributeSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevRegId>,
    pub values: CredentialValues,
    pub signature: CredentialSignature,
}

impl Credential {
    pub fn value(&self, name: &str) -> Option<&AttributeValue> {
        let wanted = attr_common_view(name);
        self.values
            .iter()
            .find(|(k, _)| attr_common_view(k) == wanted)
            .map(|(_, v)| v)
    }

    pub fn cred_rev_id(&self) -> Option<CredRevId> {
        self.signature.revocation.as_ref().map(|r| r.cred_rev_id)
    }
}

#[derive(Serialize)]
struct SignedAttribute<'a> {
    cred_def_id: &'a str,
    schema_id: &'a str,
    blinded_ms: &'a str,
    revocation: Option<&'a RevocationBinding>,
    name: String,
    raw_digest: &'a str,
    encoded: &'a str,
}

/// Canonical bytes the issuer signs for one attribute.
pub fn attribute_message(
    cred_def_id: &str,
    schema_id: &str,
    blinded_ms: &str,
    revocation: Option<&RevocationBinding>,
    name: &str,
    raw_digest: &str,
    encoded: &str,
) -> SdkResult<Vec<u8>> {
    serde_json::to_vec(&SignedAttribute {
        cred_def_id,
        schema_id,
        blinded_ms,
        revocation,
        name: attr_common_view(name),
        raw_digest,
        encoded,
    })
    .map_err(SdkError::from)
}

/// Summary of a stored credential returned by searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    pub referent: String,
    pub attrs: BTreeMap<String, String>,
    pub schema_id: SchemaId,
    pub cred_def_id: CredDefId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev_reg_id: Option<RevRegId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_rev_id: Option<CredRevId>,
}

impl CredentialInfo {
    pub fn from_credential(referent: &str, credential: &Credential) -> Self {
        Self {
            referent: referent.to_string(),
            attrs: credential
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.raw.clone()))
                .collect(),
            schema_id: credential.schema_id.clone(),
            cred_def_id: credential.cred_def_id.clone(),
            rev_reg_id: credential.rev_reg_id.clone(),
            cred_rev_id: credential.cred_rev_id(),
        }
    }
}

/// Holder's witness that a credential was unrevoked at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationState {
    pub rev_reg_id: RevRegId,
    pub cred_rev_id: CredRevId,
    pub timestamp: i64,
    pub accum: String,
    pub leaf: String,
    pub witness: Vec<WitnessStep>,
}

/// Revocation states by registry id, then ledger timestamp, then the
/// credential's index in the registry.
pub type RevocationStates =
    BTreeMap<RevRegId, BTreeMap<i64, BTreeMap<CredRevId, RevocationState>>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_default_encoding() {
        let v = AttributeValue::new("2015");
        assert_eq!(v.encoded, "2015");
        assert_eq!(v.encoded_as_int(), Some(2015));
        let v = AttributeValue::new("graduated");
        assert_ne!(v.encoded, "graduated");
    }

    #[test]
    fn test_attribute_message_normalizes_name() {
        let a = attribute_message("cd", "s", "ms", None, "First Name", "d", "1").unwrap();
        let b = attribute_message("cd", "s", "ms", None, "firstname", "d", "1").unwrap();
        assert_eq!(a, b);
        let c = attribute_message("cd", "s", "ms", None, "firstname", "d", "2").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_raw_digest_differs_per_value() {
        assert_ne!(raw_digest("Alice"), raw_digest("Bob"));
        assert_eq!(raw_digest("Alice").len(), 64);
    }
}
