//! Ledger-anchored data model: schemas, credential definitions and
//! revocation registries, plus the identifier formats that name them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use verinym_core::{Did, Verkey};

use crate::error::{SdkError, SdkResult};

pub type SchemaId = String;
pub type CredDefId = String;
pub type RevRegId = String;
/// Index of a credential inside its revocation registry, starting at 1.
pub type CredRevId = u32;

pub const SCHEMA_MARKER: &str = "2";
pub const CRED_DEF_MARKER: &str = "3";
pub const REV_REG_MARKER: &str = "4";
pub const SIGNATURE_TYPE_CL: &str = "CL";
pub const REVOC_DEF_TYPE_CL_ACCUM: &str = "CL_ACCUM";
pub const DATA_VERSION: &str = "1.0";

/// `<issuer>:2:<name>:<version>`
pub fn schema_id(issuer: &Did, name: &str, version: &str) -> SchemaId {
    format!("{}:{}:{}:{}", issuer, SCHEMA_MARKER, name, version)
}

/// `<issuer>:3:CL:<schema seq_no>:<tag>`
pub fn cred_def_id(issuer: &Did, schema_seq_no: u64, signature_type: &str, tag: &str) -> CredDefId {
    format!(
        "{}:{}:{}:{}:{}",
        issuer, CRED_DEF_MARKER, signature_type, schema_seq_no, tag
    )
}

/// `<issuer>:4:<cred_def_id>:CL_ACCUM:<tag>`
pub fn rev_reg_id(issuer: &Did, cred_def_id: &str, tag: &str) -> RevRegId {
    format!(
        "{}:{}:{}:{}:{}",
        issuer, REV_REG_MARKER, cred_def_id, REVOC_DEF_TYPE_CL_ACCUM, tag
    )
}

/// The DID an identifier was published under.
pub fn issuer_of(id: &str) -> SdkResult<Did> {
    let prefix = id
        .split(':')
        .next()
        .ok_or_else(|| SdkError::invalid_structure(format!("empty identifier {}", id)))?;
    Ok(Did::new(prefix)?)
}

/// Components of a schema identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIdParts {
    pub issuer_did: Did,
    pub name: String,
    pub version: String,
}

pub fn parse_schema_id(id: &str) -> SdkResult<SchemaIdParts> {
    let parts: Vec<&str> = id.split(':').collect();
    match parts.as_slice() {
        [did, SCHEMA_MARKER, name, version] => Ok(SchemaIdParts {
            issuer_did: Did::new(*did)?,
            name: (*name).to_string(),
            version: (*version).to_string(),
        }),
        _ => Err(SdkError::invalid_structure(format!(
            "malformed schema id {}",
            id
        ))),
    }
}

/// Schema sequence number embedded in a credential definition id.
pub fn cred_def_schema_seq_no(id: &str) -> SdkResult<u64> {
    let parts: Vec<&str> = id.split(':').collect();
    match parts.as_slice() {
        [_, CRED_DEF_MARKER, _, seq_no, _] => seq_no.parse().map_err(|_| {
            SdkError::invalid_structure(format!("malformed schema reference in {}", id))
        }),
        _ => Err(SdkError::invalid_structure(format!(
            "malformed credential definition id {}",
            id
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub ver: String,
    pub id: SchemaId,
    pub name: String,
    pub version: String,
    pub attr_names: Vec<String>,
    /// Ledger sequence number, filled in once the schema is read back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<u64>,
}

impl Schema {
    /// Build an unpublished schema, dropping duplicate attribute names.
    pub fn new(issuer: &Did, name: &str, version: &str, attrs: &[String]) -> SdkResult<Self> {
        if name.is_empty() || version.is_empty() {
            return Err(SdkError::invalid_structure("schema name and version are required"));
        }
        if name.contains(':') || version.contains(':') {
            return Err(SdkError::invalid_structure("schema name and version may not contain ':'"));
        }
        let mut seen = BTreeSet::new();
        let attr_names: Vec<String> = attrs
            .iter()
            .filter(|a| seen.insert(attr_common_view(a)))
            .cloned()
            .collect();
        if attr_names.is_empty() {
            return Err(SdkError::invalid_structure("schema has no attributes"));
        }
        Ok(Self {
            ver: DATA_VERSION.into(),
            id: schema_id(issuer, name, version),
            name: name.into(),
            version: version.into(),
            attr_names,
            seq_no: None,
        })
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        let wanted = attr_common_view(name);
        self.attr_names.iter().any(|a| attr_common_view(a) == wanted)
    }
}

/// Attribute names compare case-insensitively and ignoring spaces.
pub fn attr_common_view(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CredentialDefinitionConfig {
    #[serde(default)]
    pub support_revocation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDefinition {
    pub ver: String,
    pub id: CredDefId,
    /// Sequence number of the schema, as a string.
    pub schema_id: String,
    #[serde(rename = "type")]
    pub signature_type: String,
    pub tag: String,
    pub value: CredentialDefinitionValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDefinitionValue {
    pub primary: PrimaryPublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationPublicKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryPublicKey {
    /// Key the issuer signs attribute values with.
    pub verkey: Verkey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationPublicKey {
    pub accumulator: String,
}

impl CredentialDefinition {
    pub fn supports_revocation(&self) -> bool {
        self.value.revocation.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuanceType {
    /// Revocation ids are marked issued as credentials are created.
    #[default]
    IssuanceOnDemand,
    /// Every revocation id starts out issued.
    IssuanceByDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistryConfig {
    #[serde(default)]
    pub issuance_type: IssuanceType,
    pub max_cred_num: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDefinition {
    pub ver: String,
    pub id: RevRegId,
    pub revoc_def_type: String,
    pub tag: String,
    pub cred_def_id: CredDefId,
    pub value: RevocationRegistryDefinitionValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDefinitionValue {
    pub issuance_type: IssuanceType,
    pub max_cred_num: u32,
    pub tails_hash: String,
    pub tails_location: String,
}

/// Change to a registry's accumulator. With `prev_accum` absent the delta
/// is cumulative from the registry's creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistryDelta {
    pub ver: String,
    pub value: RevocationRegistryDeltaValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDeltaValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_accum: Option<String>,
    pub accum: String,
    #[serde(default)]
    pub issued: BTreeSet<CredRevId>,
    #[serde(default)]
    pub revoked: BTreeSet<CredRevId>,
}

impl RevocationRegistryDelta {
    pub fn new(
        prev_accum: Option<String>,
        accum: String,
        issued: BTreeSet<CredRevId>,
        revoked: BTreeSet<CredRevId>,
    ) -> Self {
        Self {
            ver: DATA_VERSION.into(),
            value: RevocationRegistryDeltaValue {
                prev_accum,
                accum,
                issued,
                revoked,
            },
        }
    }

    pub fn accum(&self) -> &str {
        &self.value.accum
    }
}

/// Accumulator value of a registry at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistry {
    pub ver: String,
    pub value: RevocationRegistryValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRegistryValue {
    pub accum: String,
}

impl RevocationRegistry {
    pub fn new(accum: String) -> Self {
        Self {
            ver: DATA_VERSION.into(),
            value: RevocationRegistryValue { accum },
        }
    }
}
