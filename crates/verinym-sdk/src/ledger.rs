//! Ledger transactions: request builders, the signed envelope, and typed
//! parsers for read replies.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use verinym_core::{Did, Role, Verkey};

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::types::{
    CredDefId, CredentialDefinition, RevRegId, RevocationRegistry, RevocationRegistryDefinition,
    RevocationRegistryDelta, Schema, SchemaId, REVOC_DEF_TYPE_CL_ACCUM,
};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

fn next_req_id() -> u64 {
    NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed)
}

/// A read or write transaction addressed to the pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRequest {
    pub req_id: u64,
    /// Submitter DID.
    pub identifier: Did,
    /// Stamped by the backend at submission.
    pub protocol_version: u32,
    pub operation: LedgerOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl LedgerRequest {
    fn new(submitter: &Did, operation: LedgerOperation) -> Self {
        Self {
            req_id: next_req_id(),
            identifier: submitter.clone(),
            protocol_version: 0,
            operation,
            signature: None,
        }
    }

    /// Bytes covered by the submitter's signature.
    pub fn signing_payload(&self) -> SdkResult<Vec<u8>> {
        let unsigned = Self {
            signature: None,
            ..self.clone()
        };
        Ok(serde_json::to_vec(&unsigned)?)
    }
}

/// Transaction body, tagged with the ledger's numeric type codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerOperation {
    #[serde(rename = "1")]
    Nym {
        dest: Did,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verkey: Option<Verkey>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
    },
    #[serde(rename = "105")]
    GetNym { dest: Did },
    #[serde(rename = "101")]
    Schema { data: Schema },
    #[serde(rename = "107")]
    GetSchema { id: SchemaId },
    #[serde(rename = "102")]
    CredDef { data: CredentialDefinition },
    #[serde(rename = "108")]
    GetCredDef { id: CredDefId },
    #[serde(rename = "113")]
    RevocRegDef { data: RevocationRegistryDefinition },
    #[serde(rename = "115")]
    GetRevocRegDef { id: RevRegId },
    #[serde(rename = "114", rename_all = "camelCase")]
    RevocRegEntry {
        revoc_reg_def_id: RevRegId,
        revoc_def_type: String,
        value: RevocationRegistryDelta,
    },
    #[serde(rename = "116", rename_all = "camelCase")]
    GetRevocReg {
        revoc_reg_def_id: RevRegId,
        timestamp: i64,
    },
    #[serde(rename = "117", rename_all = "camelCase")]
    GetRevocRegDelta {
        revoc_reg_def_id: RevRegId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<i64>,
        to: i64,
    },
}

impl LedgerOperation {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Nym { .. }
                | Self::Schema { .. }
                | Self::CredDef { .. }
                | Self::RevocRegDef { .. }
                | Self::RevocRegEntry { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nym { .. } => "NYM",
            Self::GetNym { .. } => "GET_NYM",
            Self::Schema { .. } => "SCHEMA",
            Self::GetSchema { .. } => "GET_SCHEMA",
            Self::CredDef { .. } => "CRED_DEF",
            Self::GetCredDef { .. } => "GET_CRED_DEF",
            Self::RevocRegDef { .. } => "REVOC_REG_DEF",
            Self::GetRevocRegDef { .. } => "GET_REVOC_REG_DEF",
            Self::RevocRegEntry { .. } => "REVOC_REG_ENTRY",
            Self::GetRevocReg { .. } => "GET_REVOC_REG",
            Self::GetRevocRegDelta { .. } => "GET_REVOC_REG_DELTA",
        }
    }
}

/// Pool acknowledgement. Rejected writes surface as errors instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReply {
    pub req_id: u64,
    #[serde(rename = "type")]
    pub txn_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_time: Option<i64>,
    /// Requested object, or null when the ledger has nothing under the key.
    pub data: serde_json::Value,
}

/// NYM record as returned by GET_NYM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NymData {
    pub dest: Did,
    pub identifier: Option<Did>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verkey: Option<Verkey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Registry read reply payload: the object plus the ledger time it is valid at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocRegReplyData<T> {
    pub revoc_reg_def_id: RevRegId,
    pub value: T,
    pub timestamp: i64,
}

pub fn build_nym_request(
    submitter: &Did,
    dest: &Did,
    verkey: Option<&Verkey>,
    alias: Option<&str>,
    role: Option<Role>,
) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::Nym {
            dest: dest.clone(),
            verkey: verkey.cloned(),
            alias: alias.map(str::to_string),
            role,
        },
    ))
}

pub fn build_get_nym_request(submitter: &Did, dest: &Did) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::GetNym { dest: dest.clone() },
    ))
}

pub fn build_schema_request(submitter: &Did, schema: &Schema) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::Schema {
            data: schema.clone(),
        },
    ))
}

pub fn build_get_schema_request(submitter: &Did, id: &str) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::GetSchema { id: id.to_string() },
    ))
}

pub fn build_cred_def_request(
    submitter: &Did,
    cred_def: &CredentialDefinition,
) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::CredDef {
            data: cred_def.clone(),
        },
    ))
}

pub fn build_get_cred_def_request(submitter: &Did, id: &str) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::GetCredDef { id: id.to_string() },
    ))
}

pub fn build_revoc_reg_def_request(
    submitter: &Did,
    def: &RevocationRegistryDefinition,
) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::RevocRegDef { data: def.clone() },
    ))
}

pub fn build_get_revoc_reg_def_request(submitter: &Did, id: &str) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::GetRevocRegDef { id: id.to_string() },
    ))
}

pub fn build_revoc_reg_entry_request(
    submitter: &Did,
    rev_reg_id: &str,
    revoc_def_type: &str,
    delta: &RevocationRegistryDelta,
) -> SdkResult<LedgerRequest> {
    if revoc_def_type != REVOC_DEF_TYPE_CL_ACCUM {
        return Err(SdkError::invalid_structure(format!(
            "unsupported revocation type {}",
            revoc_def_type
        )));
    }
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::RevocRegEntry {
            revoc_reg_def_id: rev_reg_id.to_string(),
            revoc_def_type: revoc_def_type.to_string(),
            value: delta.clone(),
        },
    ))
}

pub fn build_get_revoc_reg_request(
    submitter: &Did,
    rev_reg_id: &str,
    timestamp: i64,
) -> SdkResult<LedgerRequest> {
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::GetRevocReg {
            revoc_reg_def_id: rev_reg_id.to_string(),
            timestamp,
        },
    ))
}

pub fn build_get_revoc_reg_delta_request(
    submitter: &Did,
    rev_reg_id: &str,
    from: Option<i64>,
    to: i64,
) -> SdkResult<LedgerRequest> {
    if let Some(from) = from {
        if from > to {
            return Err(SdkError::invalid_structure(format!(
                "delta interval starts after it ends ({} > {})",
                from, to
            )));
        }
    }
    Ok(LedgerRequest::new(
        submitter,
        LedgerOperation::GetRevocRegDelta {
            revoc_reg_def_id: rev_reg_id.to_string(),
            from,
            to,
        },
    ))
}

fn reply_data<T: DeserializeOwned>(reply: &LedgerReply, what: &str) -> SdkResult<T> {
    if reply.data.is_null() {
        return Err(SdkError::new(
            ErrorCode::LedgerNotFound,
            format!("{} not found on ledger", what),
        ));
    }
    serde_json::from_value(reply.data.clone())
        .map_err(|e| SdkError::invalid_structure(format!("malformed {} reply: {}", what, e)))
}

pub fn parse_get_nym_response(reply: &LedgerReply) -> SdkResult<NymData> {
    reply_data(reply, "nym")
}

pub fn parse_get_schema_response(reply: &LedgerReply) -> SdkResult<(SchemaId, Schema)> {
    let schema: Schema = reply_data(reply, "schema")?;
    Ok((schema.id.clone(), schema))
}

pub fn parse_get_cred_def_response(
    reply: &LedgerReply,
) -> SdkResult<(CredDefId, CredentialDefinition)> {
    let cred_def: CredentialDefinition = reply_data(reply, "credential definition")?;
    Ok((cred_def.id.clone(), cred_def))
}

pub fn parse_get_revoc_reg_def_response(
    reply: &LedgerReply,
) -> SdkResult<(RevRegId, RevocationRegistryDefinition)> {
    let def: RevocationRegistryDefinition = reply_data(reply, "revocation registry definition")?;
    Ok((def.id.clone(), def))
}

pub fn parse_get_revoc_reg_response(
    reply: &LedgerReply,
) -> SdkResult<(RevRegId, RevocationRegistry, i64)> {
    let data: RevocRegReplyData<RevocationRegistry> = reply_data(reply, "revocation registry")?;
    Ok((data.revoc_reg_def_id, data.value, data.timestamp))
}

pub fn parse_get_revoc_reg_delta_response(
    reply: &LedgerReply,
) -> SdkResult<(RevRegId, RevocationRegistryDelta, i64)> {
    let data: RevocRegReplyData<RevocationRegistryDelta> =
        reply_data(reply, "revocation registry delta")?;
    Ok((data.revoc_reg_def_id, data.value, data.timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn did(b: u8) -> Did {
        Did::from_verkey_bytes(&[b; 32])
    }

    #[test]
    fn test_nym_request_wire_form() {
        let req = build_nym_request(&did(1), &did(2), None, None, Some(Role::TrustAnchor)).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["operation"]["type"], "1");
        assert_eq!(json["operation"]["role"], "TRUST_ANCHOR");
        assert!(json["operation"].get("verkey").is_none());
        assert!(json.get("signature").is_none());
        assert!(req.operation.is_write());
    }

    #[test]
    fn test_request_ids_increase() {
        let a = build_get_nym_request(&did(1), &did(2)).unwrap();
        let b = build_get_nym_request(&did(1), &did(2)).unwrap();
        assert!(b.req_id > a.req_id);
        assert!(!a.operation.is_write());
    }

    #[test]
    fn test_signing_payload_ignores_signature() {
        let mut req = build_get_schema_request(&did(1), "x:2:y:1.0").unwrap();
        let before = req.signing_payload().unwrap();
        req.signature = Some("sig".into());
        assert_eq!(before, req.signing_payload().unwrap());
    }

    #[test]
    fn test_delta_request_rejects_inverted_interval() {
        assert!(build_get_revoc_reg_delta_request(&did(1), "r", Some(10), 5).is_err());
        assert!(build_get_revoc_reg_delta_request(&did(1), "r", None, 5).is_ok());
    }

    #[test]
    fn test_entry_request_rejects_unknown_type() {
        let delta = RevocationRegistryDelta::new(None, "00".into(), Default::default(), Default::default());
        assert!(build_revoc_reg_entry_request(&did(1), "r", "OTHER", &delta).is_err());
    }

    #[test]
    fn test_parse_null_is_not_found() {
        let reply = LedgerReply {
            req_id: 1,
            txn_type: "107".into(),
            seq_no: None,
            txn_time: None,
            data: serde_json::Value::Null,
        };
        let err = parse_get_schema_response(&reply).unwrap_err();
        assert_eq!(err.code, ErrorCode::LedgerNotFound);
    }

    #[test]
    fn test_parse_delta_reply() {
        let delta = RevocationRegistryDelta::new(None, "ab".into(), [1].into_iter().collect(), Default::default());
        let data = RevocRegReplyData {
            revoc_reg_def_id: "reg".to_string(),
            value: delta.clone(),
            timestamp: 42,
        };
        let reply = LedgerReply {
            req_id: 1,
            txn_type: "117".into(),
            seq_no: None,
            txn_time: Some(42),
            data: serde_json::to_value(&data).unwrap(),
        };
        let (id, parsed, ts) = parse_get_revoc_reg_delta_response(&reply).unwrap();
        assert_eq!(id, "reg");
        assert_eq!(parsed, delta);
        assert_eq!(ts, 42);
    }
}
