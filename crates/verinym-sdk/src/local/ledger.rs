//! In-process ledger state behind `LocalBackend` pools.

use std::collections::{BTreeSet, HashMap};

use verinym_core::{Did, Role, Verkey};
use verinym_crypto::{verify, PublicKey, Signature};

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::genesis::GenesisTxn;
use crate::ledger::{LedgerOperation, LedgerReply, LedgerRequest, NymData, RevocRegReplyData};
use crate::types::{
    cred_def_id, cred_def_schema_seq_no, issuer_of, rev_reg_id, schema_id, CredDefId, CredRevId,
    CredentialDefinition, RevRegId, RevocationRegistry, RevocationRegistryDefinition,
    RevocationRegistryDelta, Schema, SchemaId, REVOC_DEF_TYPE_CL_ACCUM,
};

#[derive(Debug, Clone)]
struct NymEntry {
    verkey: Option<Verkey>,
    role: Option<Role>,
    identifier: Option<Did>,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    txn_time: i64,
    delta: RevocationRegistryDelta,
}

/// Registry state folded from its entries up to some time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegistryState {
    pub accum: String,
    pub issued: BTreeSet<CredRevId>,
    pub revoked: BTreeSet<CredRevId>,
    pub timestamp: i64,
}

fn unauthorized(message: impl Into<String>) -> SdkError {
    SdkError::new(ErrorCode::LedgerUnauthorized, message)
}

fn rejected(message: impl Into<String>) -> SdkError {
    SdkError::new(ErrorCode::LedgerInvalidTransaction, message)
}

#[derive(Debug, Default)]
pub(crate) struct LocalLedger {
    seq_no: u64,
    last_txn_time: i64,
    nyms: HashMap<Did, NymEntry>,
    schemas: HashMap<SchemaId, Schema>,
    schemas_by_seq_no: HashMap<u64, SchemaId>,
    cred_defs: HashMap<CredDefId, CredentialDefinition>,
    rev_reg_defs: HashMap<RevRegId, RevocationRegistryDefinition>,
    rev_reg_entries: HashMap<RevRegId, Vec<RegistryEntry>>,
}

impl LocalLedger {
    pub(crate) fn from_genesis(txns: &[GenesisTxn]) -> Self {
        let mut ledger = Self::default();
        for txn in txns {
            ledger.seq_no += 1;
            ledger.nyms.insert(
                txn.dest.clone(),
                NymEntry {
                    verkey: Some(txn.verkey.clone()),
                    role: txn.role,
                    identifier: None,
                },
            );
        }
        ledger
    }

    /// Apply a write or answer a read. Rejected writes are errors.
    pub(crate) fn submit(
        &mut self,
        request: &LedgerRequest,
        pool_version: u32,
        now: i64,
    ) -> SdkResult<LedgerReply> {
        if request.protocol_version != pool_version {
            return Err(SdkError::new(
                ErrorCode::PoolIncompatibleProtocolVersion,
                format!(
                    "request uses protocol version {}, pool speaks {}",
                    request.protocol_version, pool_version
                ),
            ));
        }
        if request.operation.is_write() {
            let role = self.authorize(request)?;
            let txn_time = now.max(self.last_txn_time);
            let reply = self.write(request, role, txn_time)?;
            self.last_txn_time = txn_time;
            tracing::debug!(
                txn = request.operation.name(),
                submitter = %request.identifier,
                seq_no = ?reply.seq_no,
                "ledger write accepted"
            );
            Ok(reply)
        } else {
            self.read(request)
        }
    }

    fn authorize(&self, request: &LedgerRequest) -> SdkResult<Option<Role>> {
        let submitter = self.nyms.get(&request.identifier).ok_or_else(|| {
            unauthorized(format!("submitter {} is not on the ledger", request.identifier))
        })?;
        let verkey = submitter.verkey.as_ref().ok_or_else(|| {
            unauthorized(format!("submitter {} has no verkey", request.identifier))
        })?;
        let signature = request
            .signature
            .as_deref()
            .ok_or_else(|| unauthorized("write request is not signed"))?;
        let signature = Signature::from_bs58(signature)
            .map_err(|e| unauthorized(format!("malformed signature: {}", e)))?;
        let public_key = PublicKey::from_verkey(verkey)?;
        verify(&request.signing_payload()?, &signature, &public_key).map_err(|_| {
            unauthorized(format!(
                "signature does not match verkey of {}",
                request.identifier
            ))
        })?;
        Ok(submitter.role)
    }

    fn next_seq_no(&mut self) -> u64 {
        self.seq_no += 1;
        self.seq_no
    }

    fn write(
        &mut self,
        request: &LedgerRequest,
        role: Option<Role>,
        txn_time: i64,
    ) -> SdkResult<LedgerReply> {
        let submitter = &request.identifier;
        let data = match &request.operation {
            LedgerOperation::Nym {
                dest,
                verkey,
                alias: _,
                role: new_role,
            } => {
                let submitter_role = role
                    .filter(Role::can_write_nym)
                    .ok_or_else(|| unauthorized(format!("{} may not write NYMs", submitter)))?;
                if let Some(target) = new_role {
                    if !submitter_role.can_assign(*target) {
                        return Err(unauthorized(format!(
                            "{} may not grant {}",
                            submitter_role, target
                        )));
                    }
                }
                match self.nyms.get_mut(dest) {
                    Some(existing) => {
                        let owner = dest == submitter || existing.identifier.as_ref() == Some(submitter);
                        if !owner {
                            return Err(unauthorized(format!(
                                "{} already exists and is not owned by {}",
                                dest, submitter
                            )));
                        }
                        if verkey.is_some() {
                            existing.verkey = verkey.clone();
                        }
                        if new_role.is_some() {
                            existing.role = *new_role;
                        }
                    }
                    None => {
                        let verkey = verkey
                            .clone()
                            .ok_or_else(|| rejected(format!("new NYM {} has no verkey", dest)))?;
                        self.nyms.insert(
                            dest.clone(),
                            NymEntry {
                                verkey: Some(verkey),
                                role: *new_role,
                                identifier: Some(submitter.clone()),
                            },
                        );
                    }
                }
                serde_json::to_value(&request.operation)?
            }
            LedgerOperation::Schema { data } => {
                Self::require_publisher(role, submitter)?;
                if data.id != schema_id(submitter, &data.name, &data.version) {
                    return Err(rejected(format!(
                        "schema id {} does not belong to {}",
                        data.id, submitter
                    )));
                }
                if data.attr_names.is_empty() {
                    return Err(rejected("schema has no attributes"));
                }
                if self.schemas.contains_key(&data.id) {
                    return Err(rejected(format!("schema {} already exists", data.id)));
                }
                let seq_no = self.seq_no + 1;
                let stored = Schema {
                    seq_no: Some(seq_no),
                    ..data.clone()
                };
                self.schemas_by_seq_no.insert(seq_no, stored.id.clone());
                self.schemas.insert(stored.id.clone(), stored.clone());
                serde_json::to_value(&stored)?
            }
            LedgerOperation::CredDef { data } => {
                Self::require_publisher(role, submitter)?;
                let seq_no = cred_def_schema_seq_no(&data.id)?;
                if data.schema_id != seq_no.to_string() || !self.schemas_by_seq_no.contains_key(&seq_no) {
                    return Err(rejected(format!(
                        "credential definition {} references unknown schema {}",
                        data.id, data.schema_id
                    )));
                }
                if data.id != cred_def_id(submitter, seq_no, &data.signature_type, &data.tag) {
                    return Err(rejected(format!(
                        "credential definition id {} does not belong to {}",
                        data.id, submitter
                    )));
                }
                if self.cred_defs.contains_key(&data.id) {
                    return Err(rejected(format!(
                        "credential definition {} already exists",
                        data.id
                    )));
                }
                self.cred_defs.insert(data.id.clone(), data.clone());
                serde_json::to_value(data)?
            }
            LedgerOperation::RevocRegDef { data } => {
                Self::require_publisher(role, submitter)?;
                let cred_def = self.cred_defs.get(&data.cred_def_id).ok_or_else(|| {
                    rejected(format!("unknown credential definition {}", data.cred_def_id))
                })?;
                if issuer_of(&cred_def.id)? != *submitter {
                    return Err(unauthorized(format!(
                        "{} does not own {}",
                        submitter, cred_def.id
                    )));
                }
                if !cred_def.supports_revocation() {
                    return Err(rejected(format!("{} does not support revocation", cred_def.id)));
                }
                if data.id != rev_reg_id(submitter, &data.cred_def_id, &data.tag) {
                    return Err(rejected(format!("revocation registry id {} is malformed", data.id)));
                }
                if self.rev_reg_defs.contains_key(&data.id) {
                    return Err(rejected(format!("revocation registry {} already exists", data.id)));
                }
                self.rev_reg_defs.insert(data.id.clone(), data.clone());
                serde_json::to_value(data)?
            }
            LedgerOperation::RevocRegEntry {
                revoc_reg_def_id,
                revoc_def_type,
                value,
            } => {
                Self::require_publisher(role, submitter)?;
                self.check_registry_entry(submitter, revoc_reg_def_id, revoc_def_type, value)?;
                self.rev_reg_entries
                    .entry(revoc_reg_def_id.clone())
                    .or_default()
                    .push(RegistryEntry {
                        txn_time,
                        delta: value.clone(),
                    });
                serde_json::to_value(value)?
            }
            other => {
                return Err(SdkError::invalid_structure(format!(
                    "{} is not a write",
                    other.name()
                )))
            }
        };
        Ok(LedgerReply {
            req_id: request.req_id,
            txn_type: Self::type_code(&request.operation)?,
            seq_no: Some(self.next_seq_no()),
            txn_time: Some(txn_time),
            data,
        })
    }

    fn require_publisher(role: Option<Role>, submitter: &Did) -> SdkResult<()> {
        match role {
            Some(r) if r.can_publish_definitions() => Ok(()),
            _ => Err(unauthorized(format!(
                "{} may not publish definitions",
                submitter
            ))),
        }
    }

    fn check_registry_entry(
        &self,
        submitter: &Did,
        id: &str,
        revoc_def_type: &str,
        delta: &RevocationRegistryDelta,
    ) -> SdkResult<()> {
        let def = self
            .rev_reg_defs
            .get(id)
            .ok_or_else(|| rejected(format!("unknown revocation registry {}", id)))?;
        if issuer_of(id)? != *submitter {
            return Err(unauthorized(format!("{} does not own {}", submitter, id)));
        }
        if revoc_def_type != REVOC_DEF_TYPE_CL_ACCUM || def.revoc_def_type != revoc_def_type {
            return Err(rejected(format!("revocation type {} does not match", revoc_def_type)));
        }
        let max = def.value.max_cred_num;
        if let Some(bad) = delta
            .value
            .issued
            .iter()
            .chain(delta.value.revoked.iter())
            .find(|i| **i == 0 || **i > max)
        {
            return Err(rejected(format!("revocation index {} outside 1..={}", bad, max)));
        }
        let current = self
            .rev_reg_entries
            .get(id)
            .and_then(|entries| entries.last())
            .map(|e| e.delta.accum().to_string());
        if delta.value.prev_accum != current {
            return Err(rejected(format!(
                "entry for {} does not extend the current accumulator",
                id
            )));
        }
        Ok(())
    }

    fn type_code(operation: &LedgerOperation) -> SdkResult<String> {
        let value = serde_json::to_value(operation)?;
        value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SdkError::invalid_state("operation has no type code"))
    }

    fn read(&self, request: &LedgerRequest) -> SdkResult<LedgerReply> {
        let (data, seq_no, txn_time) = match &request.operation {
            LedgerOperation::GetNym { dest } => {
                let data = match self.nyms.get(dest) {
                    Some(entry) => serde_json::to_value(NymData {
                        dest: dest.clone(),
                        identifier: entry.identifier.clone(),
                        verkey: entry.verkey.clone(),
                        role: entry.role,
                    })?,
                    None => serde_json::Value::Null,
                };
                (data, None, None)
            }
            LedgerOperation::GetSchema { id } => match self.schemas.get(id) {
                Some(schema) => (serde_json::to_value(schema)?, schema.seq_no, None),
                None => (serde_json::Value::Null, None, None),
            },
            LedgerOperation::GetCredDef { id } => (
                self.cred_defs
                    .get(id)
                    .map(serde_json::to_value)
                    .transpose()?
                    .unwrap_or(serde_json::Value::Null),
                None,
                None,
            ),
            LedgerOperation::GetRevocRegDef { id } => (
                self.rev_reg_defs
                    .get(id)
                    .map(serde_json::to_value)
                    .transpose()?
                    .unwrap_or(serde_json::Value::Null),
                None,
                None,
            ),
            LedgerOperation::GetRevocReg {
                revoc_reg_def_id,
                timestamp,
            } => match self.registry_state(revoc_reg_def_id, *timestamp) {
                Some(state) => (
                    serde_json::to_value(RevocRegReplyData {
                        revoc_reg_def_id: revoc_reg_def_id.clone(),
                        value: RevocationRegistry::new(state.accum),
                        timestamp: state.timestamp,
                    })?,
                    None,
                    Some(state.timestamp),
                ),
                None => (serde_json::Value::Null, None, None),
            },
            LedgerOperation::GetRevocRegDelta {
                revoc_reg_def_id,
                from,
                to,
            } => match self.registry_delta(revoc_reg_def_id, *from, *to) {
                Some((delta, timestamp)) => (
                    serde_json::to_value(RevocRegReplyData {
                        revoc_reg_def_id: revoc_reg_def_id.clone(),
                        value: delta,
                        timestamp,
                    })?,
                    None,
                    Some(timestamp),
                ),
                None => (serde_json::Value::Null, None, None),
            },
            other => {
                return Err(SdkError::invalid_structure(format!(
                    "{} is not a read",
                    other.name()
                )))
            }
        };
        Ok(LedgerReply {
            req_id: request.req_id,
            txn_type: Self::type_code(&request.operation)?,
            seq_no,
            txn_time,
            data,
        })
    }

    /// State of a registry as of `timestamp`, if it had any entry by then.
    pub(crate) fn registry_state(&self, id: &str, timestamp: i64) -> Option<RegistryState> {
        let entries = self.rev_reg_entries.get(id)?;
        let mut state: Option<RegistryState> = None;
        for entry in entries.iter().take_while(|e| e.txn_time <= timestamp) {
            let s = state.get_or_insert_with(|| RegistryState {
                accum: String::new(),
                issued: BTreeSet::new(),
                revoked: BTreeSet::new(),
                timestamp: entry.txn_time,
            });
            for i in &entry.delta.value.issued {
                s.issued.insert(*i);
                s.revoked.remove(i);
            }
            for i in &entry.delta.value.revoked {
                s.revoked.insert(*i);
                s.issued.remove(i);
            }
            s.accum = entry.delta.value.accum.clone();
            s.timestamp = entry.txn_time;
        }
        state
    }

    fn registry_delta(
        &self,
        id: &str,
        from: Option<i64>,
        to: i64,
    ) -> Option<(RevocationRegistryDelta, i64)> {
        let end = self.registry_state(id, to)?;
        let delta = match from.and_then(|f| self.registry_state(id, f)) {
            Some(start) => RevocationRegistryDelta::new(
                Some(start.accum),
                end.accum,
                end.issued.difference(&start.issued).copied().collect(),
                end.revoked.difference(&start.revoked).copied().collect(),
            ),
            None => RevocationRegistryDelta::new(None, end.accum, end.issued, end.revoked),
        };
        Some((delta, end.timestamp))
    }
}
