//! Signature-based anoncreds engine.
//!
//! Every attribute of a credential carries its own issuer signature over
//! the attribute's encoded value, a digest of its raw value, the holder's
//! master-secret commitment and the credential's revocation slot. A proof
//! discloses the signed encoded values of the attributes it uses and the raw
//! value of revealed ones; non-revocation is a Merkle inclusion path of the
//! slot's tails entry under the accumulator published at a ledger time.

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use zeroize::Zeroizing;

use verinym_core::Did;
use verinym_crypto::{sign, KeyPair};

use crate::api::{
    AnoncredsApi, CredentialDefinitions, RevocationRegistries, RevocationRegistryDefinitions,
    Schemas,
};
use crate::blob_storage::{read_tails, write_tails};
use crate::credential::{
    attribute_message, raw_digest, AttributeSignature, Credential, CredentialInfo,
    CredentialOffer, CredentialRequest, CredentialRequestMetadata, CredentialSignature,
    CredentialValues, RevocationBinding, RevocationState, RevocationStates,
};
use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::handles::{BlobReaderHandle, BlobWriterHandle, SearchHandle, WalletHandle};
use crate::proof::{
    restrictions_match, CredentialSource, DisclosedAttribute, Identifier, NonRevocationProof,
    NonRevokedInterval, Proof, ProofBody, ProofRequest, RequestedCredential, RequestedCredentials,
    RequestedProof, Restriction, RevealedAttribute, SubProof, SubProofReferent,
};
use crate::revocation::{initial_active, Tails, WitnessStep};
use crate::storage::{CATEGORY_CREDENTIAL, CATEGORY_CRED_DEF, CATEGORY_MASTER_SECRET, CATEGORY_REV_REG};
use crate::types::{
    attr_common_view, cred_def_id, rev_reg_id, CredDefId, CredRevId, CredentialDefinition,
    CredentialDefinitionConfig, CredentialDefinitionValue, IssuanceType, PrimaryPublicKey,
    RevRegId, RevocationPublicKey, RevocationRegistryConfig, RevocationRegistryDefinition,
    RevocationRegistryDefinitionValue, RevocationRegistryDelta, Schema, SchemaId, DATA_VERSION,
    REVOC_DEF_TYPE_CL_ACCUM, SIGNATURE_TYPE_CL,
};
use crate::wallet::Wallet;

use super::verifier::verify_proof;
use super::{CredentialSearch, LocalBackend};

const LINK_SECRET_CONTEXT: &str = "verinym 2024 link secret v1";

#[derive(Serialize, Deserialize)]
struct CredDefPrivateRecord {
    cred_def: CredentialDefinition,
    schema_id: SchemaId,
    attr_names: Vec<String>,
    secret: String,
}

impl CredDefPrivateRecord {
    fn signing_key(&self) -> SdkResult<KeyPair> {
        let secret = Zeroizing::new(
            hex::decode(&self.secret)
                .map_err(|e| SdkError::invalid_state(format!("corrupt cred def key: {}", e)))?,
        );
        Ok(KeyPair::from_bytes(&secret)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RevRegPrivateRecord {
    def: RevocationRegistryDefinition,
    next_index: CredRevId,
    active: BTreeSet<CredRevId>,
    accum: String,
}

#[derive(Serialize, Deserialize)]
struct MasterSecretRecord {
    value: String,
}

fn random_secret() -> Zeroizing<[u8; 32]> {
    let mut secret = Zeroizing::new([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut secret[..]);
    secret
}

fn blinded_master_secret(wallet: &Wallet, master_secret_id: &str) -> SdkResult<String> {
    let record: MasterSecretRecord = wallet.get(CATEGORY_MASTER_SECRET, master_secret_id)?;
    let value = Zeroizing::new(
        hex::decode(&record.value)
            .map_err(|e| SdkError::invalid_state(format!("corrupt master secret: {}", e)))?,
    );
    Ok(hex::encode(blake3::derive_key(LINK_SECRET_CONTEXT, &value)))
}

fn blinding_correctness(blinded_ms: &str, nonce: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(blinded_ms.as_bytes());
    hasher.update(nonce.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

fn key_correctness_message(cred_def_id: &str, nonce: &str) -> Vec<u8> {
    format!("{}:{}", cred_def_id, nonce).into_bytes()
}

fn accumulator_delta(
    record: &RevRegPrivateRecord,
    accum: String,
    issued: BTreeSet<CredRevId>,
    revoked: BTreeSet<CredRevId>,
) -> RevocationRegistryDelta {
    RevocationRegistryDelta::new(Some(record.accum.clone()), accum, issued, revoked)
}

/// Candidates in `credentials` usable for `name` under `restrictions`.
fn matching_credentials<'a>(
    credentials: &'a [(String, Credential)],
    name: &str,
    restrictions: Option<&[Restriction]>,
    numeric: bool,
) -> Vec<&'a (String, Credential)> {
    credentials
        .iter()
        .filter(|(_, cred)| match cred.value(name) {
            Some(v) => !numeric || v.encoded_as_int().is_some(),
            None => false,
        })
        .filter(|(_, cred)| {
            CredentialSource::new(&cred.schema_id, &cred.cred_def_id)
                .map(|src| restrictions_match(restrictions, &src))
                .unwrap_or(false)
        })
        .collect()
}

fn candidate_queue(
    matches: Vec<&(String, Credential)>,
    interval: Option<NonRevokedInterval>,
) -> VecDeque<RequestedCredential> {
    matches
        .into_iter()
        .map(|(id, cred)| RequestedCredential {
            cred_info: CredentialInfo::from_credential(id, cred),
            interval,
        })
        .collect()
}

/// Builds sub-proofs, one per (credential, timestamp) pair in first-use order.
struct ProofBuilder<'a> {
    wallet: &'a Wallet,
    blinded_ms: &'a str,
    schemas: &'a Schemas,
    cred_defs: &'a CredentialDefinitions,
    rev_states: &'a RevocationStates,
    keys: Vec<(String, Option<i64>)>,
    credentials: BTreeMap<String, Credential>,
    sub_proofs: Vec<SubProof>,
    identifiers: Vec<Identifier>,
}

impl<'a> ProofBuilder<'a> {
    fn credential(&mut self, cred_id: &str) -> SdkResult<Credential> {
        if let Some(cred) = self.credentials.get(cred_id) {
            return Ok(cred.clone());
        }
        let cred: Credential = self.wallet.get(CATEGORY_CREDENTIAL, cred_id)?;
        if cred.signature.blinded_ms != self.blinded_ms {
            return Err(SdkError::invalid_structure(format!(
                "credential {} is bound to a different master secret",
                cred_id
            )));
        }
        self.credentials.insert(cred_id.to_string(), cred.clone());
        Ok(cred)
    }

    /// Index of the sub-proof for `cred_id`, adding `name` to its disclosed
    /// attributes.
    fn disclose(
        &mut self,
        cred_id: &str,
        timestamp: Option<i64>,
        wants_interval: bool,
        name: &str,
    ) -> SdkResult<(usize, Credential)> {
        let cred = self.credential(cred_id)?;
        let binding = cred.signature.revocation.clone();
        let timestamp = match (&binding, wants_interval) {
            (Some(_), true) => Some(timestamp.ok_or_else(|| {
                SdkError::invalid_structure(format!(
                    "credential {} is revocable; a timestamp is required for {}",
                    cred_id, name
                ))
            })?),
            _ => None,
        };
        let key = (cred_id.to_string(), timestamp);
        let index = match self.keys.iter().position(|k| *k == key) {
            Some(index) => index,
            None => {
                self.open_sub_proof(&cred, binding.as_ref(), timestamp)?;
                self.keys.push(key);
                self.keys.len() - 1
            }
        };

        let (attr_name, value) = cred
            .values
            .iter()
            .find(|(k, _)| attr_common_view(k) == attr_common_view(name))
            .ok_or_else(|| {
                SdkError::invalid_structure(format!("credential {} has no attribute {}", cred_id, name))
            })?;
        let signature = cred.signature.attributes.get(attr_name).ok_or_else(|| {
            SdkError::invalid_state(format!("credential {} lacks a signature for {}", cred_id, attr_name))
        })?;
        self.sub_proofs[index].attributes.insert(
            attr_name.clone(),
            DisclosedAttribute {
                raw_digest: signature.raw_digest.clone(),
                encoded: value.encoded.clone(),
                signature: signature.signature.clone(),
            },
        );
        Ok((index, cred))
    }

    fn open_sub_proof(
        &mut self,
        cred: &Credential,
        binding: Option<&RevocationBinding>,
        timestamp: Option<i64>,
    ) -> SdkResult<()> {
        if !self.schemas.contains_key(&cred.schema_id) {
            return Err(SdkError::invalid_structure(format!("schema {} not provided", cred.schema_id)));
        }
        if !self.cred_defs.contains_key(&cred.cred_def_id) {
            return Err(SdkError::invalid_structure(format!(
                "credential definition {} not provided",
                cred.cred_def_id
            )));
        }
        let revocation = match (binding, timestamp) {
            (Some(b), Some(ts)) => {
                let state = self
                    .rev_states
                    .get(&b.rev_reg_id)
                    .and_then(|by_ts| by_ts.get(&ts))
                    .and_then(|by_index| by_index.get(&b.cred_rev_id))
                    .ok_or_else(|| {
                        SdkError::invalid_structure(format!(
                            "no revocation state for index {} of {} at {}",
                            b.cred_rev_id, b.rev_reg_id, ts
                        ))
                    })?;
                if state.cred_rev_id != b.cred_rev_id {
                    return Err(SdkError::invalid_structure(format!(
                        "revocation state is for index {}, credential holds {}",
                        state.cred_rev_id, b.cred_rev_id
                    )));
                }
                Some(NonRevocationProof {
                    cred_rev_id: b.cred_rev_id,
                    leaf: b.leaf.clone(),
                    witness: Some(state.witness.clone()),
                })
            }
            (Some(b), None) => Some(NonRevocationProof {
                cred_rev_id: b.cred_rev_id,
                leaf: b.leaf.clone(),
                witness: None,
            }),
            (None, _) => None,
        };
        self.sub_proofs.push(SubProof {
            attributes: BTreeMap::new(),
            revocation,
        });
        self.identifiers.push(Identifier {
            schema_id: cred.schema_id.clone(),
            cred_def_id: cred.cred_def_id.clone(),
            rev_reg_id: cred.rev_reg_id.clone(),
            timestamp,
        });
        Ok(())
    }
}

impl LocalBackend {
    async fn load_tails(
        &self,
        reader: BlobReaderHandle,
        def: &RevocationRegistryDefinition,
    ) -> SdkResult<Tails> {
        let config = self.tails_reader(reader)?;
        let tails = read_tails(&config, &def.value.tails_hash).await?;
        if tails.max_cred_num() != def.value.max_cred_num {
            return Err(SdkError::new(
                ErrorCode::TailsMismatch,
                format!(
                    "tails hold {} entries, registry {} expects {}",
                    tails.max_cred_num(),
                    def.id,
                    def.value.max_cred_num
                ),
            ));
        }
        Ok(tails)
    }
}

#[async_trait]
impl AnoncredsApi for LocalBackend {
    async fn issuer_create_schema(
        &self,
        issuer_did: &Did,
        name: &str,
        version: &str,
        attrs: &[String],
    ) -> SdkResult<(SchemaId, Schema)> {
        let schema = Schema::new(issuer_did, name, version, attrs)?;
        Ok((schema.id.clone(), schema))
    }

    async fn issuer_create_and_store_credential_def(
        &self,
        wallet: WalletHandle,
        issuer_did: &Did,
        schema: &Schema,
        tag: &str,
        config: &CredentialDefinitionConfig,
    ) -> SdkResult<(CredDefId, CredentialDefinition)> {
        let wallet = self.wallet(wallet)?;
        let seq_no = schema.seq_no.ok_or_else(|| {
            SdkError::invalid_structure(format!("schema {} has no ledger sequence number", schema.id))
        })?;
        let id = cred_def_id(issuer_did, seq_no, SIGNATURE_TYPE_CL, tag);
        if wallet
            .find::<CredDefPrivateRecord>(CATEGORY_CRED_DEF, &id)?
            .is_some()
        {
            return Err(SdkError::new(
                ErrorCode::WalletItemAlreadyExists,
                format!("credential definition {} already in wallet", id),
            ));
        }
        let key = KeyPair::generate();
        let cred_def = CredentialDefinition {
            ver: DATA_VERSION.into(),
            id: id.clone(),
            schema_id: seq_no.to_string(),
            signature_type: SIGNATURE_TYPE_CL.into(),
            tag: tag.into(),
            value: CredentialDefinitionValue {
                primary: PrimaryPublicKey { verkey: key.verkey() },
                revocation: config.support_revocation.then(|| RevocationPublicKey {
                    accumulator: REVOC_DEF_TYPE_CL_ACCUM.into(),
                }),
            },
        };
        let secret = Zeroizing::new(key.secret_bytes());
        wallet.add(
            CATEGORY_CRED_DEF,
            &id,
            &CredDefPrivateRecord {
                cred_def: cred_def.clone(),
                schema_id: schema.id.clone(),
                attr_names: schema.attr_names.clone(),
                secret: hex::encode(&secret[..]),
            },
        )?;
        tracing::debug!(cred_def_id = %id, revocation = config.support_revocation, "credential definition created");
        Ok((id, cred_def))
    }

    async fn issuer_create_and_store_revoc_reg(
        &self,
        wallet: WalletHandle,
        issuer_did: &Did,
        tag: &str,
        cred_def_id: &str,
        config: &RevocationRegistryConfig,
        tails_writer: BlobWriterHandle,
    ) -> SdkResult<(RevRegId, RevocationRegistryDefinition, RevocationRegistryDelta)> {
        let wallet = self.wallet(wallet)?;
        let writer = self.tails_writer(tails_writer)?;
        let cred_def: CredDefPrivateRecord = wallet.get(CATEGORY_CRED_DEF, cred_def_id)?;
        if !cred_def.cred_def.supports_revocation() {
            return Err(SdkError::invalid_state(format!(
                "credential definition {} does not support revocation",
                cred_def_id
            )));
        }
        let id = rev_reg_id(issuer_did, cred_def_id, tag);
        if wallet.find::<RevRegPrivateRecord>(CATEGORY_REV_REG, &id)?.is_some() {
            return Err(SdkError::new(
                ErrorCode::WalletItemAlreadyExists,
                format!("revocation registry {} already in wallet", id),
            ));
        }

        let tails = Tails::generate(&random_secret(), config.max_cred_num)?;
        let (tails_location, tails_hash) = write_tails(&writer, &tails).await?;
        let active = initial_active(config.issuance_type, config.max_cred_num);
        let accum = tails.accumulate(&active)?;

        let def = RevocationRegistryDefinition {
            ver: DATA_VERSION.into(),
            id: id.clone(),
            revoc_def_type: REVOC_DEF_TYPE_CL_ACCUM.into(),
            tag: tag.into(),
            cred_def_id: cred_def_id.into(),
            value: RevocationRegistryDefinitionValue {
                issuance_type: config.issuance_type,
                max_cred_num: config.max_cred_num,
                tails_hash,
                tails_location,
            },
        };
        let delta = RevocationRegistryDelta::new(None, accum.clone(), active.clone(), BTreeSet::new());
        wallet.add(
            CATEGORY_REV_REG,
            &id,
            &RevRegPrivateRecord {
                def: def.clone(),
                next_index: 1,
                active,
                accum,
            },
        )?;
        tracing::debug!(rev_reg_id = %id, max = config.max_cred_num, "revocation registry created");
        Ok((id, def, delta))
    }

    async fn issuer_create_credential_offer(
        &self,
        wallet: WalletHandle,
        cred_def_id: &str,
    ) -> SdkResult<CredentialOffer> {
        let wallet = self.wallet(wallet)?;
        let record: CredDefPrivateRecord = wallet.get(CATEGORY_CRED_DEF, cred_def_id)?;
        let nonce = verinym_crypto::generate_nonce();
        let proof = sign(
            &key_correctness_message(cred_def_id, &nonce),
            &record.signing_key()?,
        );
        Ok(CredentialOffer {
            schema_id: record.schema_id,
            cred_def_id: cred_def_id.to_string(),
            nonce,
            key_correctness_proof: proof.to_bs58(),
        })
    }

    async fn issuer_create_credential(
        &self,
        wallet: WalletHandle,
        offer: &CredentialOffer,
        request: &CredentialRequest,
        values: &CredentialValues,
        rev_reg_id: Option<&str>,
        tails_reader: Option<BlobReaderHandle>,
    ) -> SdkResult<(Credential, Option<CredRevId>, Option<RevocationRegistryDelta>)> {
        let wallet = self.wallet(wallet)?;
        let record: CredDefPrivateRecord = wallet.get(CATEGORY_CRED_DEF, &offer.cred_def_id)?;
        if request.cred_def_id != offer.cred_def_id {
            return Err(SdkError::invalid_structure(format!(
                "request is for {}, offer was for {}",
                request.cred_def_id, offer.cred_def_id
            )));
        }
        if request.blinded_ms_correctness_proof
            != blinding_correctness(&request.blinded_ms, &offer.nonce)
        {
            return Err(SdkError::invalid_structure(
                "credential request does not answer this offer",
            ));
        }
        let expected: BTreeSet<String> = record.attr_names.iter().map(|a| attr_common_view(a)).collect();
        let given: BTreeSet<String> = values.keys().map(|a| attr_common_view(a)).collect();
        if expected != given {
            return Err(SdkError::invalid_structure(format!(
                "credential values {:?} do not match schema attributes {:?}",
                given, expected
            )));
        }

        let mut revocation = None;
        let mut delta = None;
        if let Some(rev_reg_id) = rev_reg_id {
            let reader = tails_reader.ok_or_else(|| {
                SdkError::invalid_structure("a tails reader is required for revocable issuance")
            })?;
            let mut reg: RevRegPrivateRecord = wallet.get(CATEGORY_REV_REG, rev_reg_id)?;
            if reg.def.cred_def_id != offer.cred_def_id {
                return Err(SdkError::invalid_structure(format!(
                    "registry {} belongs to {}",
                    rev_reg_id, reg.def.cred_def_id
                )));
            }
            let index = reg.next_index;
            if index > reg.def.value.max_cred_num {
                return Err(SdkError::new(
                    ErrorCode::RevocationRegistryFull,
                    format!("registry {} is full", rev_reg_id),
                ));
            }
            let tails = self.load_tails(reader, &reg.def).await?;
            if reg.def.value.issuance_type == IssuanceType::IssuanceOnDemand {
                reg.active.insert(index);
                let accum = tails.accumulate(&reg.active)?;
                delta = Some(accumulator_delta(
                    &reg,
                    accum.clone(),
                    [index].into_iter().collect(),
                    BTreeSet::new(),
                ));
                reg.accum = accum;
            }
            reg.next_index += 1;
            revocation = Some(RevocationBinding {
                rev_reg_id: rev_reg_id.to_string(),
                cred_rev_id: index,
                leaf: hex::encode(tails.entry(index)?),
            });
            wallet.update(CATEGORY_REV_REG, rev_reg_id, &reg)?;
        }

        let key = record.signing_key()?;
        let mut attributes = BTreeMap::new();
        for (name, value) in values {
            let digest = raw_digest(&value.raw);
            let message = attribute_message(
                &offer.cred_def_id,
                &offer.schema_id,
                &request.blinded_ms,
                revocation.as_ref(),
                name,
                &digest,
                &value.encoded,
            )?;
            attributes.insert(
                name.clone(),
                AttributeSignature {
                    raw_digest: digest,
                    signature: sign(&message, &key).to_bs58(),
                },
            );
        }
        let cred_rev_id = revocation.as_ref().map(|r| r.cred_rev_id);
        let credential = Credential {
            schema_id: offer.schema_id.clone(),
            cred_def_id: offer.cred_def_id.clone(),
            rev_reg_id: rev_reg_id.map(str::to_string),
            values: values.clone(),
            signature: CredentialSignature {
                blinded_ms: request.blinded_ms.clone(),
                attributes,
                revocation,
            },
        };
        tracing::debug!(cred_def_id = %offer.cred_def_id, ?cred_rev_id, "credential issued");
        Ok((credential, cred_rev_id, delta))
    }

    async fn issuer_revoke_credential(
        &self,
        wallet: WalletHandle,
        tails_reader: BlobReaderHandle,
        rev_reg_id: &str,
        cred_rev_id: CredRevId,
    ) -> SdkResult<RevocationRegistryDelta> {
        let wallet = self.wallet(wallet)?;
        let mut reg: RevRegPrivateRecord = wallet.get(CATEGORY_REV_REG, rev_reg_id)?;
        if cred_rev_id == 0 || cred_rev_id > reg.def.value.max_cred_num {
            return Err(SdkError::invalid_structure(format!(
                "revocation index {} outside 1..={}",
                cred_rev_id, reg.def.value.max_cred_num
            )));
        }
        if !reg.active.contains(&cred_rev_id) {
            return Err(SdkError::new(
                ErrorCode::CredentialRevoked,
                format!("index {} of {} is not active", cred_rev_id, rev_reg_id),
            ));
        }
        let tails = self.load_tails(tails_reader, &reg.def).await?;
        reg.active.remove(&cred_rev_id);
        let accum = tails.accumulate(&reg.active)?;
        let delta = accumulator_delta(
            &reg,
            accum.clone(),
            BTreeSet::new(),
            [cred_rev_id].into_iter().collect(),
        );
        reg.accum = accum;
        wallet.update(CATEGORY_REV_REG, rev_reg_id, &reg)?;
        tracing::info!(rev_reg_id, cred_rev_id, "credential revoked");
        Ok(delta)
    }

    async fn prover_create_master_secret(
        &self,
        wallet: WalletHandle,
        master_secret_id: Option<&str>,
    ) -> SdkResult<String> {
        let wallet = self.wallet(wallet)?;
        let id = master_secret_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        let secret = random_secret();
        wallet.add(
            CATEGORY_MASTER_SECRET,
            &id,
            &MasterSecretRecord {
                value: hex::encode(&secret[..]),
            },
        )?;
        Ok(id)
    }

    async fn prover_create_credential_req(
        &self,
        wallet: WalletHandle,
        prover_did: &Did,
        offer: &CredentialOffer,
        cred_def: &CredentialDefinition,
        master_secret_id: &str,
    ) -> SdkResult<(CredentialRequest, CredentialRequestMetadata)> {
        let wallet = self.wallet(wallet)?;
        if offer.cred_def_id != cred_def.id {
            return Err(SdkError::invalid_structure(format!(
                "offer is for {}, definition is {}",
                offer.cred_def_id, cred_def.id
            )));
        }
        let issuer_key = verinym_crypto::PublicKey::from_verkey(&cred_def.value.primary.verkey)?;
        let proof = verinym_crypto::Signature::from_bs58(&offer.key_correctness_proof)?;
        verinym_crypto::verify(
            &key_correctness_message(&offer.cred_def_id, &offer.nonce),
            &proof,
            &issuer_key,
        )
        .map_err(|_| SdkError::invalid_structure("offer key correctness proof does not verify"))?;

        let blinded_ms = blinded_master_secret(&wallet, master_secret_id)?;
        let nonce = verinym_crypto::generate_nonce();
        let request = CredentialRequest {
            prover_did: prover_did.clone(),
            cred_def_id: cred_def.id.clone(),
            blinded_ms_correctness_proof: blinding_correctness(&blinded_ms, &offer.nonce),
            blinded_ms: blinded_ms.clone(),
            nonce: nonce.clone(),
        };
        let metadata = CredentialRequestMetadata {
            master_secret_name: master_secret_id.to_string(),
            blinded_ms,
            nonce,
        };
        Ok((request, metadata))
    }

    async fn prover_store_credential(
        &self,
        wallet: WalletHandle,
        cred_id: Option<&str>,
        metadata: &CredentialRequestMetadata,
        credential: &Credential,
        cred_def: &CredentialDefinition,
        rev_reg_def: Option<&RevocationRegistryDefinition>,
    ) -> SdkResult<String> {
        let wallet = self.wallet(wallet)?;
        if credential.cred_def_id != cred_def.id {
            return Err(SdkError::invalid_structure(format!(
                "credential is from {}, definition given is {}",
                credential.cred_def_id, cred_def.id
            )));
        }
        let blinded_ms = blinded_master_secret(&wallet, &metadata.master_secret_name)?;
        if credential.signature.blinded_ms != blinded_ms || metadata.blinded_ms != blinded_ms {
            return Err(SdkError::invalid_structure(
                "credential is not bound to this master secret",
            ));
        }
        match (&credential.rev_reg_id, &credential.signature.revocation, rev_reg_def) {
            (None, None, _) => {}
            (Some(id), Some(binding), Some(def)) if *id == def.id && binding.rev_reg_id == *id => {}
            _ => {
                return Err(SdkError::invalid_structure(
                    "credential revocation data does not match the registry definition",
                ))
            }
        }

        let issuer_key = verinym_crypto::PublicKey::from_verkey(&cred_def.value.primary.verkey)?;
        for (name, value) in &credential.values {
            let signed = credential.signature.attributes.get(name).ok_or_else(|| {
                SdkError::invalid_structure(format!("attribute {} is unsigned", name))
            })?;
            if signed.raw_digest != raw_digest(&value.raw) {
                return Err(SdkError::invalid_structure(format!(
                    "raw value of {} does not match its signed digest",
                    name
                )));
            }
            let message = attribute_message(
                &credential.cred_def_id,
                &credential.schema_id,
                &credential.signature.blinded_ms,
                credential.signature.revocation.as_ref(),
                name,
                &signed.raw_digest,
                &value.encoded,
            )?;
            let signature = verinym_crypto::Signature::from_bs58(&signed.signature)?;
            verinym_crypto::verify(&message, &signature, &issuer_key).map_err(|_| {
                SdkError::invalid_structure(format!("signature on {} does not verify", name))
            })?;
        }

        let referent = cred_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        wallet.add(CATEGORY_CREDENTIAL, &referent, credential)?;
        tracing::debug!(referent = %referent, cred_def_id = %credential.cred_def_id, "credential stored");
        Ok(referent)
    }

    async fn prover_search_credentials_for_proof_req(
        &self,
        wallet: WalletHandle,
        proof_request: &ProofRequest,
    ) -> SdkResult<SearchHandle> {
        proof_request.validate()?;
        let credentials: Vec<(String, Credential)> =
            self.wallet(wallet)?.list(CATEGORY_CREDENTIAL)?;

        let mut candidates = BTreeMap::new();
        for (referent, info) in &proof_request.requested_attributes {
            let matches =
                matching_credentials(&credentials, &info.name, info.restrictions.as_deref(), false);
            candidates.insert(
                referent.clone(),
                candidate_queue(matches, proof_request.attribute_interval(referent)),
            );
        }
        for (referent, info) in &proof_request.requested_predicates {
            let matches =
                matching_credentials(&credentials, &info.name, info.restrictions.as_deref(), true);
            candidates.insert(
                referent.clone(),
                candidate_queue(matches, proof_request.predicate_interval(referent)),
            );
        }

        let handle = SearchHandle(self.handles.next());
        self.searches.insert(
            handle,
            CredentialSearch {
                wallet,
                candidates,
            },
        );
        Ok(handle)
    }

    async fn prover_fetch_credentials_for_proof_req(
        &self,
        search: SearchHandle,
        referent: &str,
        count: usize,
    ) -> SdkResult<Vec<RequestedCredential>> {
        let mut entry = self
            .searches
            .get_mut(&search)
            .ok_or_else(|| SdkError::invalid_handle(search))?;
        let queue = entry.candidates.get_mut(referent).ok_or_else(|| {
            SdkError::invalid_structure(format!("referent {} is not part of the search", referent))
        })?;
        let take = count.min(queue.len());
        Ok(queue.drain(..take).collect())
    }

    async fn prover_close_credentials_search_for_proof_req(
        &self,
        search: SearchHandle,
    ) -> SdkResult<()> {
        self.searches
            .remove(&search)
            .map(|_| ())
            .ok_or_else(|| SdkError::invalid_handle(search))
    }

    async fn prover_create_proof(
        &self,
        wallet: WalletHandle,
        proof_request: &ProofRequest,
        requested_credentials: &RequestedCredentials,
        master_secret_id: &str,
        schemas: &Schemas,
        cred_defs: &CredentialDefinitions,
        rev_states: &RevocationStates,
    ) -> SdkResult<Proof> {
        proof_request.validate()?;
        let wallet = self.wallet(wallet)?;
        let blinded_ms = blinded_master_secret(&wallet, master_secret_id)?;
        let mut builder = ProofBuilder {
            wallet: &wallet,
            blinded_ms: &blinded_ms,
            schemas,
            cred_defs,
            rev_states,
            keys: Vec::new(),
            credentials: BTreeMap::new(),
            sub_proofs: Vec::new(),
            identifiers: Vec::new(),
        };
        let mut requested_proof = RequestedProof::default();

        for (referent, info) in &proof_request.requested_attributes {
            if let Some(value) = requested_credentials.self_attested_attributes.get(referent) {
                if info.restrictions.as_ref().is_some_and(|r| !r.is_empty()) {
                    return Err(SdkError::invalid_structure(format!(
                        "{} is restricted and cannot be self-attested",
                        referent
                    )));
                }
                requested_proof
                    .self_attested_attrs
                    .insert(referent.clone(), value.clone());
                continue;
            }
            let requested = requested_credentials
                .requested_attributes
                .get(referent)
                .ok_or_else(|| {
                    SdkError::invalid_structure(format!("no credential chosen for {}", referent))
                })?;
            let wants_interval = proof_request.attribute_interval(referent).is_some();
            let (index, cred) = builder.disclose(
                &requested.cred_id,
                requested.timestamp,
                wants_interval,
                &info.name,
            )?;
            if requested.revealed {
                let value = cred.value(&info.name).ok_or_else(|| {
                    SdkError::invalid_structure(format!("credential lacks {}", info.name))
                })?;
                requested_proof.revealed_attrs.insert(
                    referent.clone(),
                    RevealedAttribute {
                        sub_proof_index: index,
                        raw: value.raw.clone(),
                        encoded: value.encoded.clone(),
                    },
                );
            } else {
                requested_proof
                    .unrevealed_attrs
                    .insert(referent.clone(), SubProofReferent { sub_proof_index: index });
            }
        }

        for (referent, info) in &proof_request.requested_predicates {
            let requested = requested_credentials
                .requested_predicates
                .get(referent)
                .ok_or_else(|| {
                    SdkError::invalid_structure(format!("no credential chosen for {}", referent))
                })?;
            let wants_interval = proof_request.predicate_interval(referent).is_some();
            let (index, cred) = builder.disclose(
                &requested.cred_id,
                requested.timestamp,
                wants_interval,
                &info.name,
            )?;
            let value = cred
                .value(&info.name)
                .and_then(|v| v.encoded_as_int())
                .ok_or_else(|| {
                    SdkError::invalid_structure(format!("{} is not numeric", info.name))
                })?;
            if !info.p_type.holds(value, info.p_value) {
                return Err(SdkError::new(
                    ErrorCode::ProofRejected,
                    format!("predicate {} {:?} {} is not satisfied", info.name, info.p_type, info.p_value),
                ));
            }
            requested_proof
                .predicates
                .insert(referent.clone(), SubProofReferent { sub_proof_index: index });
        }

        let ProofBuilder {
            sub_proofs,
            identifiers,
            ..
        } = builder;
        tracing::debug!(sub_proofs = sub_proofs.len(), name = %proof_request.name, "proof created");
        Ok(Proof {
            proof: ProofBody {
                nonce: proof_request.nonce.clone(),
                blinded_ms,
                sub_proofs,
            },
            requested_proof,
            identifiers,
        })
    }

    async fn verifier_verify_proof(
        &self,
        proof_request: &ProofRequest,
        proof: &Proof,
        schemas: &Schemas,
        cred_defs: &CredentialDefinitions,
        rev_reg_defs: &RevocationRegistryDefinitions,
        rev_regs: &RevocationRegistries,
    ) -> SdkResult<bool> {
        let result = verify_proof(proof_request, proof, schemas, cred_defs, rev_reg_defs, rev_regs);
        for check in result.checks.iter().filter(|c| !c.passed) {
            tracing::debug!(check = check.name, detail = ?check.detail, "proof check failed");
        }
        Ok(result.valid)
    }

    async fn create_revocation_state(
        &self,
        tails_reader: BlobReaderHandle,
        rev_reg_def: &RevocationRegistryDefinition,
        delta: &RevocationRegistryDelta,
        timestamp: i64,
        cred_rev_id: CredRevId,
    ) -> SdkResult<RevocationState> {
        if delta.value.prev_accum.is_some() {
            return Err(SdkError::invalid_structure(
                "revocation state needs a cumulative delta",
            ));
        }
        let tails = self.load_tails(tails_reader, rev_reg_def).await?;
        let active: BTreeSet<CredRevId> = delta
            .value
            .issued
            .difference(&delta.value.revoked)
            .copied()
            .collect();
        if tails.accumulate(&active)? != delta.value.accum {
            return Err(SdkError::invalid_state(format!(
                "tails of {} do not reproduce the published accumulator",
                rev_reg_def.id
            )));
        }
        let witness = tails.witness(&active, cred_rev_id)?;
        Ok(RevocationState {
            rev_reg_id: rev_reg_def.id.clone(),
            cred_rev_id,
            timestamp,
            accum: delta.value.accum.clone(),
            leaf: hex::encode(tails.entry(cred_rev_id)?),
            witness: witness.iter().map(WitnessStep::from).collect(),
        })
    }

    async fn generate_nonce(&self) -> SdkResult<String> {
        Ok(verinym_crypto::generate_nonce())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BlobStorageApi, DidApi, WalletApi};
    use crate::blob_storage::TailsStorageConfig;
    use crate::credential::AttributeValue;
    use crate::proof::{
        AttributeInfo, PredicateInfo, PredicateType, RequestedAttribute, RequestedPredicate,
    };
    use crate::types::RevocationRegistry;

    const TRANSCRIPT_ATTRS: &[&str] = &[
        "first_name",
        "last_name",
        "degree",
        "status",
        "ssn",
        "year",
        "average",
    ];

    struct Fixture {
        backend: LocalBackend,
        issuer: WalletHandle,
        prover: WalletHandle,
        prover_did: Did,
        schema: Schema,
        cred_def: CredentialDefinition,
        rev_def: RevocationRegistryDefinition,
        tails_dir: std::path::PathBuf,
        reader: BlobReaderHandle,
        master_secret: String,
    }

    async fn open_wallet(backend: &LocalBackend, name: &str) -> WalletHandle {
        let config = crate::wallet::WalletConfig::new(format!("{}-{}", name, uuid::Uuid::now_v7()));
        let creds = crate::wallet::WalletCredentials::new(format!("{}_key", name));
        backend.create_wallet(&config, &creds).await.unwrap();
        backend.open_wallet(&config, &creds).await.unwrap()
    }

    async fn fixture(max_cred_num: u32) -> Fixture {
        let backend = LocalBackend::new();
        let issuer = open_wallet(&backend, "faber").await;
        let prover = open_wallet(&backend, "alice").await;
        let (issuer_did, _) = backend.create_and_store_my_did(issuer, None).await.unwrap();
        let (prover_did, _) = backend.create_and_store_my_did(prover, None).await.unwrap();

        let attrs: Vec<String> = TRANSCRIPT_ATTRS.iter().map(|a| a.to_string()).collect();
        let (_, mut schema) = backend
            .issuer_create_schema(&issuer_did, "Transcript", "1.2", &attrs)
            .await
            .unwrap();
        schema.seq_no = Some(7);
        let (_, cred_def) = backend
            .issuer_create_and_store_credential_def(
                issuer,
                &issuer_did,
                &schema,
                "TAG1",
                &CredentialDefinitionConfig {
                    support_revocation: true,
                },
            )
            .await
            .unwrap();

        let tails_dir = std::env::temp_dir().join(format!("verinym-anoncreds-{}", uuid::Uuid::now_v7()));
        let tails_config = TailsStorageConfig::new(&tails_dir);
        let writer = backend
            .open_blob_storage_writer("default", &tails_config)
            .await
            .unwrap();
        let (_, rev_def, _) = backend
            .issuer_create_and_store_revoc_reg(
                issuer,
                &issuer_did,
                "TAG1",
                &cred_def.id,
                &RevocationRegistryConfig {
                    issuance_type: IssuanceType::IssuanceOnDemand,
                    max_cred_num,
                },
                writer,
            )
            .await
            .unwrap();
        let reader = backend
            .open_blob_storage_reader("default", &tails_config)
            .await
            .unwrap();
        let master_secret = backend
            .prover_create_master_secret(prover, Some("alice_master_secret"))
            .await
            .unwrap();
        Fixture {
            backend,
            issuer,
            prover,
            prover_did,
            schema,
            cred_def,
            rev_def,
            tails_dir,
            reader,
            master_secret,
        }
    }

    fn transcript(average: &str) -> CredentialValues {
        [
            ("first_name", "Alice"),
            ("last_name", "Garcia"),
            ("degree", "Bachelor of Science, Marketing"),
            ("status", "graduated"),
            ("ssn", "123-45-6789"),
            ("year", "2015"),
            ("average", average),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), AttributeValue::new(v)))
        .collect()
    }

    impl Fixture {
        /// Issue and store one transcript; returns the referent, revocation
        /// index and published delta.
        async fn issue(&self, average: &str) -> SdkResult<(String, CredRevId, RevocationRegistryDelta)> {
            let offer = self
                .backend
                .issuer_create_credential_offer(self.issuer, &self.cred_def.id)
                .await?;
            let (request, metadata) = self
                .backend
                .prover_create_credential_req(
                    self.prover,
                    &self.prover_did,
                    &offer,
                    &self.cred_def,
                    &self.master_secret,
                )
                .await?;
            let (credential, cred_rev_id, delta) = self
                .backend
                .issuer_create_credential(
                    self.issuer,
                    &offer,
                    &request,
                    &transcript(average),
                    Some(&self.rev_def.id),
                    Some(self.reader),
                )
                .await?;
            let referent = self
                .backend
                .prover_store_credential(
                    self.prover,
                    None,
                    &metadata,
                    &credential,
                    &self.cred_def,
                    Some(&self.rev_def),
                )
                .await?;
            Ok((referent, cred_rev_id.unwrap(), delta.unwrap()))
        }

        fn job_application(&self) -> ProofRequest {
            let restricted = Some(vec![crate::proof::Restriction::cred_def(&self.cred_def.id)]);
            ProofRequest {
                nonce: "1432422343242122312411212".into(),
                name: "Job-Application".into(),
                version: "0.1".into(),
                requested_attributes: [
                    (
                        "attr1_referent".to_string(),
                        AttributeInfo {
                            name: "first_name".into(),
                            restrictions: None,
                            non_revoked: None,
                        },
                    ),
                    (
                        "attr2_referent".to_string(),
                        AttributeInfo {
                            name: "degree".into(),
                            restrictions: restricted.clone(),
                            non_revoked: None,
                        },
                    ),
                    (
                        "attr3_referent".to_string(),
                        AttributeInfo {
                            name: "status".into(),
                            restrictions: restricted.clone(),
                            non_revoked: None,
                        },
                    ),
                ]
                .into_iter()
                .collect(),
                requested_predicates: [(
                    "predicate1_referent".to_string(),
                    PredicateInfo {
                        name: "average".into(),
                        p_type: PredicateType::GreaterOrEqual,
                        p_value: 4,
                        restrictions: restricted,
                        non_revoked: None,
                    },
                )]
                .into_iter()
                .collect(),
                non_revoked: Some(NonRevokedInterval::to(100)),
            }
        }

        fn requested(&self, referent: &str, timestamp: i64) -> RequestedCredentials {
            let attr = |revealed| RequestedAttribute {
                cred_id: referent.to_string(),
                timestamp: Some(timestamp),
                revealed,
            };
            RequestedCredentials {
                self_attested_attributes: BTreeMap::new(),
                requested_attributes: [
                    ("attr1_referent".to_string(), attr(true)),
                    ("attr2_referent".to_string(), attr(true)),
                    ("attr3_referent".to_string(), attr(false)),
                ]
                .into_iter()
                .collect(),
                requested_predicates: [(
                    "predicate1_referent".to_string(),
                    RequestedPredicate {
                        cred_id: referent.to_string(),
                        timestamp: Some(timestamp),
                    },
                )]
                .into_iter()
                .collect(),
            }
        }

        async fn state(
            &self,
            accum: &str,
            issued: &[CredRevId],
            revoked: &[CredRevId],
            timestamp: i64,
            cred_rev_id: CredRevId,
        ) -> SdkResult<RevocationState> {
            let cumulative = RevocationRegistryDelta::new(
                None,
                accum.to_string(),
                issued.iter().copied().collect(),
                revoked.iter().copied().collect(),
            );
            self.backend
                .create_revocation_state(self.reader, &self.rev_def, &cumulative, timestamp, cred_rev_id)
                .await
        }

        fn ledger(&self, timestamp: i64, accum: &str) -> (Schemas, CredentialDefinitions, RevocationRegistryDefinitions, RevocationRegistries) {
            let schemas = [(self.schema.id.clone(), self.schema.clone())].into_iter().collect();
            let cred_defs = [(self.cred_def.id.clone(), self.cred_def.clone())].into_iter().collect();
            let rev_defs = [(self.rev_def.id.clone(), self.rev_def.clone())].into_iter().collect();
            let mut by_ts = BTreeMap::new();
            by_ts.insert(timestamp, RevocationRegistry::new(accum.to_string()));
            let rev_regs = [(self.rev_def.id.clone(), by_ts)].into_iter().collect();
            (schemas, cred_defs, rev_defs, rev_regs)
        }

        async fn prove(&self, request: &ProofRequest, requested: &RequestedCredentials, states: Vec<RevocationState>) -> SdkResult<Proof> {
            let schemas = [(self.schema.id.clone(), self.schema.clone())].into_iter().collect();
            let cred_defs = [(self.cred_def.id.clone(), self.cred_def.clone())].into_iter().collect();
            let mut rev_states = RevocationStates::new();
            for state in states {
                rev_states
                    .entry(state.rev_reg_id.clone())
                    .or_default()
                    .entry(state.timestamp)
                    .or_default()
                    .insert(state.cred_rev_id, state);
            }
            self.backend
                .prover_create_proof(
                    self.prover,
                    request,
                    requested,
                    &self.master_secret,
                    &schemas,
                    &cred_defs,
                    &rev_states,
                )
                .await
        }

        async fn verify(&self, request: &ProofRequest, proof: &Proof, timestamp: i64, accum: &str) -> bool {
            let (schemas, cred_defs, rev_defs, rev_regs) = self.ledger(timestamp, accum);
            self.backend
                .verifier_verify_proof(request, proof, &schemas, &cred_defs, &rev_defs, &rev_regs)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_issue_prove_verify() {
        let fx = fixture(5).await;
        let (referent, cred_rev_id, delta) = fx.issue("5").await.unwrap();
        assert_eq!(cred_rev_id, 1);
        assert_eq!(delta.value.issued, BTreeSet::from([1]));
        assert!(delta.value.prev_accum.is_some());

        let request = fx.job_application();
        let search = fx
            .backend
            .prover_search_credentials_for_proof_req(fx.prover, &request)
            .await
            .unwrap();
        let found = fx
            .backend
            .prover_fetch_credentials_for_proof_req(search, "attr2_referent", 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cred_info.referent, referent);
        assert_eq!(found[0].interval, Some(NonRevokedInterval::to(100)));
        assert!(fx
            .backend
            .prover_fetch_credentials_for_proof_req(search, "attr2_referent", 10)
            .await
            .unwrap()
            .is_empty());
        fx.backend
            .prover_close_credentials_search_for_proof_req(search)
            .await
            .unwrap();

        let state = fx.state(delta.accum(), &[1], &[], 50, 1).await.unwrap();
        let proof = fx.prove(&request, &fx.requested(&referent, 50), vec![state]).await.unwrap();
        assert_eq!(proof.proof.sub_proofs.len(), 1);
        assert_eq!(proof.revealed("attr2_referent").unwrap().raw, "Bachelor of Science, Marketing");
        assert!(proof.requested_proof.unrevealed_attrs.contains_key("attr3_referent"));
        assert!(fx.verify(&request, &proof, 50, delta.accum()).await);

        let mut tampered = proof.clone();
        if let Some(attr) = tampered.requested_proof.revealed_attrs.get_mut("attr1_referent") {
            attr.raw = "Mallory".into();
        }
        assert!(!fx.verify(&request, &tampered, 50, delta.accum()).await);

        let mut other_nonce = request.clone();
        other_nonce.nonce = "42".into();
        assert!(!fx.verify(&other_nonce, &proof, 50, delta.accum()).await);

        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_revoked_credential_fails_verification() {
        let fx = fixture(5).await;
        let (referent, cred_rev_id, issue_delta) = fx.issue("5").await.unwrap();
        let old_state = fx.state(issue_delta.accum(), &[1], &[], 50, 1).await.unwrap();

        let revoke_delta = fx
            .backend
            .issuer_revoke_credential(fx.issuer, fx.reader, &fx.rev_def.id, cred_rev_id)
            .await
            .unwrap();
        assert_eq!(revoke_delta.value.prev_accum.as_deref(), Some(issue_delta.accum()));
        assert_eq!(
            fx.backend
                .issuer_revoke_credential(fx.issuer, fx.reader, &fx.rev_def.id, cred_rev_id)
                .await
                .unwrap_err()
                .code,
            ErrorCode::CredentialRevoked
        );

        let err = fx
            .state(revoke_delta.accum(), &[1], &[1], 60, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CredentialRevoked);

        let request = fx.job_application();
        let proof = fx.prove(&request, &fx.requested(&referent, 50), vec![old_state]).await.unwrap();
        assert!(fx.verify(&request, &proof, 50, issue_delta.accum()).await);
        assert!(!fx.verify(&request, &proof, 50, revoke_delta.accum()).await);

        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_two_credentials_from_one_registry() {
        let fx = fixture(5).await;
        let (first, _, _) = fx.issue("5").await.unwrap();
        let (second, cred_rev_id, delta) = fx.issue("4").await.unwrap();
        assert_eq!(cred_rev_id, 2);

        let request = fx.job_application();
        let mut requested = fx.requested(&first, 50);
        requested.requested_attributes.get_mut("attr3_referent").unwrap().cred_id = second.clone();
        requested.requested_predicates.get_mut("predicate1_referent").unwrap().cred_id = second;

        let one = fx.state(delta.accum(), &[1, 2], &[], 50, 1).await.unwrap();
        let err = fx.prove(&request, &requested, vec![one.clone()]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CommonInvalidStructure);

        let two = fx.state(delta.accum(), &[1, 2], &[], 50, 2).await.unwrap();
        let proof = fx.prove(&request, &requested, vec![one, two]).await.unwrap();
        assert_eq!(proof.proof.sub_proofs.len(), 2);
        assert!(fx.verify(&request, &proof, 50, delta.accum()).await);

        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_unsatisfied_predicate_rejected() {
        let fx = fixture(5).await;
        let (referent, _, delta) = fx.issue("3").await.unwrap();
        let state = fx.state(delta.accum(), &[1], &[], 50, 1).await.unwrap();
        let err = fx
            .prove(&fx.job_application(), &fx.requested(&referent, 50), vec![state])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProofRejected);
        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_restricted_attribute_cannot_be_self_attested() {
        let fx = fixture(5).await;
        let (referent, _, delta) = fx.issue("5").await.unwrap();
        let state = fx.state(delta.accum(), &[1], &[], 50, 1).await.unwrap();
        let mut requested = fx.requested(&referent, 50);
        requested.requested_attributes.remove("attr2_referent");
        requested
            .self_attested_attributes
            .insert("attr2_referent".into(), "PhD".into());
        let err = fx
            .prove(&fx.job_application(), &requested, vec![state])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CommonInvalidStructure);
        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_registry_full() {
        let fx = fixture(1).await;
        fx.issue("5").await.unwrap();
        let err = fx.issue("5").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RevocationRegistryFull);
        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_tampered_tails_rejected() {
        let fx = fixture(5).await;
        let path = std::path::Path::new(&fx.rev_def.value.tails_location);
        let mut bytes = tokio::fs::read(path).await.unwrap();
        bytes[3] ^= 0x01;
        tokio::fs::write(path, &bytes).await.unwrap();
        let err = fx.issue("5").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TailsMismatch);
        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_values_must_cover_schema() {
        let fx = fixture(5).await;
        let offer = fx
            .backend
            .issuer_create_credential_offer(fx.issuer, &fx.cred_def.id)
            .await
            .unwrap();
        let (request, _) = fx
            .backend
            .prover_create_credential_req(fx.prover, &fx.prover_did, &offer, &fx.cred_def, &fx.master_secret)
            .await
            .unwrap();
        let mut values = transcript("5");
        values.remove("ssn");
        let err = fx
            .backend
            .issuer_create_credential(fx.issuer, &offer, &request, &values, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CommonInvalidStructure);
        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }

    #[tokio::test]
    async fn test_duplicate_cred_def_rejected() {
        let fx = fixture(5).await;
        let issuer_did = crate::types::issuer_of(&fx.cred_def.id).unwrap();
        let err = fx
            .backend
            .issuer_create_and_store_credential_def(
                fx.issuer,
                &issuer_did,
                &fx.schema,
                "TAG1",
                &CredentialDefinitionConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(err.code.is_already_exists());
        tokio::fs::remove_dir_all(&fx.tails_dir).await.ok();
    }
}
