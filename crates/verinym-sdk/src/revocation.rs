//! Tails files and the Merkle accumulator over issued revocation ids.
//!
//! Entry `i` of a tails file (1-based) is 32 bytes derived from the
//! registry's secret. The accumulator is the Merkle root of the entries of
//! every currently active id, in ascending id order, so a holder with the
//! tails file and the active set can rebuild it and extract a witness.

use std::collections::BTreeSet;

use verinym_crypto::{merkle_path, merkle_root, Hash, MerkleStep};

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::types::{CredRevId, IssuanceType};

pub const TAILS_ENTRY_SIZE: usize = 32;

const TAILS_ENTRY_CONTEXT: &str = "verinym 2024 tails entry v1";

/// In-memory contents of a tails file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tails {
    bytes: Vec<u8>,
}

impl Tails {
    /// Derive `max_cred_num` entries from a registry secret.
    pub fn generate(secret: &[u8; 32], max_cred_num: u32) -> SdkResult<Self> {
        if max_cred_num == 0 {
            return Err(SdkError::invalid_structure("max_cred_num must be positive"));
        }
        let mut bytes = Vec::with_capacity(max_cred_num as usize * TAILS_ENTRY_SIZE);
        for index in 1..=max_cred_num {
            let mut material = Vec::with_capacity(36);
            material.extend_from_slice(secret);
            material.extend_from_slice(&index.to_le_bytes());
            bytes.extend_from_slice(&blake3::derive_key(TAILS_ENTRY_CONTEXT, &material));
        }
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> SdkResult<Self> {
        if bytes.is_empty() || bytes.len() % TAILS_ENTRY_SIZE != 0 {
            return Err(SdkError::new(
                ErrorCode::TailsMismatch,
                format!("tails file length {} is not a multiple of {}", bytes.len(), TAILS_ENTRY_SIZE),
            ));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn max_cred_num(&self) -> u32 {
        (self.bytes.len() / TAILS_ENTRY_SIZE) as u32
    }

    /// Base58 BLAKE3 digest; also the file name the tails are stored under.
    pub fn hash(&self) -> String {
        tails_hash(&self.bytes)
    }

    pub fn entry(&self, index: CredRevId) -> SdkResult<Hash> {
        if index == 0 || index > self.max_cred_num() {
            return Err(SdkError::invalid_structure(format!(
                "revocation index {} outside 1..={}",
                index,
                self.max_cred_num()
            )));
        }
        let start = (index as usize - 1) * TAILS_ENTRY_SIZE;
        let mut entry = [0u8; TAILS_ENTRY_SIZE];
        entry.copy_from_slice(&self.bytes[start..start + TAILS_ENTRY_SIZE]);
        Ok(entry)
    }

    fn leaves(&self, active: &BTreeSet<CredRevId>) -> SdkResult<Vec<Hash>> {
        active.iter().map(|i| self.entry(*i)).collect()
    }

    /// Accumulator value over `active`, hex encoded.
    pub fn accumulate(&self, active: &BTreeSet<CredRevId>) -> SdkResult<String> {
        Ok(hex::encode(merkle_root(&self.leaves(active)?)))
    }

    /// Inclusion path of `index` under the accumulator of `active`.
    pub fn witness(&self, active: &BTreeSet<CredRevId>, index: CredRevId) -> SdkResult<Vec<MerkleStep>> {
        let position = active.iter().position(|i| *i == index).ok_or_else(|| {
            SdkError::new(
                ErrorCode::CredentialRevoked,
                format!("revocation index {} is not active", index),
            )
        })?;
        merkle_path(&self.leaves(active)?, position)
            .ok_or_else(|| SdkError::invalid_state("witness position out of range"))
    }
}

pub fn tails_hash(bytes: &[u8]) -> String {
    bs58::encode(blake3::hash(bytes).as_bytes()).into_string()
}

/// Ids active right after a registry is created.
pub fn initial_active(issuance_type: IssuanceType, max_cred_num: u32) -> BTreeSet<CredRevId> {
    match issuance_type {
        IssuanceType::IssuanceOnDemand => BTreeSet::new(),
        IssuanceType::IssuanceByDefault => (1..=max_cred_num).collect(),
    }
}

pub fn decode_accum(accum: &str) -> SdkResult<Hash> {
    let bytes = hex::decode(accum)
        .map_err(|e| SdkError::invalid_structure(format!("accumulator is not hex: {}", e)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| SdkError::invalid_structure("accumulator must be 32 bytes"))
}

/// Witness steps in their wire form.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WitnessStep {
    pub sibling: String,
    pub right: bool,
}

impl From<&MerkleStep> for WitnessStep {
    fn from(step: &MerkleStep) -> Self {
        Self {
            sibling: hex::encode(step.sibling),
            right: step.sibling_is_right,
        }
    }
}

impl TryFrom<&WitnessStep> for MerkleStep {
    type Error = SdkError;

    fn try_from(step: &WitnessStep) -> Result<Self, Self::Error> {
        Ok(MerkleStep {
            sibling: decode_accum(&step.sibling)?,
            sibling_is_right: step.right,
        })
    }
}
