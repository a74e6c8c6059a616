use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Length in bytes of the key prefix an unqualified DID is derived from.
pub const DID_BYTES: usize = 16;

/// Length in bytes of an Ed25519 verification key.
pub const VERKEY_BYTES: usize = 32;

/// Decentralized identifier as written to the ledger.
///
/// Unqualified base58 form: the first 16 bytes of the owner's verification
/// key (or 32 bytes for a full-key DID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Parse and validate a DID string.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let bytes = bs58::decode(&value)
            .into_vec()
            .map_err(|e| CoreError::InvalidDid(format!("{}: {}", value, e)))?;
        if bytes.len() != DID_BYTES && bytes.len() != VERKEY_BYTES {
            return Err(CoreError::InvalidDid(format!(
                "{} decodes to {} bytes, expected {} or {}",
                value,
                bytes.len(),
                DID_BYTES,
                VERKEY_BYTES
            )));
        }
        Ok(Self(value))
    }

    /// Derive the unqualified DID for a raw verification key.
    pub fn from_verkey_bytes(verkey: &[u8; VERKEY_BYTES]) -> Self {
        Self(bs58::encode(&verkey[..DID_BYTES]).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Did {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl FromStr for Did {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Base58-encoded Ed25519 verification key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Verkey(String);

impl Verkey {
    /// Parse and validate a base58 verkey.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let key = Self(value);
        key.to_bytes()?;
        Ok(key)
    }

    /// Encode raw key bytes.
    pub fn from_bytes(bytes: &[u8; VERKEY_BYTES]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    /// Decode to raw key bytes.
    pub fn to_bytes(&self) -> Result<[u8; VERKEY_BYTES], CoreError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CoreError::InvalidVerkey(format!("{}: {}", self.0, e)))?;
        bytes.as_slice().try_into().map_err(|_| {
            CoreError::InvalidVerkey(format!(
                "{} decodes to {} bytes, expected {}",
                self.0,
                bytes.len(),
                VERKEY_BYTES
            ))
        })
    }

    /// The DID this key would be registered under.
    pub fn did(&self) -> Result<Did, CoreError> {
        Ok(Did::from_verkey_bytes(&self.to_bytes()?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Verkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Verkey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Verkey> for String {
    fn from(key: Verkey) -> Self {
        key.0
    }
}

/// Ledger role attached to a NYM record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Trustee,
    Steward,
    TrustAnchor,
    NetworkMonitor,
}

impl Role {
    /// Numeric code used in ledger transactions.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Trustee => "0",
            Self::Steward => "2",
            Self::TrustAnchor => "101",
            Self::NetworkMonitor => "201",
        }
    }

    /// Whether a NYM submitted by this role is accepted at all.
    pub fn can_write_nym(&self) -> bool {
        matches!(self, Self::Trustee | Self::Steward | Self::TrustAnchor)
    }

    /// Whether this role may grant `target` to another DID.
    pub fn can_assign(&self, target: Role) -> bool {
        match target {
            Self::Trustee => matches!(self, Self::Trustee),
            Self::Steward => matches!(self, Self::Trustee),
            Self::TrustAnchor | Self::NetworkMonitor => {
                matches!(self, Self::Trustee | Self::Steward)
            }
        }
    }

    /// Whether schemas, credential definitions and revocation registries
    /// may be published under this role.
    pub fn can_publish_definitions(&self) -> bool {
        matches!(self, Self::Trustee | Self::Steward | Self::TrustAnchor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trustee => write!(f, "TRUSTEE"),
            Self::Steward => write!(f, "STEWARD"),
            Self::TrustAnchor => write!(f, "TRUST_ANCHOR"),
            Self::NetworkMonitor => write!(f, "NETWORK_MONITOR"),
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TRUSTEE" | "0" => Ok(Self::Trustee),
            "STEWARD" | "2" => Ok(Self::Steward),
            "TRUST_ANCHOR" | "ENDORSER" | "101" => Ok(Self::TrustAnchor),
            "NETWORK_MONITOR" | "201" => Ok(Self::NetworkMonitor),
            other => Err(CoreError::InvalidRole(other.to_string())),
        }
    }
}
