use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

use verinym_core::{Did, Verkey};

use crate::error::CryptoError;

/// Ed25519 key pair behind a DID.
/// Private key material is zeroized on drop by ed25519-dalek.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random key pair using OS-provided entropy.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create a key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Create a key pair from a 32-character seed string such as
    /// `000000000000000000000000Steward1`.
    pub fn from_seed_str(seed: &str) -> Result<Self, CryptoError> {
        let mut bytes: [u8; 32] = seed.as_bytes().try_into().map_err(|_| {
            CryptoError::InvalidSeed(format!("seed must be 32 bytes, got {}", seed.len()))
        })?;
        let kp = Self::from_seed(&bytes);
        bytes.zeroize();
        Ok(kp)
    }

    /// Create a key pair from raw secret bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(bytes);
        let kp = Self::from_seed(&seed);
        seed.zeroize();
        Ok(kp)
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Base58 verkey of this key pair.
    pub fn verkey(&self) -> Verkey {
        self.public_key().verkey()
    }

    /// Unqualified DID derived from the verkey.
    pub fn did(&self) -> Did {
        Did::from_verkey_bytes(self.public_key().as_bytes())
    }

    /// Raw private key bytes (32 bytes), used when sealing into a wallet.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// X25519 secret matching the birational image of the verkey.
    pub(crate) fn x25519_secret(&self) -> StaticSecret {
        StaticSecret::from(self.signing_key.to_scalar_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("verkey", &self.verkey().as_str())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key for verification and key agreement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Create from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        let verifying_key = VerifyingKey::from_bytes(&bytes_arr)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid public key: {}", e)))?;
        Ok(Self { verifying_key })
    }

    /// Decode a base58 verkey.
    pub fn from_verkey(verkey: &Verkey) -> Result<Self, CryptoError> {
        Self::from_bytes(&verkey.to_bytes()?)
    }

    /// Get the raw bytes (32 bytes).
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.verifying_key.as_bytes()
    }

    /// Encode as a base58 verkey.
    pub fn verkey(&self) -> Verkey {
        Verkey::from_bytes(self.as_bytes())
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// X25519 public key obtained by mapping the Edwards point to Montgomery form.
    pub(crate) fn x25519_public(&self) -> X25519PublicKey {
        X25519PublicKey::from(self.verifying_key.to_montgomery().to_bytes())
    }
}
