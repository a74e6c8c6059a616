use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::CryptoError;

/// Derive a 32-byte sealing key from a wallet passphrase and salt using Argon2id.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivationError(format!("argon2 derive failed: {}", e)))?;
    Ok(key)
}

/// Hash a passphrase into a PHC string for later verification.
pub fn hash_passphrase(passphrase: &[u8]) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(passphrase, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::KeyDerivationError(format!("argon2 hash failed: {}", e)))
}

/// Verify a passphrase against a stored Argon2id hash.
pub fn verify_passphrase(passphrase: &[u8], hash_str: &str) -> Result<bool, CryptoError> {
    let parsed_hash = argon2::PasswordHash::new(hash_str)
        .map_err(|e| CryptoError::KeyDerivationError(format!("invalid hash format: {}", e)))?;

    match Argon2::default().verify_password(passphrase, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::KeyDerivationError(format!(
            "verification error: {}",
            e
        ))),
    }
}
