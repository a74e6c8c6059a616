//! Anonymous and authenticated encryption between DID keys.
//!
//! Both schemes key ChaCha20-Poly1305 from an X25519 agreement on the
//! Montgomery form of the parties' Ed25519 keys. Anoncrypt uses a fresh
//! ephemeral sender key; authcrypt agrees on the sender's static key and
//! then anoncrypts the result so the sender's verkey is only visible to the
//! recipient.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

const ANONCRYPT_CONTEXT: &str = "verinym 2024 anoncrypt v1";
const AUTHCRYPT_CONTEXT: &str = "verinym 2024 authcrypt v1";

/// Encrypted payload: ephemeral public key, nonce, and ciphertext.
#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    /// Ephemeral X25519 public key used for key exchange.
    pub ephemeral_pubkey: [u8; 32],
    /// 12-byte nonce for ChaCha20-Poly1305.
    pub nonce: [u8; 12],
    /// Encrypted data (ciphertext + 16-byte Poly1305 tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Serialize to bytes: ephemeral_pubkey (32) + nonce (12) + ciphertext (variable).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + 12 + self.ciphertext.len());
        out.extend_from_slice(&self.ephemeral_pubkey);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < 44 + 16 {
            return Err(CryptoError::DecryptionError("payload too short".into()));
        }
        let mut ephemeral_pubkey = [0u8; 32];
        ephemeral_pubkey.copy_from_slice(&bytes[..32]);
        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&bytes[32..44]);
        Ok(Self {
            ephemeral_pubkey,
            nonce,
            ciphertext: bytes[44..].to_vec(),
        })
    }
}

fn symmetric_key(context: &str, shared: &[u8; 32], first: &[u8; 32], second: &[u8; 32]) -> [u8; 32] {
    let mut material = Vec::with_capacity(96);
    material.extend_from_slice(shared);
    material.extend_from_slice(first);
    material.extend_from_slice(second);
    blake3::derive_key(context, &material)
}

fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<([u8; 12], Vec<u8>), CryptoError> {
    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::EncryptionError(format!("cipher init failed: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::EncryptionError(format!("encryption failed: {}", e)))?;
    Ok((nonce_bytes, ciphertext))
}

fn open(key: &[u8; 32], nonce: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| CryptoError::DecryptionError(format!("cipher init failed: {}", e)))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::DecryptionError(format!("decryption failed: {}", e)))
}

/// Encrypt for a recipient without revealing or authenticating the sender.
pub fn anon_crypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut ephemeral_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut ephemeral_bytes);
    let ephemeral_secret = StaticSecret::from(ephemeral_bytes);
    let ephemeral_pubkey = X25519PublicKey::from(&ephemeral_secret);

    let recipient_x25519 = recipient.x25519_public();
    let shared = ephemeral_secret.diffie_hellman(&recipient_x25519);
    let key = symmetric_key(
        ANONCRYPT_CONTEXT,
        shared.as_bytes(),
        ephemeral_pubkey.as_bytes(),
        recipient_x25519.as_bytes(),
    );
    let (nonce, ciphertext) = seal(&key, plaintext)?;

    Ok(EncryptedPayload {
        ephemeral_pubkey: ephemeral_pubkey.to_bytes(),
        nonce,
        ciphertext,
    }
    .to_bytes())
}

/// Decrypt an anoncrypted message with the recipient's key pair.
pub fn anon_decrypt(recipient: &KeyPair, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let payload = EncryptedPayload::from_bytes(message)?;
    let secret = recipient.x25519_secret();
    let recipient_x25519 = X25519PublicKey::from(&secret);
    let ephemeral_pubkey = X25519PublicKey::from(payload.ephemeral_pubkey);
    let shared = secret.diffie_hellman(&ephemeral_pubkey);
    let key = symmetric_key(
        ANONCRYPT_CONTEXT,
        shared.as_bytes(),
        &payload.ephemeral_pubkey,
        recipient_x25519.as_bytes(),
    );
    open(&key, &payload.nonce, &payload.ciphertext)
}

/// Encrypt so that only `recipient` can read the message and can verify it
/// came from `sender`.
pub fn auth_crypt(
    sender: &KeyPair,
    recipient: &PublicKey,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let sender_secret = sender.x25519_secret();
    let sender_x25519 = X25519PublicKey::from(&sender_secret);
    let recipient_x25519 = recipient.x25519_public();
    let shared = sender_secret.diffie_hellman(&recipient_x25519);
    let key = symmetric_key(
        AUTHCRYPT_CONTEXT,
        shared.as_bytes(),
        sender_x25519.as_bytes(),
        recipient_x25519.as_bytes(),
    );
    let (nonce, ciphertext) = seal(&key, plaintext)?;

    let mut inner = Vec::with_capacity(32 + 12 + ciphertext.len());
    inner.extend_from_slice(sender.public_key().as_bytes());
    inner.extend_from_slice(&nonce);
    inner.extend_from_slice(&ciphertext);
    anon_crypt(recipient, &inner)
}

/// Decrypt an authcrypted message, returning the sender's key and the plaintext.
pub fn auth_decrypt(
    recipient: &KeyPair,
    message: &[u8],
) -> Result<(PublicKey, Vec<u8>), CryptoError> {
    let inner = anon_decrypt(recipient, message)?;
    if inner.len() < 32 + 12 + 16 {
        return Err(CryptoError::DecryptionError(
            "authcrypted envelope too short".into(),
        ));
    }
    let sender = PublicKey::from_bytes(&inner[..32])?;
    let mut nonce = [0u8; 12];
    nonce.copy_from_slice(&inner[32..44]);

    let secret = recipient.x25519_secret();
    let recipient_x25519 = X25519PublicKey::from(&secret);
    let sender_x25519 = sender.x25519_public();
    let shared = secret.diffie_hellman(&sender_x25519);
    let key = symmetric_key(
        AUTHCRYPT_CONTEXT,
        shared.as_bytes(),
        sender_x25519.as_bytes(),
        recipient_x25519.as_bytes(),
    );
    let plaintext = open(&key, &nonce, &inner[44..])?;
    Ok((sender, plaintext))
}
