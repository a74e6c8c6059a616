pub mod encoding;
pub mod encryption;
pub mod error;
pub mod hashing;
pub mod kdf;
pub mod keys;
pub mod signing;

pub use encoding::{encode_attribute, generate_nonce};
pub use encryption::{anon_crypt, anon_decrypt, auth_crypt, auth_decrypt, EncryptedPayload};
pub use error::CryptoError;
pub use hashing::{hash, merkle_path, merkle_root, verify_merkle_path, Hash, MerkleStep};
pub use kdf::{derive_key, hash_passphrase, verify_passphrase};
pub use keys::{KeyPair, PublicKey};
pub use signing::{sign, verify, Signature};
