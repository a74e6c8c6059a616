use rand::RngCore;

/// Encode a raw attribute value for signing.
///
/// Values that parse as a 32-bit signed integer encode to themselves; all
/// others encode to the decimal form of the first 16 bytes of their BLAKE3
/// digest.
pub fn encode_attribute(raw: &str) -> String {
    if let Ok(n) = raw.trim().parse::<i32>() {
        return n.to_string();
    }
    let digest = blake3::hash(raw.as_bytes());
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest.as_bytes()[..16]);
    u128::from_be_bytes(prefix).to_string()
}

/// Generate an 80-bit decimal nonce for proof requests and credential offers.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let value = u128::from_be_bytes(bytes) >> 48;
    value.to_string()
}
