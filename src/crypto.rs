use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// Derive a 32-byte AES key from the configured master key string.
fn derive_key(master_key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(master_key.as_bytes());
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Seal provider credentials with AES-256-GCM. Output layout: nonce || ciphertext.
pub fn seal(plaintext: &[u8], master_key: &str) -> Result<Vec<u8>, String> {
    let cipher = Aes256Gcm::new_from_slice(&derive_key(master_key))
        .map_err(|e| format!("Key init error: {e}"))?;

    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| format!("Encryption error: {e}"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a blob produced by `seal`.
pub fn unseal(sealed: &[u8], master_key: &str) -> Result<Vec<u8>, String> {
    if sealed.len() <= NONCE_LEN {
        return Err("Sealed blob too short".into());
    }

    let cipher = Aes256Gcm::new_from_slice(&derive_key(master_key))
        .map_err(|e| format!("Key init error: {e}"))?;

    let nonce = Nonce::from_slice(&sealed[..NONCE_LEN]);
    cipher
        .decrypt(nonce, &sealed[NONCE_LEN..])
        .map_err(|e| format!("Decryption error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_unseal_roundtrip() {
        let key = "costops-master-key";
        let plaintext = br#"{"tenant_id":"t","client_id":"c"}"#;
        let sealed = seal(plaintext, key).unwrap();
        let opened = unseal(&sealed, key).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_unseal_wrong_key_fails() {
        let sealed = seal(b"secret", "key-a").unwrap();
        assert!(unseal(&sealed, "key-b").is_err());
    }

    #[test]
    fn test_unseal_truncated_fails() {
        assert!(unseal(&[0u8; 8], "key").is_err());
    }
}
