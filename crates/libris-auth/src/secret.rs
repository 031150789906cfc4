//! AES-256-GCM encryption of catalog secrets at rest.
//!
//! Format: base64(nonce || ciphertext || auth_tag)

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CredentialError;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Required key length (256 bits).
pub const KEY_SIZE: usize = 32;

fn cipher(key: &[u8]) -> Result<Aes256Gcm, CredentialError> {
    if key.len() != KEY_SIZE {
        return Err(CredentialError::EncryptionFailed(format!(
            "Invalid key length: expected {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| CredentialError::EncryptionFailed(e.to_string()))
}

/// Encrypt a catalog secret for storage.
pub fn encrypt_secret(plaintext: &str, key: &[u8]) -> Result<String, CredentialError> {
    let cipher = cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CredentialError::EncryptionFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&result))
}

/// Decrypt a stored catalog secret.
pub fn decrypt_secret(encoded: &str, key: &[u8]) -> Result<String, CredentialError> {
    let cipher = cipher(key)?;

    let encrypted = BASE64
        .decode(encoded)
        .map_err(|e| CredentialError::EncryptionFailed(format!("Base64 decode failed: {e}")))?;

    if encrypted.len() < NONCE_SIZE + 1 {
        return Err(CredentialError::EncryptionFailed(
            "Invalid encrypted data format".to_string(),
        ));
    }

    let nonce = Nonce::from_slice(&encrypted[..NONCE_SIZE]);
    let plaintext = cipher
        .decrypt(nonce, &encrypted[NONCE_SIZE..])
        .map_err(|e| CredentialError::EncryptionFailed(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| CredentialError::EncryptionFailed(e.to_string()))
}

/// Parse a hex-encoded 256-bit key.
pub fn parse_key(hex_key: &str) -> Result<Vec<u8>, CredentialError> {
    let key = hex::decode(hex_key.trim())
        .map_err(|e| CredentialError::Configuration(format!("Encryption key is not hex: {e}")))?;
    if key.len() != KEY_SIZE {
        return Err(CredentialError::Configuration(format!(
            "Encryption key must be {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    Ok(key)
}
