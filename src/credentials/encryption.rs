//! AES-256-GCM sealing of stored secrets.
//!
//! Every secret column (client secret, access token, refresh token) is
//! sealed independently with a fresh random nonce. The sealed form is a
//! single base64 string carrying `nonce || ciphertext`, so the database
//! schema needs one column per secret. The master key comes from an
//! environment variable and never touches disk.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Master key size in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Decode and length-check a base64-encoded master key.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64)
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Seal a secret with AES-256-GCM under a fresh random nonce.
///
/// Returns base64 of `nonce || ciphertext`. Nonces are never reused and
/// the tag authenticates the ciphertext, so tampering is detected on
/// [`unseal`].
pub fn seal(plaintext: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&sealed))
}

/// Reverse of [`seal`]: decode, split off the nonce, decrypt, verify.
pub fn unseal(sealed: &str, key: &[u8]) -> Result<String> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }

    let sealed_bytes = BASE64
        .decode(sealed)
        .context("Failed to decode sealed secret")?;

    if sealed_bytes.len() <= NONCE_SIZE {
        return Err(anyhow!(
            "Sealed secret too short: expected more than {} bytes, got {}",
            NONCE_SIZE,
            sealed_bytes.len()
        ));
    }

    let (nonce_bytes, ciphertext) = sealed_bytes.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext).context("Decrypted secret is not valid UTF-8")
}
