//! Payload encryption with XChaCha20-Poly1305.
//!
//! Ciphertexts are laid out as `nonce (24 bytes) || sealed payload`, so a
//! record carries everything needed to open it except the key.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::PersistError;

const NONCE_LEN: usize = 24;

/// Domain separator mixed into key derivation.
const KEY_CONTEXT: &[u8] = b"statekeep/payload-key/v1";

/// Store-wide 256-bit secret.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the key from the installation identity.
    pub fn derive(identity: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_CONTEXT);
        hasher.update(identity.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Seal `plaintext` under a fresh random nonce.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>, PersistError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| PersistError::Encrypt(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a payload produced by [`encrypt`]. Fails on a wrong key or tampering.
pub fn decrypt(key: &SecretKey, data: &[u8]) -> Result<Vec<u8>, PersistError> {
    if data.len() < NONCE_LEN {
        return Err(PersistError::Decrypt(format!(
            "payload too short: {} bytes",
            data.len()
        )));
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(XNonce::from_slice(nonce), sealed)
        .map_err(|e| PersistError::Decrypt(e.to_string()))
}
