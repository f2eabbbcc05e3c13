// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated symmetric encryption (XChaCha20-Poly1305).
//!
//! Identity-bearing bundles (the relay grant `C`, the device grant `Ci`, the
//! concealed identity `C2` and the resynchronisation payload) are sealed with
//! this AEAD under a derived session key. A random 24-byte nonce is prepended
//! to the ciphertext.
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use thiserror::Error;

use crate::crypto::rng::{Rng, RngError};

/// Size of the XChaCha20-Poly1305 nonce prefix.
pub const NONCE_SIZE: usize = 24;

/// Encrypts `plaintext` under the given 32-byte key, returning `nonce ‖
/// ciphertext`.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8], rng: &Rng) -> Result<Vec<u8>, AeadError> {
    let nonce_bytes: [u8; NONCE_SIZE] = rng.random_array()?;
    let nonce = XNonce::from(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.into());
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| AeadError::Encrypt)?;
    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a `nonce ‖ ciphertext` payload produced by [`encrypt`].
///
/// Fails when the payload is truncated, was sealed under a different key or
/// was tampered with.
pub fn decrypt(key: &[u8; 32], bytes: &[u8]) -> Result<Vec<u8>, AeadError> {
    if bytes.len() < NONCE_SIZE {
        return Err(AeadError::TooShort(bytes.len()));
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher.decrypt(nonce, ciphertext).map_err(|_| AeadError::Decrypt)
}

#[derive(Debug, Error)]
pub enum AeadError {
    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("could not encrypt payload")]
    Encrypt,

    #[error("could not decrypt payload, wrong key or tampered ciphertext")]
    Decrypt,

    #[error("payload of {0} bytes is too short to carry a nonce")]
    TooShort(usize),
}
