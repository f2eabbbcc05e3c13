// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key encapsulation over X25519.
//!
//! The protocol only relies on the KEM call contract — `generate_key_pair`,
//! `encapsulate`, `decapsulate` with both sides arriving at the same shared
//! secret — so this Diffie-Hellman instantiation can be swapped for a
//! lattice-based one without touching any role code. The ciphertext is an
//! ephemeral public key; the shared secret is the HKDF of the raw
//! Diffie-Hellman output bound to both public keys.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto::kdf::kdf;
use crate::crypto::rng::{Rng, RngError};
use crate::crypto::secret::Secret;

/// Size of encapsulation keys, ciphertexts and shared secrets.
pub const KEM_KEY_SIZE: usize = 32;

/// Public encapsulation key of the anchor, provisioned into every device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncapsulationKey(#[serde(with = "serde_bytes")] [u8; KEM_KEY_SIZE]);

impl EncapsulationKey {
    pub fn as_bytes(&self) -> &[u8; KEM_KEY_SIZE] {
        &self.0
    }
}

/// Secret decapsulation key held by the anchor.
#[derive(Clone, Debug)]
pub struct DecapsulationKey(Secret<KEM_KEY_SIZE>);

/// Wire form of an encapsulation: the ephemeral public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KemCiphertext(#[serde(with = "serde_bytes")] [u8; KEM_KEY_SIZE]);

/// Shared secret agreed between encapsulator and decapsulator.
///
/// In the device authentication phase this doubles as the per-attempt
/// challenge `R`: the device learns it at encapsulation time, the anchor
/// recovers it by decapsulating `C1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedSecret(Secret<KEM_KEY_SIZE>);

impl SharedSecret {
    pub(crate) fn as_bytes(&self) -> &[u8; KEM_KEY_SIZE] {
        self.0.as_bytes()
    }
}

/// Generates a fresh decapsulation/encapsulation key pair.
pub fn generate_key_pair(rng: &Rng) -> Result<(DecapsulationKey, EncapsulationKey), KemError> {
    let secret = StaticSecret::from(rng.random_array::<KEM_KEY_SIZE>()?);
    let public = PublicKey::from(&secret);
    Ok((
        DecapsulationKey(Secret::from_bytes(secret.to_bytes())),
        EncapsulationKey(public.to_bytes()),
    ))
}

/// Encapsulates towards `ek`, returning the ciphertext to send and the local
/// copy of the shared secret.
pub fn encapsulate(
    ek: &EncapsulationKey,
    rng: &Rng,
) -> Result<(KemCiphertext, SharedSecret), KemError> {
    let ephemeral = StaticSecret::from(rng.random_array::<KEM_KEY_SIZE>()?);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let dh = ephemeral.diffie_hellman(&PublicKey::from(*ek.as_bytes()));
    if !dh.was_contributory() {
        return Err(KemError::NonContributoryKey);
    }
    let secret = derive_shared_secret(dh.as_bytes(), &ephemeral_public.to_bytes(), ek.as_bytes());
    Ok((KemCiphertext(ephemeral_public.to_bytes()), secret))
}

/// Recovers the shared secret from a ciphertext using the decapsulation key.
pub fn decapsulate(dk: &DecapsulationKey, ct: &KemCiphertext) -> Result<SharedSecret, KemError> {
    let secret = StaticSecret::from(*dk.0.as_bytes());
    let public = PublicKey::from(&secret);
    let dh = secret.diffie_hellman(&PublicKey::from(ct.0));
    if !dh.was_contributory() {
        return Err(KemError::NonContributoryKey);
    }
    Ok(derive_shared_secret(dh.as_bytes(), &ct.0, &public.to_bytes()))
}

fn derive_shared_secret(
    dh: &[u8; KEM_KEY_SIZE],
    ephemeral: &[u8; KEM_KEY_SIZE],
    recipient: &[u8; KEM_KEY_SIZE],
) -> SharedSecret {
    SharedSecret(Secret::from_bytes(kdf(dh, &[b"kem", ephemeral, recipient])))
}

#[derive(Debug, Error)]
pub enum KemError {
    #[error(transparent)]
    Rng(#[from] RngError),

    #[error("peer public key is non-contributory")]
    NonContributoryKey,
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;

    use super::{decapsulate, encapsulate, generate_key_pair};

    #[test]
    fn both_sides_agree() {
        let rng = Rng::from_seed([1; 32]);
        let (dk, ek) = generate_key_pair(&rng).unwrap();
        let (ct, secret) = encapsulate(&ek, &rng).unwrap();
        assert_eq!(decapsulate(&dk, &ct).unwrap(), secret);
    }

    #[test]
    fn wrong_key_disagrees() {
        let rng = Rng::from_seed([1; 32]);
        let (_, ek) = generate_key_pair(&rng).unwrap();
        let (other_dk, _) = generate_key_pair(&rng).unwrap();
        let (ct, secret) = encapsulate(&ek, &rng).unwrap();
        assert_ne!(decapsulate(&other_dk, &ct).unwrap(), secret);
    }
}
