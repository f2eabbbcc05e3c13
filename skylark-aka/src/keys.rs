// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key material newtypes used across the three roles.
use serde::{Deserialize, Serialize};

use crate::crypto::{Rng, RngError, Secret};

/// Size of long-term, session and group keys.
pub const KEY_SIZE: usize = 32;

/// Long-term subscription secret bound 1:1 to a permanent identity at
/// provisioning time.
///
/// One copy lives with the subscriber (device or relay), the other in the
/// anchor's subscriber store. It is only ever fed into the `f`-function
/// family and the KDF; it never travels on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LongTermKey(Secret<KEY_SIZE>);

impl LongTermKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Secret::from_bytes(bytes))
    }

    /// Derives a provisioning key from a passphrase-style secret, for
    /// fixtures and demos where keys are written out as strings.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(Secret::from_bytes(crate::crypto::sha2::sha2_256(&[
            b"ltk",
            passphrase.as_bytes(),
        ])))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

/// Key derived during one authentication run (KRAN, KRANi, KUAVi, TGKi and
/// friends).
///
/// Scoped to the session that produced it and superseded by every new run;
/// never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKey(Secret<KEY_SIZE>);

impl SessionKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

impl From<[u8; KEY_SIZE]> for SessionKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Secret::from_bytes(bytes))
    }
}

/// Group key shared by the anchor and every relay that completed service
/// authentication.
///
/// Exactly one group key is live per anchor at a time. Handover tokens are
/// derived from it; a token minted under a superseded group key simply fails
/// recomputation at the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupKey(Secret<KEY_SIZE>);

impl GroupKey {
    pub(crate) fn generate(rng: &Rng) -> Result<Self, RngError> {
        Ok(Self(Secret::from_bytes(rng.random_array()?)))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.0.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::LongTermKey;

    #[test]
    fn passphrase_keys_are_stable_and_distinct() {
        assert_eq!(
            LongTermKey::from_passphrase("UAV_KEY_1"),
            LongTermKey::from_passphrase("UAV_KEY_1")
        );
        assert_ne!(
            LongTermKey::from_passphrase("UAV_KEY_1"),
            LongTermKey::from_passphrase("UAV_KEY_2")
        );
    }
}
