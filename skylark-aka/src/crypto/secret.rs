// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

/// Generic container for sensitive bytes with best-effort security measures.
///
/// In particular this implementation provides:
/// 1. Zeroise memory on drop.
/// 2. Crate-private byte access, preventing misuse from the outside.
/// 3. Redacted output when printing debug info.
/// 4. Constant-time comparison to prevent timing attacks.
///
/// This is a "best-effort" attempt, since side-channels are ultimately a
/// property of a deployed cryptographic system including the hardware it runs
/// on, not just of software.
#[derive(Clone, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct Secret<const N: usize>(#[serde(with = "serde_bytes")] [u8; N]);

impl<const N: usize> Secret<N> {
    pub(crate) fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> PartialEq for Secret<N> {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison.
        bool::from(self.0.ct_eq(&other.0))
    }
}

impl<const N: usize> fmt::Debug for Secret<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret").field("value", &"***").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Secret;

    #[test]
    fn debug_output_is_redacted() {
        let secret = Secret::from_bytes([42u8; 32]);
        let out = format!("{secret:?}");
        assert!(!out.contains("42"));
    }

    #[test]
    fn comparison() {
        assert_eq!(Secret::from_bytes([7u8; 16]), Secret::from_bytes([7u8; 16]));
        assert_ne!(Secret::from_bytes([7u8; 16]), Secret::from_bytes([8u8; 16]));
    }
}
