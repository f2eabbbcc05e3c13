// SPDX-License-Identifier: MIT OR Apache-2.0

//! HKDF-SHA-256 key derivation.
//!
//! Every derived key in the protocol comes out of this single function with
//! explicit context parts, so two derivations are equal exactly when their
//! key material and full context agree.
use hkdf::Hkdf;
use sha2::Sha256;

/// Size of all derived keys, expected responses and keyed digests.
pub const KDF_OUTPUT_SIZE: usize = 32;

/// Derives 32 bytes from input key material and a sequence of context parts.
///
/// The parts are concatenated in order into the HKDF `info` input; callers
/// are responsible for using unambiguous part layouts (fixed sizes or
/// self-delimiting encodings).
pub fn kdf(key: &[u8], parts: &[&[u8]]) -> [u8; KDF_OUTPUT_SIZE] {
    let hkdf = Hkdf::<Sha256>::new(None, key);
    let info: Vec<u8> = parts.concat();
    let mut out = [0u8; KDF_OUTPUT_SIZE];
    hkdf.expand(&info, &mut out)
        .expect("32 bytes is a valid hkdf output length");
    out
}
