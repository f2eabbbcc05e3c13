// SPDX-License-Identifier: MIT OR Apache-2.0

//! The f1/f1*/f2/f3/f4 authentication function family.
//!
//! These fill the roles the MILENAGE set defines for cellular AKA — network
//! authentication code (f1), resynchronisation code (f1*), signed response
//! (f2), confidentiality key (f3) and integrity key (f4) — instantiated over
//! HMAC-SHA-256 with a one-byte domain-separation prefix per function
//! instead of the AES-based construction. All outputs are 32 bytes wide.
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::crypto::kdf::KDF_OUTPUT_SIZE;

/// Size of message authentication codes.
pub const MAC_SIZE: usize = KDF_OUTPUT_SIZE;

/// Size of the authentication management field.
pub const AMF_SIZE: usize = 2;

type HmacSha256 = Hmac<Sha256>;

fn prf(key: &[u8], domain: u8, parts: &[&[u8]]) -> [u8; MAC_SIZE] {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(&[domain]);
    for part in parts {
        mac.update(part);
    }
    let digest = mac.finalize().into_bytes();
    digest[..].try_into().expect("hmac-sha256 digest size")
}

/// f1: network authentication code MAC-A over SQN, challenge and AMF.
pub fn f1(key: &[u8], sqn: u64, rand: &[u8], amf: &[u8; AMF_SIZE]) -> [u8; MAC_SIZE] {
    prf(key, 0x01, &[&sqn.to_be_bytes(), rand, amf])
}

/// f1*: resynchronisation authentication code MAC-S over the corrected SQN,
/// challenge and AMF.
pub fn f1_star(key: &[u8], sqn: u64, rand: &[u8], amf: &[u8; AMF_SIZE]) -> [u8; MAC_SIZE] {
    prf(key, 0x11, &[&sqn.to_be_bytes(), rand, amf])
}

/// f2: signed response RES.
pub fn f2(key: &[u8], rand: &[u8]) -> [u8; MAC_SIZE] {
    prf(key, 0x02, &[rand])
}

/// f3: confidentiality key CK.
pub fn f3(key: &[u8], rand: &[u8]) -> [u8; MAC_SIZE] {
    prf(key, 0x03, &[rand])
}

/// f4: integrity key IK.
pub fn f4(key: &[u8], rand: &[u8]) -> [u8; MAC_SIZE] {
    prf(key, 0x04, &[rand])
}

#[cfg(test)]
mod tests {
    use super::{f1, f1_star, f2, f3, f4};

    #[test]
    fn functions_are_domain_separated() {
        let key = [9u8; 32];
        let rand = [1u8; 32];
        let outputs = [
            f1(&key, 1, &rand, &[0, 0]),
            f1_star(&key, 1, &rand, &[0, 0]),
            f2(&key, &rand),
            f3(&key, &rand),
            f4(&key, &rand),
        ];
        for (i, a) in outputs.iter().enumerate() {
            for b in outputs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn mac_depends_on_every_input() {
        let base = f1(&[9u8; 32], 7, &[1u8; 32], &[0, 0]);
        assert_ne!(base, f1(&[8u8; 32], 7, &[1u8; 32], &[0, 0]));
        assert_ne!(base, f1(&[9u8; 32], 8, &[1u8; 32], &[0, 0]));
        assert_ne!(base, f1(&[9u8; 32], 7, &[2u8; 32], &[0, 0]));
        assert_ne!(base, f1(&[9u8; 32], 7, &[1u8; 32], &[0, 1]));
    }
}
