// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-derivation formulas shared by the three roles.
//!
//! Challenger and responder must arrive at bit-identical values, so every
//! formula lives here exactly once and both sides call the same function
//! with their own copy of the key material. Within one authentication run
//! the full vector is computed and verified before any derived key is used
//! on a later message.
use skylark_core::{TemporaryId, Timestamp};
use subtle::ConstantTimeEq;

use crate::crypto::aka::{f2, f3, f4, MAC_SIZE};
use crate::crypto::kdf::kdf;
use crate::keys::{GroupKey, LongTermKey, SessionKey};

/// Authentication vector derived from a long-term key and a challenge.
pub(crate) struct AuthVector {
    /// Session key `KRAN = kdf(CK ‖ IK, "KRAN")`.
    pub kran: SessionKey,
    /// Expected response `RES* = kdf(CK ‖ IK, SNN ‖ R ‖ RES)`.
    pub res_star: [u8; MAC_SIZE],
}

/// Derives CK, IK and RES from `(key, r)` and folds them into the session
/// key and expected response for one authentication run.
pub(crate) fn auth_vector(key: &LongTermKey, r: &[u8; 32], serving_network: &str) -> AuthVector {
    let ck = f3(key.as_bytes(), r);
    let ik = f4(key.as_bytes(), r);
    let res = f2(key.as_bytes(), r);
    let mut ck_ik = [0u8; MAC_SIZE * 2];
    ck_ik[..MAC_SIZE].copy_from_slice(&ck);
    ck_ik[MAC_SIZE..].copy_from_slice(&ik);
    AuthVector {
        kran: SessionKey::from(kdf(&ck_ik, &[b"KRAN"])),
        res_star: kdf(&ck_ik, &[serving_network.as_bytes(), r, &res]),
    }
}

/// `HRES* = kdf(KRAN, C ‖ RES*)` — the hashed expected response sent on the
/// wire instead of the raw one.
pub(crate) fn hashed_response(kran: &SessionKey, c: &[u8], res_star: &[u8; MAC_SIZE]) -> [u8; MAC_SIZE] {
    kdf(kran.as_bytes(), &[c, res_star])
}

/// `MSK = kdf(R, "MSK")` — conceals the permanent identity inside the SUCI;
/// derivable from the challenge alone since the anchor has to open the
/// identity field before it can look up any key.
pub(crate) fn masking_key(r: &[u8; 32]) -> SessionKey {
    SessionKey::from(kdf(r, &[b"MSK"]))
}

/// `KUAVi = kdf(KRANi, TIDi ‖ TIDj)` — the device↔relay session key.
pub(crate) fn relay_device_key(
    kran: &SessionKey,
    device_tid: &TemporaryId,
    relay_tid: &TemporaryId,
) -> SessionKey {
    SessionKey::from(kdf(kran.as_bytes(), &[device_tid.as_ref(), relay_tid.as_ref()]))
}

/// `TGKi = kdf(GKUAV, TIDi ‖ TST)` — the temporary group key inside a
/// handover token. Any relay holding the live group key can recompute it;
/// a superseded group key diverges here and the handover MAC check fails.
pub(crate) fn temporary_group_key(
    group_key: &GroupKey,
    device_tid: &TemporaryId,
    expires_at: Timestamp,
) -> SessionKey {
    SessionKey::from(kdf(
        group_key.as_bytes(),
        &[device_tid.as_ref(), &expires_at.to_be_bytes()],
    ))
}

/// `MACi = kdf(TGKi, TID*j ‖ TIDi ‖ R1)` — the device's proof towards the
/// target relay.
pub(crate) fn handover_mac(
    tgk: &SessionKey,
    target_tid: &TemporaryId,
    device_tid: &TemporaryId,
    r1: &[u8; 32],
) -> [u8; MAC_SIZE] {
    kdf(tgk.as_bytes(), &[target_tid.as_ref(), device_tid.as_ref(), r1])
}

/// `RESi = kdf(TGKi, TID*j ‖ TIDi ‖ R1 ‖ R2)`.
pub(crate) fn handover_response(
    tgk: &SessionKey,
    target_tid: &TemporaryId,
    device_tid: &TemporaryId,
    r1: &[u8; 32],
    r2: &[u8; 32],
) -> [u8; MAC_SIZE] {
    kdf(
        tgk.as_bytes(),
        &[target_tid.as_ref(), device_tid.as_ref(), r1, r2],
    )
}

/// `HRESi = kdf(RESi ‖ R2)` — hides the raw response until the device has
/// authenticated the relay.
pub(crate) fn hashed_handover_response(res: &[u8; MAC_SIZE], r2: &[u8; 32]) -> [u8; MAC_SIZE] {
    kdf(res, &[r2])
}

/// `K*UAVi = kdf(TGKi, TID*j ‖ TIDi)` — the fresh device↔relay key after a
/// completed handover.
pub(crate) fn handover_relay_device_key(
    tgk: &SessionKey,
    target_tid: &TemporaryId,
    device_tid: &TemporaryId,
) -> SessionKey {
    SessionKey::from(kdf(tgk.as_bytes(), &[target_tid.as_ref(), device_tid.as_ref()]))
}

/// Constant-time tag comparison.
pub(crate) fn tags_match(a: &[u8; MAC_SIZE], b: &[u8; MAC_SIZE]) -> bool {
    bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use crate::keys::LongTermKey;

    use super::{auth_vector, hashed_response, tags_match};

    #[test]
    fn identical_inputs_identical_vectors() {
        let key = LongTermKey::from_passphrase("UAV_KEY_1");
        let r = [0x01; 32];
        let a = auth_vector(&key, &r, "TestNet");
        let b = auth_vector(&key, &r, "TestNet");
        assert_eq!(a.kran, b.kran);
        assert!(tags_match(&a.res_star, &b.res_star));
    }

    #[test]
    fn key_mismatch_diverges() {
        let r = [0x01; 32];
        let a = auth_vector(&LongTermKey::from_passphrase("UAV_KEY_1"), &r, "TestNet");
        let b = auth_vector(&LongTermKey::from_passphrase("UAV_KEY_2"), &r, "TestNet");
        assert!(!tags_match(&a.res_star, &b.res_star));
        assert!(!tags_match(
            &hashed_response(&a.kran, b"c", &a.res_star),
            &hashed_response(&b.kran, b"c", &b.res_star),
        ));
    }
}
