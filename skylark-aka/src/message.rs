// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes exchanged between the three roles.
//!
//! The crate assumes reliable, ordered delivery between adjacent roles
//! (device ↔ relay, relay ↔ anchor) and specifies no framing beyond these
//! fields; the orchestration layer decides how they travel. Everything here
//! is CBOR-serializable. Fields named `c`/`ci`/`c2` are AEAD payloads whose
//! plaintexts are the grant structs below.
use serde::{Deserialize, Serialize};
use skylark_core::{DeviceId, RelayId, TemporaryId, Timestamp};

use crate::crypto::aka::MAC_SIZE;
use crate::crypto::kem::KemCiphertext;
use crate::keys::{GroupKey, SessionKey};
use crate::token::Token;

/// Anchor → relay: service authentication challenge `(HRES*, C, R)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthChallenge {
    /// Hashed expected response; the relay authenticates the anchor by
    /// recomputing it from its own long-term key.
    pub hres_star: [u8; MAC_SIZE],
    /// Relay grant sealed under KRAN.
    #[serde(with = "serde_bytes")]
    pub c: Vec<u8>,
    /// Fresh anchor challenge.
    pub r: [u8; 32],
}

/// Relay → anchor: bare confirmation that the challenge verified.
///
/// Carries no cryptographic proof; the anchor takes it on trust of the
/// transport.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RelayConfirmation {
    pub relay_id: RelayId,
}

/// Plaintext of the `c` payload in [`AuthChallenge`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayGrant {
    pub tid: TemporaryId,
    pub group_key: GroupKey,
}

/// Concealed identity payload a device sends to begin authentication.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suci {
    /// KEM encapsulation towards the anchor; carries the per-attempt
    /// challenge.
    pub c1: KemCiphertext,
    /// Permanent identity and sequence number, sealed under the
    /// encapsulation-derived key.
    #[serde(with = "serde_bytes")]
    pub c2: Vec<u8>,
    /// `f1` code over SQN, challenge and AMF under the device's long-term
    /// key.
    pub mac: [u8; MAC_SIZE],
}

/// Plaintext of the `c2` payload in [`Suci`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConcealedIdentity {
    pub supi: skylark_core::Supi,
    pub sqn: u64,
}

/// Relay → anchor: a device authentication request tagged with the relay's
/// temporary identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthRequest {
    pub device: DeviceId,
    pub suci: Suci,
    pub relay_tid: TemporaryId,
}

/// Anchor → relay: outcome of a device authentication request.
///
/// Failure replies are messages, not errors — the anchor stays healthy and
/// the initiator decides how to proceed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DeviceAuthReply {
    Accepted(DeviceAuthParams),
    /// Presented SQN was not strictly greater than the last accepted one;
    /// carries the resynchronisation payload.
    SyncFailure(Auts),
    /// MAC verification failed; the attempt is dead, a fresh one must be
    /// started from scratch.
    MacFailure,
}

/// Successful authentication parameters for one device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceAuthParams {
    pub hres_star: [u8; MAC_SIZE],
    /// Device grant sealed under KRANi; opaque to the relay.
    #[serde(with = "serde_bytes")]
    pub ci: Vec<u8>,
    pub device_tid: TemporaryId,
    /// Device↔relay session key, delivered to the relay out of band of the
    /// device grant.
    pub kuav: SessionKey,
}

/// Relay → device: outcome of assisted authentication, forwarded from the
/// anchor with the relay's temporary identity attached on success.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AssistedAuthReply {
    Accepted(AssistedAuthResponse),
    SyncFailure(Auts),
    MacFailure,
}

/// Relay → device: forwarded authentication response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistedAuthResponse {
    pub hres_star: [u8; MAC_SIZE],
    #[serde(with = "serde_bytes")]
    pub ci: Vec<u8>,
    pub relay_tid: TemporaryId,
}

/// Plaintext of the `ci` payload in [`DeviceAuthParams`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceGrant {
    pub tid: TemporaryId,
    pub token: Token,
}

/// Resynchronisation payload returned on a sequence-number failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Auts {
    /// Anchor's last accepted SQN, sealed under the encapsulation-derived
    /// key of the failed attempt.
    #[serde(with = "serde_bytes")]
    pub c_sqn: Vec<u8>,
    /// `f1*` code over the corrected SQN.
    pub macs: [u8; MAC_SIZE],
}

/// Device → target relay: handover authentication request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoverRequest {
    pub device_tid: TemporaryId,
    /// Keyed digest over target TID, device TID and `r1` under the token's
    /// temporary group key.
    pub mac: [u8; MAC_SIZE],
    pub r1: [u8; 32],
    /// Expiry of the token backing this request.
    pub expires_at: Timestamp,
}

/// Target relay → device: handover challenge `(HRESi, R2)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoverChallenge {
    pub hres: [u8; MAC_SIZE],
    pub r2: [u8; 32],
}

/// Device → target relay: handover confirmation carrying the raw expected
/// response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoverConfirm {
    pub xres: [u8; MAC_SIZE],
}

/// Target relay → anchor: advisory notification that a handover completed.
///
/// The anchor records it for audit; nothing blocks on this message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoverInform {
    pub relay_tid: TemporaryId,
    pub device_tid: TemporaryId,
}
