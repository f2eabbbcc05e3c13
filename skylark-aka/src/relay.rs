// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay role: mobile intermediary between devices and the anchor.
//!
//! A relay first proves itself to the anchor (phase A), which hands it a
//! temporary identity and the group key shared by all authenticated relays.
//! From then on it forwards device authentication traffic (phase B) and can
//! admit handed-over devices on its own, using nothing but the group key
//! (phase C).
use std::collections::HashMap;

use skylark_core::cbor::{decode_cbor, DecodeError};
use skylark_core::{Clock, DeviceId, RelayId, TemporaryId, Timestamp};
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::aead::{self, AeadError};
use crate::crypto::aka::MAC_SIZE;
use crate::crypto::{Rng, RngError};
use crate::keys::{GroupKey, LongTermKey, SessionKey};
use crate::message::{
    AssistedAuthReply, AssistedAuthResponse, AuthChallenge, AuthRequest, DeviceAuthReply,
    HandoverChallenge, HandoverConfirm, HandoverInform, HandoverRequest, RelayConfirmation,
    RelayGrant, Suci,
};
use crate::vectors::{
    auth_vector, handover_mac, handover_relay_device_key, handover_response, hashed_handover_response,
    hashed_response, tags_match, temporary_group_key,
};

/// State granted by the anchor after service authentication.
#[derive(Debug)]
struct ServiceSession {
    tid: TemporaryId,
    kran: SessionKey,
    group_key: GroupKey,
}

#[derive(Debug)]
struct PendingHandover {
    key: SessionKey,
    res: [u8; MAC_SIZE],
}

/// Relay role (UAV).
#[derive(Debug)]
pub struct Relay {
    relay_id: RelayId,
    key: LongTermKey,
    serving_network: String,
    session: Option<ServiceSession>,
    devices: HashMap<TemporaryId, SessionKey>,
    pending_handovers: HashMap<TemporaryId, PendingHandover>,
}

impl Relay {
    pub fn new(relay_id: RelayId, key: LongTermKey, serving_network: impl Into<String>) -> Self {
        Self {
            relay_id,
            key,
            serving_network: serving_network.into(),
            session: None,
            devices: HashMap::new(),
            pending_handovers: HashMap::new(),
        }
    }

    pub fn relay_id(&self) -> RelayId {
        self.relay_id
    }

    /// Phase A, step 2: verify the anchor's challenge and take service.
    ///
    /// The relay recomputes the hashed expected response from its own
    /// long-term key; a match simultaneously authenticates the anchor and
    /// proves both sides derived the same session key. Only then is the
    /// sealed grant opened and the temporary identity plus group key
    /// installed, replacing any earlier session.
    pub fn receive_auth_challenge(
        &mut self,
        challenge: AuthChallenge,
    ) -> Result<RelayConfirmation, RelayError> {
        let vector = auth_vector(&self.key, &challenge.r, &self.serving_network);
        let expected = hashed_response(&vector.kran, &challenge.c, &vector.res_star);
        if !tags_match(&expected, &challenge.hres_star) {
            warn!(relay_id = %self.relay_id, "anchor challenge verification failed");
            return Err(RelayError::AnchorAuthenticationFailed);
        }

        let plaintext = aead::decrypt(vector.kran.as_bytes(), &challenge.c)?;
        let grant: RelayGrant = decode_cbor(&plaintext)?;
        debug!(relay_id = %self.relay_id, tid = %grant.tid, "relay service session established");
        self.session = Some(ServiceSession {
            tid: grant.tid,
            kran: vector.kran,
            group_key: grant.group_key,
        });
        Ok(RelayConfirmation {
            relay_id: self.relay_id,
        })
    }

    /// Temporary identity granted by the anchor, once authenticated.
    pub fn tid(&self) -> Option<TemporaryId> {
        self.session.as_ref().map(|session| session.tid)
    }

    /// Phase B, forward path: tag a device's concealed identity with this
    /// relay's temporary identity and pass it on to the anchor.
    pub fn receive_connection_request(
        &mut self,
        device: DeviceId,
        suci: Suci,
    ) -> Result<AuthRequest, RelayError> {
        let session = self.session.as_ref().ok_or(RelayError::NotAuthenticated)?;
        debug!(relay_id = %self.relay_id, %device, "forwarding device authentication request");
        Ok(AuthRequest {
            device,
            suci,
            relay_tid: session.tid,
        })
    }

    /// Phase B, return path: forward the anchor's reply to the device.
    ///
    /// On acceptance the relay installs the device↔relay session key under
    /// the device's new temporary identity; the sealed grant passes through
    /// opaquely.
    pub fn receive_device_auth_reply(
        &mut self,
        reply: DeviceAuthReply,
    ) -> Result<AssistedAuthReply, RelayError> {
        let session = self.session.as_ref().ok_or(RelayError::NotAuthenticated)?;
        Ok(match reply {
            DeviceAuthReply::Accepted(params) => {
                debug!(
                    relay_id = %self.relay_id,
                    device_tid = %params.device_tid,
                    "device admitted",
                );
                self.devices.insert(params.device_tid, params.kuav);
                AssistedAuthReply::Accepted(AssistedAuthResponse {
                    hres_star: params.hres_star,
                    ci: params.ci,
                    relay_tid: session.tid,
                })
            }
            DeviceAuthReply::SyncFailure(auts) => AssistedAuthReply::SyncFailure(auts),
            DeviceAuthReply::MacFailure => AssistedAuthReply::MacFailure,
        })
    }

    /// Phase C, target side: challenge a device presenting a handover token.
    ///
    /// The relay recomputes the token's temporary group key from the shared
    /// group key alone — no anchor round trip. Expiry is checked before any
    /// derivation; a stale token is rejected outright.
    pub fn receive_handover_request(
        &mut self,
        request: HandoverRequest,
        clock: &impl Clock,
        rng: &Rng,
    ) -> Result<HandoverChallenge, RelayError> {
        let session = self.session.as_ref().ok_or(RelayError::NotAuthenticated)?;
        let now = clock.now();
        if now >= request.expires_at {
            warn!(
                relay_id = %self.relay_id,
                device_tid = %request.device_tid,
                expires_at = request.expires_at,
                now,
                "handover token expired",
            );
            return Err(RelayError::TokenExpired {
                expires_at: request.expires_at,
                now,
            });
        }

        let tgk = temporary_group_key(&session.group_key, &request.device_tid, request.expires_at);
        let expected = handover_mac(&tgk, &session.tid, &request.device_tid, &request.r1);
        if !tags_match(&expected, &request.mac) {
            warn!(
                relay_id = %self.relay_id,
                device_tid = %request.device_tid,
                "handover token verification failed",
            );
            return Err(RelayError::HandoverTokenInvalid);
        }

        let r2 = rng.challenge()?;
        let res = handover_response(&tgk, &session.tid, &request.device_tid, &request.r1, &r2);
        let key = handover_relay_device_key(&tgk, &session.tid, &request.device_tid);
        let hres = hashed_handover_response(&res, &r2);
        self.pending_handovers
            .insert(request.device_tid, PendingHandover { key, res });
        debug!(relay_id = %self.relay_id, device_tid = %request.device_tid, "handover challenged");
        Ok(HandoverChallenge { hres, r2 })
    }

    /// Phase C, target side: check the device's raw response and admit it.
    ///
    /// The pending state is consumed either way; a mismatched confirmation
    /// leaves no trace and the device must start the handover over.
    pub fn receive_handover_confirm(
        &mut self,
        device_tid: TemporaryId,
        confirm: HandoverConfirm,
    ) -> Result<HandoverInform, RelayError> {
        let session = self.session.as_ref().ok_or(RelayError::NotAuthenticated)?;
        let pending = self
            .pending_handovers
            .remove(&device_tid)
            .ok_or(RelayError::NoPendingHandover(device_tid))?;
        if !tags_match(&pending.res, &confirm.xres) {
            warn!(relay_id = %self.relay_id, %device_tid, "handover confirmation mismatch");
            return Err(RelayError::HandoverMismatch);
        }

        debug!(relay_id = %self.relay_id, %device_tid, "handed-over device admitted");
        self.devices.insert(device_tid, pending.key);
        Ok(HandoverInform {
            relay_tid: session.tid,
            device_tid,
        })
    }

    /// Drops a device's record, typically on the source side after the
    /// device handed over elsewhere. Returns whether a record existed.
    pub fn release(&mut self, device_tid: &TemporaryId) -> bool {
        self.devices.remove(device_tid).is_some()
    }

    pub fn is_serving(&self, device_tid: &TemporaryId) -> bool {
        self.devices.contains_key(device_tid)
    }

    /// Session key shared with a served device.
    pub fn device_key(&self, device_tid: &TemporaryId) -> Option<&SessionKey> {
        self.devices.get(device_tid)
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("anchor challenge verification failed")]
    AnchorAuthenticationFailed,

    #[error("relay has no service session with the anchor")]
    NotAuthenticated,

    #[error("handover token expired at {expires_at}, now {now}")]
    TokenExpired { expires_at: Timestamp, now: Timestamp },

    #[error("handover token verification failed")]
    HandoverTokenInvalid,

    #[error("no pending handover for device {0}")]
    NoPendingHandover(TemporaryId),

    #[error("handover confirmation mismatch")]
    HandoverMismatch,

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Aead(#[from] AeadError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
